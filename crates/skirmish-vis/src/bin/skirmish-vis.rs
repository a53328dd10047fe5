//! Skirmish Replay Viewer Server
//!
//! Record an encounter and serve playback controls for it.

use std::env;
use std::time::Duration;

use skirmish_replay::ReplayConfig;
use skirmish_vis::{launch, load_config, ControlServer, EncounterRecorder, RecorderConfig, SourceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skirmish_vis=info,skirmish_replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line args
    let args: Vec<String> = env::args().collect();

    let duration: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(300);

    let port: u16 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(3000);

    let latency: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(40);

    let config = match env::var("SKIRMISH_CONFIG") {
        Ok(path) => load_config(path)?,
        Err(_) => ReplayConfig::default(),
    };

    println!("Skirmish Replay Viewer");
    println!("======================");
    println!();
    println!("Recording encounter for up to {} instants...", duration);

    let mut recorder = EncounterRecorder::new(RecorderConfig {
        duration,
        ..Default::default()
    });
    recorder.run();

    println!();
    println!("Recording complete:");
    println!("  Batches: {}", recorder.batch_count());
    println!("  Decided: {}", recorder.snapshot().is_decided());
    println!();
    println!("Starting control server on http://localhost:{}", port);
    println!();

    let source = SourceConfig {
        latency: Duration::from_millis(latency),
        ..Default::default()
    };
    let replay = launch(vec![recorder.into_batches()], source, &config)?;

    ControlServer::new(replay.handle.clone()).serve(port).await?;

    replay.handle.shutdown()?;
    replay.engine.await?;
    Ok(())
}
