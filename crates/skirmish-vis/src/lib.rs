//! Skirmish Replay Viewer
//!
//! Backend for watching recorded encounters with seekable playback.
//!
//! # Architecture
//!
//! - **Recorder**: Simulates an encounter into per-instant event batches
//! - **Source**: Streams recorded batches to the engine in chunks
//! - **Encounter**: Battlefield snapshot the engine replays into
//! - **REST API**: Play, pause, step, seek and change speed
//!
//! # Usage
//!
//! ```ignore
//! let mut recorder = EncounterRecorder::new(RecorderConfig::default());
//! recorder.run();
//!
//! let replay = launch(vec![recorder.into_batches()], SourceConfig::default(), &ReplayConfig::default())?;
//! ControlServer::new(replay.handle).serve(3000).await?;
//! ```

mod encounter;
mod error;
mod recorder;
mod server;
mod source;

use std::path::Path;

use skirmish_replay::{ReplayConfig, ReplayEngine, ReplayHandle};
use tokio::task::JoinHandle;
use tracing::info;

pub use encounter::{
    Encounter, EncounterEvent, EventBatch, Faction, Position, UnitId, UnitState, MOTION_FRAMES,
};
pub use error::{Error, Result};
pub use recorder::{EncounterRecorder, RecorderConfig};
pub use server::ControlServer;
pub use source::{BatchRequest, ChannelProducer, RecordingSource, SourceConfig};

/// Engine type driving the viewer.
pub type EncounterEngine = ReplayEngine<Encounter, ChannelProducer>;

/// A running replay: control handle plus the engine task.
pub struct Replay {
    pub handle: ReplayHandle<EventBatch>,
    pub engine: JoinHandle<EncounterEngine>,
    pub source: JoinHandle<()>,
}

/// Read a replay configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ReplayConfig> {
    let json = std::fs::read_to_string(path)?;
    Ok(ReplayConfig::from_json(&json)?)
}

/// Spawn a recording source and a replay engine wired to it.
///
/// Must be called from within a tokio runtime.
pub fn launch(
    recordings: Vec<Vec<EventBatch>>,
    source: SourceConfig,
    config: &ReplayConfig,
) -> Result<Replay> {
    config.validate()?;

    let (producer, requests) = ChannelProducer::channel();
    let (mailbox, inbox) = skirmish_replay::mailbox();
    let source = RecordingSource::new(recordings, source);
    info!(
        recordings = source.len(),
        recording = config.recording,
        "launching replay"
    );
    let source = tokio::spawn(source.serve(requests, mailbox.clone()));

    let engine = EncounterEngine::new(producer, config);
    let (handle, engine) = skirmish_replay::spawn(engine, mailbox, inbox);
    Ok(Replay {
        handle,
        engine,
        source,
    })
}
