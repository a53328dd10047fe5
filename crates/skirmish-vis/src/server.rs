//! Axum control surface for a running replay.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use skirmish_replay::{PlaybackStatus, ReplayHandle};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::encounter::EventBatch;

type Handle = ReplayHandle<EventBatch>;
type Reply = Result<(StatusCode, Json<PlaybackStatus>), (StatusCode, String)>;

/// HTTP server forwarding playback controls to the replay engine.
pub struct ControlServer {
    handle: Handle,
}

impl ControlServer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/playback", get(status_handler))
            .route("/api/playback/play", post(play_handler))
            .route("/api/playback/pause", post(pause_handler))
            .route("/api/playback/toggle", post(toggle_handler))
            .route("/api/playback/step", post(step_handler))
            .route("/api/playback/jump", post(jump_handler))
            .route("/api/playback/jump/by", post(jump_by_handler))
            .route("/api/playback/jump/start", post(jump_start_handler))
            .route("/api/playback/jump/end", post(jump_end_handler))
            .route("/api/playback/speed", post(speed_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.handle.clone())
    }

    /// Run the server on the given port.
    pub async fn serve(self, port: u16) -> Result<(), std::io::Error> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Replay control server running on http://localhost:{}", port);
        axum::serve(listener, self.router()).await
    }
}

/// Forward a command and answer with the status current at that moment.
/// The command's effect shows up in later reads of `/api/playback`.
fn dispatch(handle: &Handle, sent: skirmish_replay::Result<()>) -> Reply {
    match sent {
        Ok(()) => Ok((StatusCode::ACCEPTED, Json(handle.status()))),
        Err(e) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

async fn status_handler(State(handle): State<Handle>) -> Json<PlaybackStatus> {
    Json(handle.status())
}

async fn play_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.play())
}

async fn pause_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.pause())
}

async fn toggle_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.toggle_play())
}

async fn step_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.step())
}

#[derive(Deserialize)]
struct JumpRequest {
    time: u64,
}

async fn jump_handler(State(handle): State<Handle>, Json(req): Json<JumpRequest>) -> Reply {
    dispatch(&handle, handle.jump_to(req.time))
}

#[derive(Deserialize)]
struct JumpByRequest {
    delta: i64,
}

async fn jump_by_handler(State(handle): State<Handle>, Json(req): Json<JumpByRequest>) -> Reply {
    dispatch(&handle, handle.jump_by(req.delta))
}

async fn jump_start_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.jump_to_start())
}

async fn jump_end_handler(State(handle): State<Handle>) -> Reply {
    dispatch(&handle, handle.jump_to_end())
}

#[derive(Deserialize)]
struct SpeedRequest {
    faster: bool,
}

async fn speed_handler(State(handle): State<Handle>, Json(req): Json<SpeedRequest>) -> Reply {
    dispatch(&handle, handle.set_speed(req.faster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_replay::{Message, Seek, Transport};
    use tokio::sync::watch;

    fn handle() -> (
        Handle,
        tokio::sync::mpsc::UnboundedReceiver<Message<EventBatch>>,
    ) {
        let (mailbox, inbox) = skirmish_replay::mailbox();
        let (_tx, status) = watch::channel(PlaybackStatus::default());
        (ReplayHandle::new(mailbox, status), inbox)
    }

    #[test]
    fn router_builds() {
        let (handle, _inbox) = handle();
        let _router = ControlServer::new(handle).router();
    }

    #[tokio::test]
    async fn commands_reach_the_engine() {
        let (handle, mut inbox) = handle();

        let (code, _) = play_handler(State(handle.clone())).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);
        jump_handler(State(handle.clone()), Json(JumpRequest { time: 42 }))
            .await
            .unwrap();
        speed_handler(State(handle), Json(SpeedRequest { faster: true }))
            .await
            .unwrap();

        assert!(matches!(
            inbox.recv().await,
            Some(Message::Transport(Transport::Play))
        ));
        assert!(matches!(
            inbox.recv().await,
            Some(Message::SeekRequested(Seek::To(42)))
        ));
        assert!(matches!(
            inbox.recv().await,
            Some(Message::SpeedChanged { faster: true })
        ));
    }

    #[tokio::test]
    async fn stopped_engine_is_unavailable() {
        let (handle, inbox) = handle();
        drop(inbox);

        let (code, body) = step_handler(State(handle)).await.unwrap_err();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("stopped"));
    }
}
