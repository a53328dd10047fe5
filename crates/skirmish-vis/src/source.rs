//! Recording source: serves event batches to the replay engine over channels.
//!
//! The engine side holds a [`ChannelProducer`]; requests travel to a
//! [`RecordingSource`] task which answers through the engine's mailbox
//! after an artificial latency, one chunk per request.

use std::sync::Arc;
use std::time::Duration;

use skirmish_replay::{Delivery, Mailbox, Producer, StreamId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::encounter::EventBatch;

/// A request from the engine to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRequest {
    /// Start `recording` from time 0 on a new stream.
    Open { stream: StreamId, recording: u32 },
    /// Next chunk of an open stream.
    More { stream: StreamId },
}

/// Engine-side producer forwarding requests over a channel.
#[derive(Debug, Clone)]
pub struct ChannelProducer {
    requests: mpsc::UnboundedSender<BatchRequest>,
}

impl ChannelProducer {
    /// Create a producer and the receiver a [`RecordingSource`] serves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BatchRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }

    fn send(&self, request: BatchRequest) {
        if self.requests.send(request).is_err() {
            warn!(?request, "recording source has shut down");
        }
    }
}

impl Producer for ChannelProducer {
    fn request_initial(&mut self, stream: StreamId, recording: u32) {
        self.send(BatchRequest::Open { stream, recording });
    }

    fn request_more(&mut self, stream: StreamId) {
        self.send(BatchRequest::More { stream });
    }
}

/// Configuration for a recording source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Batches per delivery
    pub chunk_size: usize,
    /// Simulated I/O delay before each delivery
    pub latency: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8,
            latency: Duration::from_millis(40),
        }
    }
}

/// Serves recorded encounters chunk by chunk.
pub struct RecordingSource {
    recordings: Vec<Arc<[EventBatch]>>,
    config: SourceConfig,
}

/// Position within the currently open stream.
struct Cursor {
    stream: StreamId,
    recording: Option<Arc<[EventBatch]>>,
    offset: usize,
}

impl RecordingSource {
    pub fn new(recordings: Vec<Vec<EventBatch>>, config: SourceConfig) -> Self {
        Self {
            recordings: recordings.into_iter().map(Arc::from).collect(),
            config,
        }
    }

    /// Number of recordings available.
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Answer requests until either channel closes.
    pub async fn serve(
        self,
        mut requests: mpsc::UnboundedReceiver<BatchRequest>,
        mailbox: Mailbox<EventBatch>,
    ) {
        let mut cursor: Option<Cursor> = None;

        while let Some(request) = requests.recv().await {
            match request {
                BatchRequest::Open { stream, recording } => {
                    let batches = self.recordings.get(recording as usize).cloned();
                    if batches.is_none() {
                        warn!(recording, "unknown recording, serving it empty");
                    }
                    cursor = Some(Cursor {
                        stream,
                        recording: batches,
                        offset: 0,
                    });
                }
                BatchRequest::More { stream } => {
                    if cursor.as_ref().map(|c| c.stream) != Some(stream) {
                        debug!(%stream, "ignoring request for abandoned stream");
                        continue;
                    }
                }
            }
            let Some(current) = cursor.as_mut() else {
                continue;
            };

            tokio::time::sleep(self.config.latency).await;

            let (batches, finished) = match &current.recording {
                Some(recording) => {
                    let end = (current.offset + self.config.chunk_size).min(recording.len());
                    let batches = recording[current.offset..end].to_vec();
                    current.offset = end;
                    (batches, end == recording.len())
                }
                None => (Vec::new(), true),
            };

            let delivery = Delivery::new(current.stream, batches, finished);
            if mailbox.deliver(delivery).is_err() {
                break;
            }
        }

        info!("recording source stopped");
    }
}
