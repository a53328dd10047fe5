//! Buffer controller: owns the event queue and talks to the producer.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::queue::EventQueue;

/// Identifies one opened batch stream.
///
/// A backward seek abandons the current stream and opens a new one;
/// anything still in flight for the old stream is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl StreamId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// One response from the producer.
#[derive(Debug, Clone)]
pub struct Delivery<B> {
    pub stream: StreamId,
    pub batches: Vec<B>,
    /// No further batches will follow on this stream.
    pub finished: bool,
}

impl<B> Delivery<B> {
    pub fn new(stream: StreamId, batches: Vec<B>, finished: bool) -> Self {
        Self {
            stream,
            batches,
            finished,
        }
    }
}

/// The external source of event batches.
///
/// Both calls are fire-and-forget. Responses come back as [`Delivery`]
/// messages tagged with the stream they answer, ending with exactly one
/// delivery marked `finished`.
pub trait Producer {
    /// Open a stream for `recording` from time 0.
    fn request_initial(&mut self, stream: StreamId, recording: u32);

    /// Ask for the next chunk of an open stream.
    fn request_more(&mut self, stream: StreamId);
}

/// Queue plus producer bookkeeping.
#[derive(Debug)]
pub struct BufferController<B, P> {
    queue: EventQueue<B>,
    producer: P,
    recording: u32,
    stream: StreamId,
    threshold: usize,
    finished: bool,
    /// A request is in flight and no delivery has answered it yet.
    outstanding: bool,
}

impl<B, P: Producer> BufferController<B, P> {
    pub fn new(producer: P, recording: u32, threshold: usize) -> Self {
        Self {
            queue: EventQueue::new(),
            producer,
            recording,
            stream: StreamId::default(),
            threshold,
            finished: false,
            outstanding: false,
        }
    }

    /// Open the first stream.
    pub fn open(&mut self) {
        trace!(stream = %self.stream, recording = self.recording, "requesting initial batches");
        self.producer.request_initial(self.stream, self.recording);
        self.outstanding = true;
    }

    /// Abandon the current stream and reopen from time 0.
    /// Returns the number of queued batches discarded.
    pub fn restart(&mut self) -> usize {
        let discarded = self.queue.clear();
        self.stream = self.stream.next();
        self.finished = false;
        self.open();
        discarded
    }

    /// Append a delivery to the queue.
    ///
    /// Returns `false` when the delivery is stale (another stream) or late
    /// (the stream already finished); such deliveries are dropped.
    pub fn accept(&mut self, delivery: Delivery<B>) -> bool {
        if delivery.stream != self.stream {
            debug!(
                stale = %delivery.stream,
                current = %self.stream,
                batches = delivery.batches.len(),
                "dropping delivery for abandoned stream"
            );
            return false;
        }
        if self.finished {
            debug!(stream = %self.stream, "dropping delivery after stream finished");
            return false;
        }

        trace!(
            stream = %self.stream,
            batches = delivery.batches.len(),
            finished = delivery.finished,
            "batches delivered"
        );
        self.queue.extend(delivery.batches);
        self.finished = delivery.finished;
        self.outstanding = false;
        true
    }

    /// Ask for more data unless a request is already in flight or the
    /// stream is finished. Returns whether a request was issued.
    pub fn request_more(&mut self) -> bool {
        if self.finished || self.outstanding {
            return false;
        }
        trace!(stream = %self.stream, queued = self.queue.len(), "requesting more batches");
        self.producer.request_more(self.stream);
        self.outstanding = true;
        true
    }

    pub fn pop(&mut self) -> Option<B> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue length is at or above the threshold.
    pub fn is_sufficient(&self) -> bool {
        self.queue.len() >= self.threshold
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn queue(&self) -> &EventQueue<B> {
        &self.queue
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }
}
