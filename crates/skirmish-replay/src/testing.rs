//! Test doubles: a recording tape snapshot and a request-logging producer.

use crate::buffer::{Delivery, Producer, StreamId};
use crate::engine::ReplayEngine;
use crate::snapshot::Snapshot;

/// Batch that advances time and may spawn entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: u32,
    pub advance: u64,
    pub spawn: u32,
}

/// Recording of `count` steps: step 0 spawns four entities at time 0,
/// each later step advances time by one. Step `k` ends at time `k`.
pub fn steps(count: u32) -> Vec<Step> {
    (0..count)
        .map(|id| Step {
            id,
            advance: u64::from(id > 0),
            spawn: if id == 0 { 4 } else { 0 },
        })
        .collect()
}

/// Snapshot that remembers which steps were applied, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    pub time: u64,
    pub entities: u32,
    pub applied: Vec<u32>,
}

impl Snapshot for Tape {
    type Batch = Step;

    fn replay(&mut self, batch: Step) {
        self.time += batch.advance;
        self.entities += batch.spawn;
        self.applied.push(batch.id);
    }

    fn animate(&mut self) -> bool {
        false
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn has_entities(&self) -> bool {
        self.entities > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Initial(StreamId, u32),
    More(StreamId),
}

/// Producer that only records what it was asked for.
#[derive(Debug, Default)]
pub struct RequestLog {
    pub requests: Vec<Request>,
}

impl RequestLog {
    pub fn more_requests(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| matches!(r, Request::More(_)))
            .count()
    }
}

impl Producer for RequestLog {
    fn request_initial(&mut self, stream: StreamId, recording: u32) {
        self.requests.push(Request::Initial(stream, recording));
    }

    fn request_more(&mut self, stream: StreamId) {
        self.requests.push(Request::More(stream));
    }
}

pub type TestEngine = ReplayEngine<Tape, RequestLog>;

/// Answers the requests an engine has logged, `chunk` steps at a time.
#[derive(Debug)]
pub struct ScriptedSource {
    recording: Vec<Step>,
    chunk: usize,
    stream: StreamId,
    cursor: usize,
    served: usize,
}

impl ScriptedSource {
    pub fn new(recording: Vec<Step>, chunk: usize) -> Self {
        Self {
            recording,
            chunk,
            stream: StreamId::default(),
            cursor: 0,
            served: 0,
        }
    }

    /// Whether a logged request has not been answered yet.
    pub fn has_pending(&self, engine: &TestEngine) -> bool {
        engine.producer().requests.len() > self.served
    }

    /// Answer the oldest unanswered request. Returns `false` if none is pending.
    pub fn pump(&mut self, engine: &mut TestEngine) -> bool {
        let Some(request) = engine.producer().requests.get(self.served).cloned() else {
            return false;
        };
        self.served += 1;

        match request {
            Request::Initial(stream, _) => {
                self.stream = stream;
                self.cursor = 0;
            }
            Request::More(stream) if stream != self.stream => return true,
            Request::More(_) => {}
        }

        let end = (self.cursor + self.chunk).min(self.recording.len());
        let batches = self.recording[self.cursor..end].to_vec();
        self.cursor = end;
        let finished = self.cursor == self.recording.len();
        engine.on_batches_delivered(Delivery::new(self.stream, batches, finished));
        true
    }

    /// Answer requests until none are pending.
    pub fn pump_all(&mut self, engine: &mut TestEngine) {
        while self.pump(engine) {}
    }
}
