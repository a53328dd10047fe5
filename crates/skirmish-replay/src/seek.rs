//! Seeking to an absolute simulated time.
//!
//! Batch effects (entities created and killed) cannot be undone from a
//! mid-stream snapshot, so there are two strategies:
//!
//! - **Backward**: drop the queue, reopen the stream from time 0 and
//!   rebuild a shadow state from scratch (`Jumping`).
//! - **Forward**: copy the live state into a shadow state and fast-play
//!   queued or streamed batches into it until the target is reached
//!   (`BeforeJumping` while waiting for data, then `Forwarding`).
//!
//! The live state is untouched until the shadow is committed. A new seek
//! simply overwrites the target; a forward seek keeps the existing shadow
//! because the queue continues from where the shadow left off.

use tracing::{debug, info};

use crate::buffer::{BufferController, Producer};
use crate::engine::ReplayEngine;
use crate::snapshot::Snapshot;
use crate::state::{PlayMode, PlaybackPhase};

/// Scratch copy of the live state fast-played during a seek.
#[derive(Debug, Clone)]
pub(crate) struct Shadow<S> {
    pub(crate) snapshot: S,
    /// Whether any batch has been replayed into `snapshot`.
    pub(crate) seeded: bool,
}

impl<S: Snapshot> Shadow<S> {
    /// Replay queued batches until `target` is reached or the queue runs dry.
    fn fast_play<P: Producer>(&mut self, target: u64, buffer: &mut BufferController<S::Batch, P>) {
        while self.short_of(target) {
            match buffer.pop() {
                Some(batch) => {
                    self.snapshot.replay(batch);
                    self.seeded = true;
                }
                None => break,
            }
        }
    }

    /// Still needs batches to reach `target`. An unseeded state with no
    /// entities takes exactly one batch for time 0, which creates them
    /// without advancing time.
    fn short_of(&self, target: u64) -> bool {
        self.snapshot.time() < target
            || (target == 0 && !self.seeded && !self.snapshot.has_entities())
    }
}

impl<S: Snapshot, P: Producer> ReplayEngine<S, P> {
    /// Seek to `target`, pausing playback.
    pub fn jump_to(&mut self, target: u64) {
        self.clock.stop();
        self.state = self.state.with_mode(PlayMode::Paused);

        let reference = self
            .shadow
            .as_ref()
            .map_or_else(|| self.live.time(), |shadow| shadow.snapshot.time());
        if target < reference {
            self.restart(target);
        } else {
            self.forward(target);
        }
    }

    /// Seek relative to the pending target, or the live time if no seek
    /// is in flight.
    pub fn jump_by(&mut self, delta: i64) {
        let origin = self.state.target.unwrap_or_else(|| self.live.time());
        self.jump_to(origin.saturating_add_signed(delta));
    }

    pub fn jump_to_start(&mut self) {
        self.jump_to(0);
    }

    /// Seek past any reachable time; settles wherever the recording ends.
    pub fn jump_to_end(&mut self) {
        self.jump_to(u64::MAX);
    }

    /// The shadow state while a seek is in flight.
    pub fn shadow(&self) -> Option<&S> {
        self.shadow.as_ref().map(|shadow| &shadow.snapshot)
    }

    fn restart(&mut self, target: u64) {
        let discarded = self.buffer.restart();
        info!(target, discarded, stream = %self.buffer.stream(), "seeking backward, replaying from time 0");
        self.shadow = Some(Shadow {
            snapshot: S::default(),
            seeded: false,
        });
        self.state = self.state.seeking(PlaybackPhase::Jumping, target);
    }

    fn forward(&mut self, target: u64) {
        let seeded = self.seeded;
        let shadow = self.shadow.get_or_insert_with(|| Shadow {
            snapshot: self.live.clone(),
            seeded,
        });
        let waiting = shadow.short_of(target);
        if self.state.phase == PlaybackPhase::Jumping {
            // The reopened stream has not answered yet; just retarget.
            self.state = self.state.seeking(PlaybackPhase::Jumping, target);
            return;
        }

        if waiting
            && self.buffer.is_empty()
            && !self.buffer.is_finished()
            && self.state.phase != PlaybackPhase::Forwarding
        {
            debug!(target, "seek waiting for data");
            self.state = self.state.seeking(PlaybackPhase::BeforeJumping, target);
            self.buffer.request_more();
        } else {
            self.state = self.state.seeking(PlaybackPhase::Forwarding, target);
            self.process_jump();
        }
    }

    /// Fast-play queued batches into the shadow state, committing once the
    /// target is reached or can no longer be reached.
    pub(crate) fn process_jump(&mut self) {
        let Some(target) = self.state.target else {
            return;
        };
        let Some(shadow) = self.shadow.as_mut() else {
            return;
        };
        if shadow.snapshot.time() > target {
            self.restart(target);
            return;
        }

        shadow.fast_play(target, &mut self.buffer);
        let reached = !shadow.short_of(target);

        if self.buffer.is_finished() && (reached || self.buffer.is_empty()) {
            // Not yet animated, so Draining ticks decide when it is done.
            self.commit(PlaybackPhase::Draining);
        } else if reached {
            let phase = self.settle();
            self.commit(phase);
        } else {
            self.state = self.state.seeking(PlaybackPhase::Forwarding, target);
            self.buffer.request_more();
        }
    }

    fn commit(&mut self, phase: PlaybackPhase) {
        if let Some(shadow) = self.shadow.take() {
            self.live = shadow.snapshot;
            self.seeded = shadow.seeded;
        }
        info!(
            target = ?self.state.target,
            time = self.live.time(),
            phase = %phase,
            "seek committed"
        );
        self.state = self.state.settled(phase);
        self.mark_redraw();
        self.resume_clock();
    }
}
