//! Playback state machine.
//!
//! Every input reaches the engine as a [`Message`] and is handled to
//! completion before the next one; the engine is never re-entered.
//!
//! # Phases
//!
//! - **Initializing**: waiting for the first batch, which creates the
//!   initial entity set.
//! - **Red / Yellow / Green**: buffering levels while streaming.
//!   Red parks playback until the buffer refills to the threshold,
//!   Yellow keeps playing while a request is in flight, Green plays freely.
//! - **Draining / Finished**: the producer is done; play out the queue.
//! - **Jumping / BeforeJumping / Forwarding**: a seek is in flight
//!   (see the `seek` module).

use std::time::Duration;

use tracing::{debug, trace};

use crate::buffer::{BufferController, Delivery, Producer};
use crate::clock::{PlaybackClock, PlaybackSpeed};
use crate::config::ReplayConfig;
use crate::seek::Shadow;
use crate::snapshot::Snapshot;
use crate::state::{PlayMode, PlaybackPhase, PlaybackState, PlaybackStatus};

/// Seek requests from the transport controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seek {
    /// Absolute time.
    To(u64),
    /// Relative to the current (or pending) time.
    By(i64),
    Start,
    End,
}

/// Play/pause controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Play,
    Pause,
    TogglePlay,
    /// Advance a single tick while paused.
    Step,
}

/// Everything that can happen to the engine.
#[derive(Debug)]
pub enum Message<B> {
    BatchesDelivered(Delivery<B>),
    TimerFired,
    SeekRequested(Seek),
    SpeedChanged { faster: bool },
    Transport(Transport),
    /// Stop the driver loop.
    Shutdown,
}

/// Buffered playback over a streamed recording.
pub struct ReplayEngine<S: Snapshot, P> {
    pub(crate) live: S,
    /// Whether any batch has been replayed into `live`.
    pub(crate) seeded: bool,
    pub(crate) shadow: Option<Shadow<S>>,
    pub(crate) buffer: BufferController<S::Batch, P>,
    pub(crate) state: PlaybackState,
    pub(crate) clock: PlaybackClock,
    speed: PlaybackSpeed,
    base_interval: Duration,
    redraw: bool,
}

impl<S: Snapshot, P: Producer> ReplayEngine<S, P> {
    /// Create an engine with an empty live state. Nothing is requested
    /// until [`begin`](Self::begin).
    pub fn new(producer: P, config: &ReplayConfig) -> Self {
        let mode = if config.autoplay {
            PlayMode::Playing
        } else {
            PlayMode::Paused
        };
        Self {
            live: S::default(),
            seeded: false,
            shadow: None,
            buffer: BufferController::new(producer, config.recording, config.green_threshold),
            state: PlaybackState::new(mode),
            clock: PlaybackClock::new(),
            speed: config.speed,
            base_interval: config.base_interval,
            redraw: false,
        }
    }

    /// Request the first batches of the recording.
    pub fn begin(&mut self) {
        self.buffer.open();
    }

    /// Process one message to completion.
    pub fn handle(&mut self, message: Message<S::Batch>) {
        match message {
            Message::BatchesDelivered(delivery) => self.on_batches_delivered(delivery),
            Message::TimerFired => self.on_timer_fire(),
            Message::SeekRequested(Seek::To(time)) => self.jump_to(time),
            Message::SeekRequested(Seek::By(delta)) => self.jump_by(delta),
            Message::SeekRequested(Seek::Start) => self.jump_to_start(),
            Message::SeekRequested(Seek::End) => self.jump_to_end(),
            Message::SpeedChanged { faster } => self.set_speed(faster),
            Message::Transport(Transport::Play) => self.play(),
            Message::Transport(Transport::Pause) => self.pause(),
            Message::Transport(Transport::TogglePlay) => self.toggle_play(),
            Message::Transport(Transport::Step) => self.step(),
            Message::Shutdown => {}
        }
    }

    /// Queue delivered batches and react according to the current phase.
    pub fn on_batches_delivered(&mut self, delivery: Delivery<S::Batch>) {
        if matches!(self.state.phase, PlaybackPhase::Draining | PlaybackPhase::Finished) {
            trace!(phase = %self.state.phase, "ignoring delivery after producer finished");
            return;
        }
        if !self.buffer.accept(delivery) {
            return;
        }

        match self.state.phase {
            PlaybackPhase::Initializing => self.initialise(),
            PlaybackPhase::Red => self.refill(),
            PlaybackPhase::Yellow | PlaybackPhase::Green => self.top_up(),
            PlaybackPhase::Jumping | PlaybackPhase::BeforeJumping | PlaybackPhase::Forwarding => {
                self.process_jump()
            }
            PlaybackPhase::Draining | PlaybackPhase::Finished => {}
        }
    }

    /// Handle an expired clock deadline.
    pub fn on_timer_fire(&mut self) {
        if !self.clock.fire() {
            trace!("ignoring stale timer");
            return;
        }
        if self.state.mode == PlayMode::Playing {
            self.tick();
        }
    }

    pub fn play(&mut self) {
        if self.state.mode == PlayMode::Playing {
            return;
        }
        self.state = self.state.with_mode(PlayMode::Playing);
        self.resume_clock();
    }

    pub fn pause(&mut self) {
        self.state = self.state.with_mode(PlayMode::Paused);
        self.clock.stop();
    }

    pub fn toggle_play(&mut self) {
        match self.state.mode.toggled() {
            PlayMode::Playing => self.play(),
            PlayMode::Paused => self.pause(),
        }
    }

    /// Advance one tick while paused. No effect while playing or outside
    /// a playing phase.
    pub fn step(&mut self) {
        if self.state.mode == PlayMode::Paused && self.state.phase.is_playing() {
            self.advance();
        }
    }

    /// Move one notch along the speed ladder. A running clock is re-armed
    /// at the new interval after an immediate tick.
    pub fn set_speed(&mut self, faster: bool) {
        self.speed = if faster {
            self.speed.faster()
        } else {
            self.speed.slower()
        };
        debug!(speed = ?self.speed, "playback speed changed");
        if self.clock.is_running() {
            self.tick();
        }
    }

    pub fn live(&self) -> &S {
        &self.live
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.phase
    }

    pub fn mode(&self) -> PlayMode {
        self.state.mode
    }

    pub fn target(&self) -> Option<u64> {
        self.state.target
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn buffer(&self) -> &BufferController<S::Batch, P> {
        &self.buffer
    }

    pub fn producer(&self) -> &P {
        self.buffer.producer()
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            phase: self.state.phase,
            mode: self.state.mode,
            speed: self.speed,
            time: self.live.time(),
            target: self.state.target,
            queued: self.buffer.len(),
            peak_queued: self.buffer.queue().high_water(),
            producer_finished: self.buffer.is_finished(),
            redraw: self.redraw,
        }
    }

    fn interval(&self) -> Duration {
        self.speed.tick_interval(self.base_interval)
    }

    pub(crate) fn enter(&mut self, phase: PlaybackPhase) {
        if phase != self.state.phase {
            debug!(
                from = %self.state.phase,
                to = %phase,
                queued = self.buffer.len(),
                "playback phase change"
            );
            self.state = self.state.with_phase(phase);
        }
    }

    /// Settle after a delivery outside active ticking; requests more when
    /// the result is Red.
    pub(crate) fn settle(&mut self) -> PlaybackPhase {
        let phase = PlaybackPhase::settle(
            self.buffer.len(),
            self.buffer.is_finished(),
            self.buffer.threshold(),
        );
        if phase == PlaybackPhase::Red {
            self.buffer.request_more();
        }
        phase
    }

    /// Arm the clock if playback should be running, otherwise disarm it.
    pub(crate) fn resume_clock(&mut self) {
        if self.state.mode == PlayMode::Playing && self.state.phase.is_playing() {
            self.clock.start(self.interval());
        } else {
            self.clock.stop();
        }
    }

    pub(crate) fn mark_redraw(&mut self) {
        self.redraw = true;
    }

    fn initialise(&mut self) {
        let Some(batch) = self.buffer.pop() else {
            if self.buffer.is_finished() {
                debug!("recording has no events");
                self.enter(PlaybackPhase::Finished);
            } else {
                self.buffer.request_more();
            }
            return;
        };

        self.live.replay(batch);
        self.seeded = true;
        self.redraw = true;
        let phase = self.settle();
        self.enter(phase);
        self.resume_clock();
    }

    fn refill(&mut self) {
        let settled = self.settle();
        let phase = self.unless_animating(settled);
        self.enter(phase);
        if phase.is_playing() && self.state.mode == PlayMode::Playing {
            // Tick now rather than a full interval later.
            self.tick();
        }
    }

    fn top_up(&mut self) {
        let phase = if self.buffer.is_finished() {
            self.unless_animating(PlaybackPhase::settle(
                self.buffer.len(),
                true,
                self.buffer.threshold(),
            ))
        } else if self.buffer.is_sufficient() {
            PlaybackPhase::Green
        } else {
            self.buffer.request_more();
            PlaybackPhase::Yellow
        };
        self.enter(phase);
        if !phase.is_playing() {
            self.clock.stop();
        }
    }

    /// Hold `Finished` back while the last step still changed the view;
    /// Draining ticks then finish once animation settles.
    fn unless_animating(&self, phase: PlaybackPhase) -> PlaybackPhase {
        if phase == PlaybackPhase::Finished && self.redraw {
            PlaybackPhase::Draining
        } else {
            phase
        }
    }

    fn tick(&mut self) {
        self.advance();
        self.resume_clock();
    }

    fn advance(&mut self) {
        match self.state.phase {
            PlaybackPhase::Yellow => {
                self.apply_next();
                if self.buffer.is_empty() {
                    self.buffer.request_more();
                    self.enter(PlaybackPhase::Red);
                }
            }
            PlaybackPhase::Green => {
                self.apply_next();
                if self.buffer.is_empty() {
                    self.buffer.request_more();
                    self.enter(PlaybackPhase::Red);
                } else if !self.buffer.is_sufficient() {
                    self.buffer.request_more();
                    self.enter(PlaybackPhase::Yellow);
                }
            }
            PlaybackPhase::Draining => {
                let applied = self.apply_next();
                if !applied && !self.redraw && self.buffer.is_empty() {
                    self.enter(PlaybackPhase::Finished);
                }
            }
            _ => {}
        }
    }

    /// Replay the next queued batch onto the live state, then animate.
    fn apply_next(&mut self) -> bool {
        let applied = match self.buffer.pop() {
            Some(batch) => {
                self.live.replay(batch);
                self.seeded = true;
                true
            }
            None => false,
        };
        self.redraw = self.live.animate() || applied;
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StreamId;
    use crate::testing::{steps, Request, RequestLog, ScriptedSource, Tape, TestEngine};

    fn engine(threshold: usize) -> TestEngine {
        let config = ReplayConfig::default().with_green_threshold(threshold);
        let mut engine = ReplayEngine::new(RequestLog::default(), &config);
        engine.begin();
        engine
    }

    fn deliver(engine: &mut TestEngine, ids: std::ops::Range<u32>, finished: bool) {
        let stream = engine.buffer().stream();
        let batches = steps(ids.end).into_iter().skip(ids.start as usize).collect();
        engine.on_batches_delivered(Delivery::new(stream, batches, finished));
    }

    fn fire(engine: &mut TestEngine, ticks: usize) {
        for _ in 0..ticks {
            engine.on_timer_fire();
        }
    }

    #[test]
    fn empty_recording_finishes() {
        let mut engine = engine(20);
        deliver(&mut engine, 0..0, true);

        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.live(), &Tape::default());
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn twenty_five_batches_drain_to_finished() {
        let mut engine = engine(20);
        deliver(&mut engine, 0..25, true);

        assert_eq!(engine.phase(), PlaybackPhase::Draining);
        assert_eq!(engine.live().applied, vec![0]);
        assert_eq!(engine.buffer().len(), 24);
        assert!(engine.clock().is_running());

        fire(&mut engine, 24);
        assert_eq!(engine.live().applied, (0..25).collect::<Vec<_>>());
        assert_eq!(engine.phase(), PlaybackPhase::Draining);

        fire(&mut engine, 1);
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert!(!engine.clock().is_running());

        let before = engine.live().clone();
        fire(&mut engine, 5);
        assert_eq!(engine.live(), &before);
    }

    #[test]
    fn single_finished_batch_goes_straight_to_finished() {
        let mut engine = engine(20);
        deliver(&mut engine, 0..1, true);

        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.live().applied, vec![0]);
    }

    #[test]
    fn empty_unfinished_delivery_keeps_initializing() {
        let mut engine = engine(20);
        deliver(&mut engine, 0..0, false);

        assert_eq!(engine.phase(), PlaybackPhase::Initializing);
        assert_eq!(engine.producer().more_requests(), 1);
    }

    #[test]
    fn short_first_delivery_parks_red_and_requests() {
        let mut engine = engine(20);
        deliver(&mut engine, 0..5, false);

        assert_eq!(engine.phase(), PlaybackPhase::Red);
        assert_eq!(
            engine.producer().requests,
            vec![Request::Initial(StreamId(0), 0), Request::More(StreamId(0))]
        );
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn large_first_delivery_goes_green_and_starts_clock() {
        let mut engine = engine(5);
        deliver(&mut engine, 0..10, false);

        assert_eq!(engine.phase(), PlaybackPhase::Green);
        assert!(engine.clock().is_running());
        assert_eq!(engine.producer().more_requests(), 0);
    }

    #[test]
    fn red_refill_ticks_immediately() {
        let mut engine = engine(5);
        deliver(&mut engine, 0..3, false);
        assert_eq!(engine.phase(), PlaybackPhase::Red);

        deliver(&mut engine, 3..12, false);
        assert_eq!(engine.phase(), PlaybackPhase::Green);
        assert_eq!(engine.live().applied, vec![0, 1]);
        assert!(engine.clock().is_running());
    }

    #[test]
    fn red_refill_while_paused_does_not_tick() {
        let config = ReplayConfig::default().with_green_threshold(5).paused();
        let mut engine: TestEngine = ReplayEngine::new(RequestLog::default(), &config);
        engine.begin();
        deliver(&mut engine, 0..3, false);
        deliver(&mut engine, 3..12, false);

        assert_eq!(engine.phase(), PlaybackPhase::Green);
        assert_eq!(engine.live().applied, vec![0]);
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn red_stays_red_below_threshold_with_one_request_per_delivery() {
        let mut engine = engine(10);
        deliver(&mut engine, 0..3, false);
        deliver(&mut engine, 3..6, false);

        assert_eq!(engine.phase(), PlaybackPhase::Red);
        assert_eq!(engine.producer().more_requests(), 2);
        assert!(engine.buffer().is_outstanding());
    }

    #[test]
    fn green_drains_to_yellow_then_red() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        assert_eq!(engine.phase(), PlaybackPhase::Green);

        // 5 queued; one tick leaves 4 (still Green), the next leaves 3.
        fire(&mut engine, 1);
        assert_eq!(engine.phase(), PlaybackPhase::Green);
        fire(&mut engine, 1);
        assert_eq!(engine.phase(), PlaybackPhase::Yellow);
        assert_eq!(engine.producer().more_requests(), 1);

        fire(&mut engine, 3);
        assert_eq!(engine.phase(), PlaybackPhase::Red);
        assert!(!engine.clock().is_running());
        // The Yellow request is still the only one in flight.
        assert_eq!(engine.producer().more_requests(), 1);
        assert_eq!(engine.live().applied, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn yellow_delivery_returns_to_green() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        fire(&mut engine, 2);
        assert_eq!(engine.phase(), PlaybackPhase::Yellow);

        deliver(&mut engine, 6..10, false);
        assert_eq!(engine.phase(), PlaybackPhase::Green);
        assert!(engine.clock().is_running());
    }

    #[test]
    fn yellow_delivery_below_threshold_requests_again() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        fire(&mut engine, 2);
        deliver(&mut engine, 6..6, false);

        assert_eq!(engine.phase(), PlaybackPhase::Yellow);
        assert_eq!(engine.producer().more_requests(), 2);
    }

    #[test]
    fn finishing_delivery_while_green_drains() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        deliver(&mut engine, 6..8, true);

        assert_eq!(engine.phase(), PlaybackPhase::Draining);
        fire(&mut engine, 10);
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.live().applied, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn finishing_while_red_waits_for_a_settled_step() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        fire(&mut engine, 5);
        assert_eq!(engine.phase(), PlaybackPhase::Red);
        assert!(engine.buffer().is_empty());
        engine.pause();

        // The last tick still redrew, so Finished is held back.
        deliver(&mut engine, 6..6, true);
        assert_eq!(engine.phase(), PlaybackPhase::Draining);

        engine.step();
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.live().applied, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn finishing_while_red_and_playing_settles_immediately() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, false);
        fire(&mut engine, 5);

        deliver(&mut engine, 6..6, true);
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn deliveries_after_finish_are_ignored() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..6, true);
        assert_eq!(engine.phase(), PlaybackPhase::Draining);

        deliver(&mut engine, 6..9, true);
        assert_eq!(engine.buffer().len(), 5);
    }

    #[test]
    fn stale_stream_delivery_dropped() {
        let mut engine = engine(4);
        engine.on_batches_delivered(Delivery::new(StreamId(7), steps(6), false));
        assert_eq!(engine.phase(), PlaybackPhase::Initializing);
        assert!(engine.buffer().is_empty());
    }

    #[test]
    fn pause_stops_clock_and_play_resumes() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..10, false);
        assert!(engine.clock().is_running());

        engine.pause();
        assert_eq!(engine.mode(), PlayMode::Paused);
        assert!(!engine.clock().is_running());
        fire(&mut engine, 3);
        assert_eq!(engine.live().applied, vec![0]);

        engine.toggle_play();
        assert_eq!(engine.mode(), PlayMode::Playing);
        assert!(engine.clock().is_running());
        fire(&mut engine, 1);
        assert_eq!(engine.live().applied, vec![0, 1]);
    }

    #[test]
    fn step_advances_once_while_paused() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..10, false);
        engine.pause();

        engine.step();
        assert_eq!(engine.live().applied, vec![0, 1]);
        assert!(!engine.clock().is_running());

        engine.play();
        engine.step();
        assert_eq!(engine.live().applied, vec![0, 1]);
    }

    #[test]
    fn speed_change_ticks_and_rearms() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..10, false);
        let normal = engine.clock().interval().unwrap();

        engine.set_speed(true);
        assert_eq!(engine.speed(), PlaybackSpeed::Double);
        assert_eq!(engine.live().applied, vec![0, 1]);
        assert_eq!(engine.clock().interval(), Some(normal / 2));
    }

    #[test]
    fn speed_change_while_paused_only_changes_speed() {
        let mut engine = engine(4);
        deliver(&mut engine, 0..10, false);
        engine.pause();

        engine.set_speed(false);
        assert_eq!(engine.speed(), PlaybackSpeed::Half);
        assert_eq!(engine.live().applied, vec![0]);
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn handle_dispatches_messages() {
        let mut engine = engine(4);
        engine.handle(Message::BatchesDelivered(Delivery::new(StreamId(0), steps(10), false)));
        engine.handle(Message::TimerFired);
        engine.handle(Message::Transport(Transport::Pause));
        engine.handle(Message::SpeedChanged { faster: true });

        assert_eq!(engine.live().applied, vec![0, 1]);
        assert_eq!(engine.mode(), PlayMode::Paused);
        assert_eq!(engine.speed(), PlaybackSpeed::Double);
        assert_eq!(engine.status().queued, 8);
        assert_eq!(engine.status().peak_queued, 10);
    }

    #[test]
    fn scripted_source_plays_whole_recording() {
        let mut engine = engine(6);
        let mut source = ScriptedSource::new(steps(40), 7);

        while engine.phase() != PlaybackPhase::Finished {
            if source.has_pending(&engine) {
                source.pump(&mut engine);
            } else {
                fire(&mut engine, 1);
            }
        }
        assert_eq!(engine.live().applied, (0..40).collect::<Vec<_>>());
        assert_eq!(engine.live().time, 39);
    }

    mod ordering {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunking_never_changes_replay_order(
                count in 1u32..80,
                chunk in 1usize..15,
                threshold in 1usize..25,
                ticks_between in 0usize..4,
            ) {
                let mut engine = engine(threshold);
                let mut source = ScriptedSource::new(steps(count), chunk);

                let mut guard = 0;
                while engine.phase() != PlaybackPhase::Finished {
                    if source.has_pending(&engine) {
                        source.pump(&mut engine);
                        fire(&mut engine, ticks_between);
                    } else {
                        fire(&mut engine, 1);
                    }
                    guard += 1;
                    prop_assert!(guard < 10_000, "playback did not terminate");
                }

                let mut expected = Tape::default();
                for step in steps(count) {
                    expected.replay(step);
                }
                prop_assert_eq!(engine.live(), &expected);
            }
        }
    }
}
