//! Playback speed and the single tick timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    /// 0.25x speed
    Quarter,
    /// 0.5x speed
    Half,
    /// Normal speed (1x)
    #[default]
    Normal,
    /// 2x speed
    Double,
    /// 4x speed
    Quadruple,
    /// 10x speed
    TenX,
}

const LADDER: [PlaybackSpeed; 6] = [
    PlaybackSpeed::Quarter,
    PlaybackSpeed::Half,
    PlaybackSpeed::Normal,
    PlaybackSpeed::Double,
    PlaybackSpeed::Quadruple,
    PlaybackSpeed::TenX,
];

impl PlaybackSpeed {
    /// Get the speed multiplier.
    pub fn multiplier(&self) -> f64 {
        match self {
            PlaybackSpeed::Quarter => 0.25,
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Double => 2.0,
            PlaybackSpeed::Quadruple => 4.0,
            PlaybackSpeed::TenX => 10.0,
        }
    }

    fn rank(self) -> usize {
        match self {
            PlaybackSpeed::Quarter => 0,
            PlaybackSpeed::Half => 1,
            PlaybackSpeed::Normal => 2,
            PlaybackSpeed::Double => 3,
            PlaybackSpeed::Quadruple => 4,
            PlaybackSpeed::TenX => 5,
        }
    }

    /// Next faster speed, saturating at the top.
    pub fn faster(self) -> Self {
        LADDER[(self.rank() + 1).min(LADDER.len() - 1)]
    }

    /// Next slower speed, saturating at the bottom.
    pub fn slower(self) -> Self {
        LADDER[self.rank().saturating_sub(1)]
    }

    /// Tick interval at this speed for the given normal-speed interval.
    pub fn tick_interval(&self, base: Duration) -> Duration {
        base.div_f64(self.multiplier())
    }
}

/// The one periodic timer driving playback ticks.
///
/// The clock only records when the next tick is due; the driver loop
/// sleeps until [`deadline`](Self::deadline) and reports the expiry back
/// as a timer message. Re-arming replaces the previous deadline, so at
/// most one tick is ever outstanding.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    interval: Option<Duration>,
    deadline: Option<Instant>,
}

impl PlaybackClock {
    /// Create a disarmed clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer one interval from now.
    pub fn start(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.deadline = Some(Instant::now() + interval);
    }

    /// Disarm the timer.
    pub fn stop(&mut self) {
        self.interval = None;
        self.deadline = None;
    }

    /// Consume the pending deadline. Returns `false` if the clock was not armed,
    /// in which case the expiry is stale and must be ignored.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a tick is pending.
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending tick is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Interval of the most recent arming, while armed.
    pub fn interval(&self) -> Option<Duration> {
        self.interval.filter(|_| self.deadline.is_some())
    }
}
