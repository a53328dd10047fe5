//! Playback phase, play mode, and the status view published to the UI.

use serde::{Deserialize, Serialize};

use crate::clock::PlaybackSpeed;

/// Buffering/seek phase of the playback state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No batch applied yet; waiting for the first delivery.
    #[default]
    Initializing,
    /// Under-buffered and not playing; more data has been requested.
    Red,
    /// Playing while below threshold; more data has been requested.
    Yellow,
    /// Buffered at or above threshold; playing freely.
    Green,
    /// Producer finished; playing down the remaining queue.
    Draining,
    /// Terminal: nothing left to replay or animate.
    Finished,
    /// Seek restarting the stream from time 0.
    Jumping,
    /// Seek waiting for data before forwarding can begin.
    BeforeJumping,
    /// Seek fast-playing the shadow state toward the target.
    Forwarding,
}

impl PlaybackPhase {
    /// Phases in which a tick advances the live state.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Yellow | Self::Green | Self::Draining)
    }

    /// Phases belonging to an in-flight seek.
    pub fn is_seeking(self) -> bool {
        matches!(self, Self::Jumping | Self::BeforeJumping | Self::Forwarding)
    }

    /// Phase to settle into after data arrives while not actively ticking.
    ///
    /// Below the threshold playback parks in `Red` rather than `Yellow`:
    /// it only resumes once the buffer has refilled.
    pub fn settle(queued: usize, producer_finished: bool, threshold: usize) -> Self {
        if producer_finished {
            if queued == 0 {
                Self::Finished
            } else {
                Self::Draining
            }
        } else if queued < threshold {
            Self::Red
        } else {
            Self::Green
        }
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "Initializing",
            Self::Red => "Red",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Draining => "Draining",
            Self::Finished => "Finished",
            Self::Jumping => "Jumping",
            Self::BeforeJumping => "BeforeJumping",
            Self::Forwarding => "Forwarding",
        };
        f.write_str(name)
    }
}

/// User-facing intent; gates whether ticks advance playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMode {
    Playing,
    #[default]
    Paused,
}

impl PlayMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Playing => Self::Paused,
            Self::Paused => Self::Playing,
        }
    }
}

/// Phase, mode and seek target, replaced as a whole on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub mode: PlayMode,
    /// Set while a seek is in flight.
    pub target: Option<u64>,
}

impl PlaybackState {
    pub const fn new(mode: PlayMode) -> Self {
        Self {
            phase: PlaybackPhase::Initializing,
            mode,
            target: None,
        }
    }

    #[must_use]
    pub fn with_phase(self, phase: PlaybackPhase) -> Self {
        Self { phase, ..self }
    }

    #[must_use]
    pub fn with_mode(self, mode: PlayMode) -> Self {
        Self { mode, ..self }
    }

    /// Enter (or stay in) a seek phase aimed at `target`.
    #[must_use]
    pub fn seeking(self, phase: PlaybackPhase, target: u64) -> Self {
        debug_assert!(phase.is_seeking(), "{phase} is not a seek phase");
        Self {
            phase,
            target: Some(target),
            ..self
        }
    }

    /// Leave a seek, clearing the target.
    #[must_use]
    pub fn settled(self, phase: PlaybackPhase) -> Self {
        debug_assert!(!phase.is_seeking(), "{phase} is a seek phase");
        Self {
            phase,
            target: None,
            ..self
        }
    }
}

/// Read-only view of the engine for transport controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub phase: PlaybackPhase,
    pub mode: PlayMode,
    pub speed: PlaybackSpeed,
    /// Simulated time of the live state.
    pub time: u64,
    /// Seek target while a seek is in flight.
    pub target: Option<u64>,
    /// Batches waiting in the queue.
    pub queued: usize,
    /// Most batches ever queued at once.
    pub peak_queued: usize,
    pub producer_finished: bool,
    /// Whether the last step changed anything visible.
    pub redraw: bool,
}
