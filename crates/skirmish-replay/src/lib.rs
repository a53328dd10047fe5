//! Skirmish Replay
//!
//! Buffered, seekable real-time playback of a recorded encounter whose
//! event batches stream in from a producer running elsewhere.
//!
//! # Architecture
//!
//! - **Buffer**: queues delivered batches and decides when to ask the
//!   producer for more
//! - **Engine**: nine-phase state machine reacting to deliveries and ticks
//! - **Seek**: full restart for backward jumps, shadow fast-play for
//!   forward ones
//! - **Clock**: single tick timer whose interval follows the playback speed
//! - **Driver**: one tokio task processing [`Message`]s in arrival order
//!
//! # Usage
//!
//! ```ignore
//! let (mailbox, inbox) = skirmish_replay::mailbox();
//! let producer = MyProducer::new(mailbox.clone());
//! let engine = ReplayEngine::<MySnapshot, _>::new(producer, &ReplayConfig::default());
//! let (handle, _task) = skirmish_replay::spawn(engine, mailbox, inbox);
//!
//! handle.jump_to(120)?;
//! handle.play()?;
//! ```

pub mod buffer;
pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod queue;
mod seek;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod testing;

pub use buffer::{BufferController, Delivery, Producer, StreamId};
pub use clock::{PlaybackClock, PlaybackSpeed};
pub use config::ReplayConfig;
pub use driver::{mailbox, run, spawn, Mailbox, ReplayHandle};
pub use engine::{Message, ReplayEngine, Seek, Transport};
pub use error::{Error, Result};
pub use queue::EventQueue;
pub use snapshot::Snapshot;
pub use state::{PlayMode, PlaybackPhase, PlaybackState, PlaybackStatus};
