//! Async driver: one task owns the engine and processes messages in order.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::buffer::{Delivery, Producer};
use crate::engine::{Message, ReplayEngine, Seek, Transport};
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::state::PlaybackStatus;

/// Sending side of an engine's inbox. Producers reply through this.
#[derive(Debug)]
pub struct Mailbox<B> {
    tx: mpsc::UnboundedSender<Message<B>>,
}

impl<B> Clone for Mailbox<B> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<B> Mailbox<B> {
    pub fn send(&self, message: Message<B>) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::EngineStopped)
    }

    /// Hand a producer response to the engine.
    pub fn deliver(&self, delivery: Delivery<B>) -> Result<()> {
        self.send(Message::BatchesDelivered(delivery))
    }
}

/// Create an engine inbox.
pub fn mailbox<B>() -> (Mailbox<B>, mpsc::UnboundedReceiver<Message<B>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Mailbox { tx }, rx)
}

/// Control handle for a running engine.
#[derive(Debug)]
pub struct ReplayHandle<B> {
    mailbox: Mailbox<B>,
    status: watch::Receiver<PlaybackStatus>,
}

impl<B> Clone for ReplayHandle<B> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox.clone(),
            status: self.status.clone(),
        }
    }
}

impl<B> ReplayHandle<B> {
    pub fn new(mailbox: Mailbox<B>, status: watch::Receiver<PlaybackStatus>) -> Self {
        Self { mailbox, status }
    }

    /// Latest published status.
    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Wait for the next status change.
    pub async fn changed(&mut self) -> Result<PlaybackStatus> {
        self.status.changed().await.map_err(|_| Error::EngineStopped)?;
        Ok(*self.status.borrow_and_update())
    }

    pub fn mailbox(&self) -> &Mailbox<B> {
        &self.mailbox
    }

    pub fn play(&self) -> Result<()> {
        self.mailbox.send(Message::Transport(Transport::Play))
    }

    pub fn pause(&self) -> Result<()> {
        self.mailbox.send(Message::Transport(Transport::Pause))
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.mailbox.send(Message::Transport(Transport::TogglePlay))
    }

    pub fn step(&self) -> Result<()> {
        self.mailbox.send(Message::Transport(Transport::Step))
    }

    pub fn jump_to(&self, time: u64) -> Result<()> {
        self.mailbox.send(Message::SeekRequested(Seek::To(time)))
    }

    pub fn jump_by(&self, delta: i64) -> Result<()> {
        self.mailbox.send(Message::SeekRequested(Seek::By(delta)))
    }

    pub fn jump_to_start(&self) -> Result<()> {
        self.mailbox.send(Message::SeekRequested(Seek::Start))
    }

    pub fn jump_to_end(&self) -> Result<()> {
        self.mailbox.send(Message::SeekRequested(Seek::End))
    }

    pub fn set_speed(&self, faster: bool) -> Result<()> {
        self.mailbox.send(Message::SpeedChanged { faster })
    }

    /// Ask the driver loop to exit.
    pub fn shutdown(&self) -> Result<()> {
        self.mailbox.send(Message::Shutdown)
    }
}

/// Run the engine until [`Message::Shutdown`] or until every sender is gone.
/// Returns the engine so its final state can be inspected.
pub async fn run<S, P>(
    mut engine: ReplayEngine<S, P>,
    mut inbox: mpsc::UnboundedReceiver<Message<S::Batch>>,
    status: watch::Sender<PlaybackStatus>,
) -> ReplayEngine<S, P>
where
    S: Snapshot,
    P: Producer,
{
    engine.begin();
    status.send_replace(engine.status());

    loop {
        let deadline = engine.clock().deadline();
        let message = tokio::select! {
            message = inbox.recv() => match message {
                Some(Message::Shutdown) | None => break,
                Some(message) => message,
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                Message::TimerFired
            }
        };
        engine.handle(message);
        status.send_replace(engine.status());
    }

    debug!(phase = %engine.phase(), "replay driver stopped");
    engine
}

/// Spawn the driver on the current runtime.
pub fn spawn<S, P>(
    engine: ReplayEngine<S, P>,
    mailbox: Mailbox<S::Batch>,
    inbox: mpsc::UnboundedReceiver<Message<S::Batch>>,
) -> (ReplayHandle<S::Batch>, JoinHandle<ReplayEngine<S, P>>)
where
    S: Snapshot + Send + 'static,
    S::Batch: Send + 'static,
    P: Producer + Send + 'static,
{
    let (status_tx, status_rx) = watch::channel(engine.status());
    let task = tokio::spawn(run(engine, inbox, status_tx));
    (ReplayHandle::new(mailbox, status_rx), task)
}
