//! Live session actor: one task owns the sequencer for a session's lifetime.
//!
//! User keystrokes and inbound transcription arrive from independent
//! contexts. Both go through one command channel, so the sequencer sees a
//! single serialized stream. Accepted entries are published on a broadcast
//! channel for display; ending the session resets the high-water mark
//! exactly once and returns the final log.

use crate::error::{Error, Result};
use crate::model::conversation::{ConversationEntry, InboundEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use super::Sequencer;

enum Command {
    Inbound {
        event: InboundEvent,
        reply: Option<oneshot::Sender<bool>>,
    },
    End {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running live session. Cheap to clone.
#[derive(Clone)]
pub struct LiveSession {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    entries: broadcast::Sender<ConversationEntry>,
}

impl LiveSession {
    /// Start a session task. `capacity` bounds both the inbound command
    /// queue and the outbound broadcast buffer; zero is treated as one.
    ///
    /// The join handle resolves to the session's full log once it ends.
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<Vec<ConversationEntry>>) {
        let id = Uuid::new_v4();
        let capacity = capacity.max(1);
        let (commands, rx) = mpsc::channel(capacity);
        let (entries, _) = broadcast::channel(capacity);

        let span = tracing::info_span!("live_session", "session.id" = %id);
        let handle = tokio::spawn(run(rx, entries.clone()).instrument(span));

        (
            Self {
                id,
                commands,
                entries,
            },
            handle,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receive accepted entries from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEntry> {
        self.entries.subscribe()
    }

    /// Forward a transport event without waiting for the verdict.
    ///
    /// `Ok` only means the event was queued. An event still queued when the
    /// session ends is discarded.
    pub async fn send(&self, event: InboundEvent) -> Result<()> {
        self.command(Command::Inbound { event, reply: None }).await
    }

    /// Submit a typed message and wait until it is in the log.
    pub async fn submit_typed(
        &self,
        participant: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Inbound {
            event: InboundEvent::Typed {
                text: text.into(),
                participant: participant.into(),
            },
            reply: Some(tx),
        })
        .await?;
        rx.await.map(|_| ()).map_err(|_| self.ended())
    }

    /// Offer a transcribed fragment and wait for whether it was applied.
    pub async fn submit_transcribed(
        &self,
        participant: impl Into<String>,
        index: i64,
        text: impl Into<String>,
    ) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Inbound {
            event: InboundEvent::Transcribed {
                index,
                text: text.into(),
                participant: participant.into(),
            },
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| self.ended())
    }

    /// End the session. Returns once the session has stopped taking input,
    /// so every later submission fails.
    pub async fn end(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.command(Command::End { done }).await?;
        rx.await.map_err(|_| self.ended())
    }

    async fn command(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| self.ended())
    }

    fn ended(&self) -> Error {
        Error::Other(format!("live session {} has ended", self.id))
    }
}

async fn run(
    mut commands: mpsc::Receiver<Command>,
    entries: broadcast::Sender<ConversationEntry>,
) -> Vec<ConversationEntry> {
    let mut sequencer = Sequencer::new();
    info!("live session started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Inbound { event, reply } => {
                let accepted = sequencer.apply(event);
                if accepted {
                    if let Some(entry) = sequencer.entries().last() {
                        // No subscribers is fine; the log is still kept.
                        let _ = entries.send(entry.clone());
                    }
                }
                if let Some(reply) = reply {
                    let _ = reply.send(accepted);
                }
            }
            Command::End { done } => {
                commands.close();
                // Anything queued behind End is dropped along with its
                // reply sender, so a waiting submitter sees an error.
                let mut discarded = 0usize;
                while commands.try_recv().is_ok() {
                    discarded += 1;
                }
                if discarded > 0 {
                    warn!(discarded, "discarded input queued after session end");
                }
                let _ = done.send(());
                break;
            }
        }
    }

    debug!(high_water = ?sequencer.high_water_mark(), "resetting session");
    sequencer.reset_session();
    let log = sequencer.take_entries();
    info!(entries = log.len(), "live session ended");
    log
}
