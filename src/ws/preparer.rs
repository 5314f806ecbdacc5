//! Protocol state machine for one session.
//!
//! The preparer consumes its inbox one item at a time. Each client frame
//! is answered with exactly one [`Outbound::Reply`]; afterwards, and after
//! every tick, it runs the change check and may emit an
//! [`Outbound::Push`] with the subscriptions that went stale.
//!
//! ```text
//! Unready ──(any client frame)──▶ Ready ──(cancel)──▶ Closed
//! ```

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::{Command, Directive, INVALID_MESSAGE, Inbound, Outbound, parse_handshake};
use super::session::Session;
use crate::domain::RegistryHandle;
use crate::error::GatewayError;

/// Result of processing one inbox item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Reply for a client frame; `None` for ticks.
    pub reply: Option<String>,
    /// Change notification found by the trailing change check.
    pub push: Option<String>,
}

/// Owns a [`Session`] and drives it through the protocol.
#[derive(Debug)]
pub struct Preparer {
    session: Session,
    registry: RegistryHandle,
}

impl Preparer {
    /// Binds a session to the shared registry.
    #[must_use]
    pub const fn new(session: Session, registry: RegistryHandle) -> Self {
        Self { session, registry }
    }

    /// Read access to the session state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Processes one inbox item.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if a registry round
    /// trip fails.
    pub async fn handle(&mut self, inbound: Inbound) -> Result<Step, GatewayError> {
        let reply = match inbound {
            Inbound::Tick => None,
            Inbound::Text(text) => {
                if text != "T" {
                    tracing::debug!(session = %self.session.id(), msg = %text, "received message");
                }
                Some(self.handle_text(&text).await?)
            }
        };
        let push = self.check_changes().await?;
        Ok(Step { reply, push })
    }

    async fn handle_text(&mut self, text: &str) -> Result<String, GatewayError> {
        if !self.session.is_ready() {
            let chid = parse_handshake(text);
            self.session.mark_ready(chid);
            if let Some(chid) = chid {
                tracing::info!(session = %self.session.id(), chid, "channel bound");
            }
            return Ok(String::new());
        }

        match Command::parse(text) {
            Command::Poll | Command::Ignored | Command::UnparsableFields => Ok(String::new()),
            Command::Malformed => Ok(INVALID_MESSAGE.to_string()),
            Command::Publish {
                uid,
                counter,
                revision,
            } => {
                let global = self.registry.publish(uid, revision, counter).await?;
                tracing::debug!(session = %self.session.id(), uid, counter, global, "published");
                Ok(String::new())
            }
            Command::FullSync => self.session.collect_changes(&self.registry).await,
            Command::ClearAll => {
                self.session.clear();
                Ok(String::new())
            }
            Command::Batch(directives) => self.apply_batch(&directives).await,
        }
    }

    /// Applies subscribe / unsubscribe directives in order. A subscription
    /// whose hint is behind the registry triggers an immediate snapshot;
    /// several snapshots in one batch are joined into one reply.
    async fn apply_batch(&mut self, directives: &[Directive<'_>]) -> Result<String, GatewayError> {
        let mut reply = String::new();
        for directive in directives {
            match *directive {
                Directive::Subscribe { uid, hint } => {
                    self.session.subscribe(uid, hint);
                    let current = self.registry.counter_of(uid).await?;
                    if current > hint {
                        // Read before the snapshot so a write that lands
                        // during it still moves the revision past this mark.
                        let revision = self.registry.global_revision().await?;
                        let snapshot = self.session.collect_changes(&self.registry).await?;
                        if !snapshot.is_empty() {
                            if !reply.is_empty() {
                                reply.push(',');
                            }
                            reply.push_str(&snapshot);
                        }
                        self.session.set_last_checked_revision(revision);
                    }
                }
                Directive::Unsubscribe { uid } => self.session.unsubscribe(uid),
            }
        }
        Ok(reply)
    }

    /// Runs the change check if the global revision moved since the last
    /// one.
    async fn check_changes(&mut self) -> Result<Option<String>, GatewayError> {
        let revision = self.registry.global_revision().await?;
        if revision <= self.session.last_checked_revision() {
            return Ok(None);
        }
        let changes = self.session.collect_changes(&self.registry).await?;
        self.session.set_last_checked_revision(revision);
        Ok((!changes.is_empty()).then_some(changes))
    }

    /// Task loop: consumes the inbox until the session is cancelled, the
    /// inbox closes, the receiver goes away or the registry fails.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Inbound>,
        outbound: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
    ) {
        let id = self.session.id();
        tracing::debug!(session = %id, peer = %self.session.peer(), "spawn preparer");

        loop {
            let inbound = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                inbound = inbox.recv() => match inbound {
                    Some(inbound) => inbound,
                    None => break,
                },
            };

            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                step = self.handle(inbound) => step,
            };
            let step = match step {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!(session = %id, error = %e, "preparer stopped");
                    break;
                }
            };

            let outputs = step
                .reply
                .map(Outbound::Reply)
                .into_iter()
                .chain(step.push.map(Outbound::Push));
            for output in outputs {
                let sent = tokio::select! {
                    biased;
                    () = cancel.cancelled() => false,
                    sent = outbound.send(output) => sent.is_ok(),
                };
                if !sent {
                    tracing::debug!(session = %id, "close preparer");
                    return;
                }
            }
        }

        tracing::debug!(session = %id, "close preparer");
    }
}
