//! Process-wide revision registry.
//!
//! The registry maps every `uid` to its latest counter and keeps a global
//! revision that advances on each accepted publish. It is owned by a single
//! task; sessions reach it only through a cloneable [`RegistryHandle`] that
//! sends one request and awaits exactly one reply. Requests are processed
//! strictly one at a time, which gives every read and write across all
//! sessions a single total order without any lock.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::error::GatewayError;

/// Intent of one registry round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    /// Reads the counter stored for `uid` (0 when absent).
    CounterOf {
        /// Entity identifier.
        uid: String,
    },
    /// Reads the current global revision.
    GlobalRevision,
    /// Stores `counter` for `uid` and advances the global revision.
    Publish {
        /// Entity identifier.
        uid: String,
        /// Revision announced by the publisher.
        revision: i64,
        /// New counter value for `uid`.
        counter: i64,
    },
    /// Reads monitoring figures.
    Stats,
}

/// Answer to a [`RegistryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryReply {
    /// Counter for a [`RegistryOp::CounterOf`] request.
    Counter(i64),
    /// Global revision, for [`RegistryOp::GlobalRevision`] and as the
    /// acknowledgement of [`RegistryOp::Publish`].
    Revision(i64),
    /// Answer to [`RegistryOp::Stats`].
    Stats(RegistryStats),
}

/// Point-in-time registry figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Number of distinct uids ever published.
    pub tracked_uids: usize,
    /// Current global revision.
    pub global_revision: i64,
}

#[derive(Debug)]
struct RegistryRequest {
    op: RegistryOp,
    respond_to: oneshot::Sender<RegistryReply>,
}

/// The registry state. Owned by the actor task once spawned.
#[derive(Debug, Default)]
pub struct Registry {
    counters: HashMap<String, i64>,
    global_revision: i64,
}

impl Registry {
    /// Creates an empty registry at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one operation and returns its reply.
    ///
    /// Writes are last-write-wins per uid: a smaller counter published
    /// later overwrites a larger one. The global revision moves to the
    /// publisher's revision when that is ahead, and otherwise advances by
    /// one, so it never decreases.
    pub fn apply(&mut self, op: RegistryOp) -> RegistryReply {
        match op {
            RegistryOp::CounterOf { uid } => {
                RegistryReply::Counter(self.counters.get(&uid).copied().unwrap_or(0))
            }
            RegistryOp::GlobalRevision => RegistryReply::Revision(self.global_revision),
            RegistryOp::Publish {
                uid,
                revision,
                counter,
            } => {
                self.counters.insert(uid, counter);
                self.global_revision = self.global_revision.saturating_add(1).max(revision);
                RegistryReply::Revision(self.global_revision)
            }
            RegistryOp::Stats => RegistryReply::Stats(RegistryStats {
                tracked_uids: self.counters.len(),
                global_revision: self.global_revision,
            }),
        }
    }

    /// Moves the registry into its own task and returns the handle used
    /// to reach it.
    ///
    /// The task exits once every [`RegistryHandle`] has been dropped.
    #[must_use]
    pub fn spawn(self, capacity: usize) -> RegistryHandle {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(self.run(receiver));
        RegistryHandle { sender }
    }

    async fn run(mut self, mut requests: mpsc::Receiver<RegistryRequest>) {
        tracing::debug!("revision registry started");
        while let Some(RegistryRequest { op, respond_to }) = requests.recv().await {
            let reply = self.apply(op);
            // The caller may have been cancelled while waiting.
            let _ = respond_to.send(reply);
        }
        tracing::info!(
            global_revision = self.global_revision,
            tracked_uids = self.counters.len(),
            "revision registry stopped"
        );
    }
}

/// Cloneable client side of the registry actor.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryRequest>,
}

impl RegistryHandle {
    /// Performs one round trip with the registry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the actor task is
    /// no longer running.
    pub async fn request(&self, op: RegistryOp) -> Result<RegistryReply, GatewayError> {
        let (respond_to, reply) = oneshot::channel();
        self.sender
            .send(RegistryRequest { op, respond_to })
            .await
            .map_err(|_| GatewayError::RegistryUnavailable)?;
        reply.await.map_err(|_| GatewayError::RegistryUnavailable)
    }

    /// Returns the counter stored for `uid`, or 0 if it was never published.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the actor is gone.
    pub async fn counter_of(&self, uid: &str) -> Result<i64, GatewayError> {
        match self
            .request(RegistryOp::CounterOf {
                uid: uid.to_string(),
            })
            .await?
        {
            RegistryReply::Counter(counter) => Ok(counter),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the current global revision.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the actor is gone.
    pub async fn global_revision(&self) -> Result<i64, GatewayError> {
        match self.request(RegistryOp::GlobalRevision).await? {
            RegistryReply::Revision(revision) => Ok(revision),
            other => Err(unexpected(&other)),
        }
    }

    /// Stores `counter` for `uid` and returns the resulting global revision.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the actor is gone.
    pub async fn publish(&self, uid: &str, revision: i64, counter: i64) -> Result<i64, GatewayError> {
        match self
            .request(RegistryOp::Publish {
                uid: uid.to_string(),
                revision,
                counter,
            })
            .await?
        {
            RegistryReply::Revision(revision) => Ok(revision),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns monitoring figures.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the actor is gone.
    pub async fn stats(&self) -> Result<RegistryStats, GatewayError> {
        match self.request(RegistryOp::Stats).await? {
            RegistryReply::Stats(stats) => Ok(stats),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(reply: &RegistryReply) -> GatewayError {
    tracing::error!(?reply, "registry answered with a mismatched reply");
    GatewayError::RegistryUnavailable
}
