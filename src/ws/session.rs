//! Per-connection session state.
//!
//! A [`Session`] is owned by exactly one preparer task. It holds the
//! handshake state, the channel id and the subscription cache mapping each
//! tracked `uid` to the last counter the client is known to have seen.

use std::collections::HashMap;
use std::net::SocketAddr;

use super::messages::push_change;
use crate::domain::{RegistryHandle, SessionId};
use crate::error::GatewayError;

/// Mutable state of one subscriber session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    ready: bool,
    chid: Option<String>,
    cache: HashMap<String, i64>,
    last_checked_revision: i64,
}

impl Session {
    /// Creates an unready session for a newly accepted peer.
    #[must_use]
    pub fn new(id: SessionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            ready: false,
            chid: None,
            cache: HashMap::new(),
            last_checked_revision: 0,
        }
    }

    /// Session identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address of the client.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns `true` once the handshake message has been consumed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Channel id bound by the handshake, if any.
    #[must_use]
    pub fn chid(&self) -> Option<&str> {
        self.chid.as_deref()
    }

    /// Counter the client is known to have seen for `uid`.
    #[must_use]
    pub fn cached(&self, uid: &str) -> Option<i64> {
        self.cache.get(uid).copied()
    }

    /// Number of tracked uids.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.cache.len()
    }

    /// Global revision observed by the last change check.
    #[must_use]
    pub const fn last_checked_revision(&self) -> i64 {
        self.last_checked_revision
    }

    pub(crate) fn mark_ready(&mut self, chid: Option<&str>) {
        if let Some(chid) = chid {
            self.chid = Some(chid.to_string());
        }
        self.ready = true;
    }

    pub(crate) fn subscribe(&mut self, uid: &str, hint: i64) {
        self.cache.insert(uid.to_string(), hint);
    }

    pub(crate) fn unsubscribe(&mut self, uid: &str) {
        self.cache.remove(uid);
    }

    pub(crate) fn clear(&mut self) {
        self.cache.clear();
    }

    pub(crate) fn set_last_checked_revision(&mut self, revision: i64) {
        self.last_checked_revision = revision;
    }

    /// Lists every tracked uid whose registry counter is ahead of the cache,
    /// as a comma-joined `uid=counter` string, and advances the cache to the
    /// registry values. Returns an empty string when nothing is stale.
    ///
    /// Iteration order follows the cache and is not deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RegistryUnavailable`] if the registry stops
    /// answering; entries visited before the failure keep their update.
    pub async fn collect_changes(
        &mut self,
        registry: &RegistryHandle,
    ) -> Result<String, GatewayError> {
        let mut changes = String::new();
        for (uid, cached) in &mut self.cache {
            let current = registry.counter_of(uid).await?;
            if current > *cached {
                push_change(&mut changes, uid, current);
                *cached = current;
            }
        }
        Ok(changes)
    }
}
