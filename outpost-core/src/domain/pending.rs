//! Pending-call table correlating requests with responses.
//!
//! Each outbound invocation parks a oneshot sender keyed by message
//! id. A response arriving for an unknown or already-resolved id is
//! reported to the caller of `resolve` and otherwise has no effect.

use std::sync::OnceLock;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::domain::DisconnectReason;
use crate::types::MessageId;
use crate::wire::CallOutcome;

/// What a waiting caller eventually receives: the remote outcome, or
/// the reason the channel went away first.
pub type CallReply = Result<CallOutcome, DisconnectReason>;

/// Table of calls awaiting a response.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: DashMap<MessageId, oneshot::Sender<CallReply>>,
    /// Set by `fail_all`; registrations after that fail immediately.
    closed: OnceLock<DisconnectReason>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
            closed: OnceLock::new(),
        }
    }

    /// Park a new waiter under `id`.
    ///
    /// Must be called before the request bytes are handed to the
    /// transport, otherwise a fast peer could answer before the
    /// waiter exists and the response would be dropped as unmatched.
    /// Once `fail_all` has run, the waiter is failed on the spot with
    /// the recorded reason; no response can arrive for it.
    pub fn register(&self, id: MessageId) -> oneshot::Receiver<CallReply> {
        let (tx, rx) = oneshot::channel();
        self.calls.insert(id, tx);
        // fail_all publishes the reason before draining, so a waiter
        // that slipped in after the drain is caught here.
        if let Some(reason) = self.closed.get() {
            if let Some((_, tx)) = self.calls.remove(&id) {
                let _ = tx.send(Err(reason.clone()));
            }
        }
        rx
    }

    /// Deliver an outcome to the waiter for `id`.
    ///
    /// Returns false when no waiter exists, which covers both ids
    /// never issued and ids already resolved once.
    pub fn resolve(&self, id: MessageId, outcome: CallOutcome) -> bool {
        match self.calls.remove(&id) {
            Some((_, tx)) => tx.send(Ok(outcome)).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter for `id` without delivering anything.
    /// Used when the send side fails after registration.
    pub fn abandon(&self, id: MessageId) {
        self.calls.remove(&id);
    }

    /// Fail every parked waiter with the given disconnect reason and
    /// mark the table closed for later registrations.
    /// Returns how many waiters were failed.
    pub fn fail_all(&self, reason: &DisconnectReason) -> usize {
        let _ = self.closed.set(reason.clone());
        let ids: Vec<MessageId> = self.calls.iter().map(|r| *r.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, tx)) = self.calls.remove(&id) {
                let _ = tx.send(Err(reason.clone()));
                failed += 1;
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_then_resolve() {
        let pending = PendingCalls::new();
        let id = MessageId::new();
        let rx = pending.register(id);
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(id, CallOutcome::ok(json!(5))));
        assert!(pending.is_empty());

        let reply = rx.await.unwrap();
        assert_eq!(reply.unwrap(), CallOutcome::ok(json!(5)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_reports_false() {
        let pending = PendingCalls::new();
        assert!(!pending.resolve(MessageId::new(), CallOutcome::ok(json!(null))));
    }

    #[tokio::test]
    async fn test_duplicate_resolve_reports_false() {
        let pending = PendingCalls::new();
        let id = MessageId::new();
        let _rx = pending.register(id);

        assert!(pending.resolve(id, CallOutcome::ok(json!(1))));
        assert!(!pending.resolve(id, CallOutcome::ok(json!(2))));
    }

    #[tokio::test]
    async fn test_fail_all_delivers_reason() {
        let pending = PendingCalls::new();
        let rx1 = pending.register(MessageId::new());
        let rx2 = pending.register(MessageId::new());
        let rx3 = pending.register(MessageId::new());

        let failed = pending.fail_all(&DisconnectReason::PeerDisconnected);
        assert_eq!(failed, 3);
        assert!(pending.is_empty());

        for rx in [rx1, rx2, rx3] {
            let reply = rx.await.unwrap();
            assert_eq!(reply.unwrap_err(), DisconnectReason::PeerDisconnected);
        }
    }

    #[tokio::test]
    async fn test_abandon_removes_waiter() {
        let pending = PendingCalls::new();
        let id = MessageId::new();
        let rx = pending.register(id);

        pending.abandon(id);
        assert!(pending.is_empty());
        assert!(!pending.resolve(id, CallOutcome::ok(json!(null))));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_register_after_fail_all_fails_on_the_spot() {
        let pending = PendingCalls::new();
        pending.fail_all(&DisconnectReason::PeerDisconnected);

        // A registration that lost the race against the drain must
        // not be left waiting for a response that cannot arrive.
        let rx = pending.register(MessageId::new());
        let reply = rx.await.unwrap();
        assert_eq!(reply.unwrap_err(), DisconnectReason::PeerDisconnected);
        assert!(pending.is_empty());
    }
}
