//! **Connection registry** — the one audio source and the set of listeners.
//!
//! Handles are cheap channel senders; the socket task on the other end drains
//! the channel into the wire. All shared state lives behind a single mutex
//! (contention is per-utterance and per-connect, not per-audio-chunk).
//! Broadcasts snapshot the listener set, so a listener disconnecting
//! mid-broadcast can never break the iteration, and a failed send prunes that
//! listener without touching the rest.

use crate::messages::OutboundMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Unique, process-wide connection identity.
pub type ConnectionId = u64;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// One frame queued for delivery to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Ask the socket task to close the connection.
    Close,
}

/// Sending side of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Frame>,
}

impl ListenerHandle {
    /// Create a handle and the receiving end its socket task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: next_connection_id(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a JSON text frame. `false` if the connection is gone.
    pub fn send_message(&self, message: &OutboundMessage) -> bool {
        self.tx.send(Frame::Text(message.to_json())).is_ok()
    }

    /// Queue a binary frame. `false` if the connection is gone.
    pub fn send_binary(&self, payload: Vec<u8>) -> bool {
        self.tx.send(Frame::Binary(payload)).is_ok()
    }

    /// Ask the socket task to close this connection.
    pub fn close(&self) {
        let _ = self.tx.send(Frame::Close);
    }
}

#[derive(Default)]
struct Inner {
    listeners: HashMap<ConnectionId, ListenerHandle>,
    audio_source: Option<ListenerHandle>,
}

/// Shared registry of the audio source and all listening connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Re-registering the same handle is a no-op.
    pub fn register_listener(&self, handle: ListenerHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.insert(handle.id(), handle);
        info!("🌐 Listener registered ({} total)", inner.listeners.len());
    }

    /// Remove a listener. No-op if it was never registered.
    pub fn unregister_listener(&self, id: ConnectionId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.listeners.remove(&id).is_some() {
            info!("🌐 Listener left ({} total)", inner.listeners.len());
        }
    }

    /// Replace the audio source unconditionally. The previous source, if any,
    /// is NOT closed here; a stale source keeps its connection until its own
    /// task ends or a caller closes it explicitly. Last writer wins.
    // TODO: revisit whether replacing should close the old source; today a
    // stale bridge can keep feeding a dead stream until it disconnects.
    pub fn set_audio_source(&self, handle: ListenerHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.audio_source = Some(handle);
    }

    /// Take the current audio source, leaving the slot empty. Closing the
    /// returned handle is the caller's responsibility.
    pub fn take_audio_source(&self) -> Option<ListenerHandle> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.audio_source.take()
    }

    /// Clear the audio source slot only if `id` still owns it.
    pub fn clear_audio_source(&self, id: ConnectionId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.audio_source.as_ref().map(ListenerHandle::id) == Some(id) {
            inner.audio_source = None;
        }
    }

    pub fn listener_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.len()
    }

    fn snapshot(&self) -> Vec<ListenerHandle> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.values().cloned().collect()
    }

    fn prune(&self, failed: &[ConnectionId]) {
        if failed.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for id in failed {
            inner.listeners.remove(id);
        }
        debug!(
            "pruned {} dead listener(s), {} remain",
            failed.len(),
            inner.listeners.len()
        );
    }

    /// Send a JSON message to every listener. Failed handles are pruned;
    /// failures never reach the caller.
    pub fn broadcast_message(&self, message: &OutboundMessage) {
        let json = message.to_json();
        let mut failed = Vec::new();
        for handle in self.snapshot() {
            if handle.tx.send(Frame::Text(json.clone())).is_err() {
                failed.push(handle.id());
            }
        }
        self.prune(&failed);
    }

    /// Send a binary payload to every listener. Failed handles are pruned.
    pub fn broadcast_binary(&self, payload: &[u8]) {
        let mut failed = Vec::new();
        for handle in self.snapshot() {
            if handle.send_binary(payload.to_vec()) {
                continue;
            }
            failed.push(handle.id());
        }
        self.prune(&failed);
    }

    /// Best-effort status update; send failures are ignored, nothing is pruned.
    pub fn broadcast_status(&self, message: &str) {
        let status = OutboundMessage::status(message);
        for handle in self.snapshot() {
            let _ = handle.send_message(&status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(registry: &ConnectionRegistry) -> (ListenerHandle, mpsc::UnboundedReceiver<Frame>) {
        let (handle, rx) = ListenerHandle::new();
        registry.register_listener(handle.clone());
        (handle, rx)
    }

    #[test]
    fn broadcast_survives_one_dead_listener() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registered(&registry);
        let (_b, rx_b) = registered(&registry);
        let (_c, mut rx_c) = registered(&registry);
        assert_eq!(registry.listener_count(), 3);

        // b disconnects without unregistering.
        drop(rx_b);

        registry.broadcast_message(&OutboundMessage::Pong);
        assert_eq!(registry.listener_count(), 2);
        assert!(matches!(rx_a.try_recv().unwrap(), Frame::Text(_)));
        assert!(matches!(rx_c.try_recv().unwrap(), Frame::Text(_)));
    }

    #[test]
    fn broadcast_binary_prunes_and_delivers() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registered(&registry);
        let (_b, rx_b) = registered(&registry);
        drop(rx_b);

        registry.broadcast_binary(&[9, 9, 9]);
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(rx_a.try_recv().unwrap(), Frame::Binary(vec![9, 9, 9]));
    }

    #[test]
    fn status_failures_do_not_prune() {
        let registry = ConnectionRegistry::new();
        let (_a, rx_a) = registered(&registry);
        drop(rx_a);

        registry.broadcast_status("hello");
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn register_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = ListenerHandle::new();
        registry.register_listener(handle.clone());
        registry.register_listener(handle);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn unregister_absent_listener_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.unregister_listener(12345);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn audio_source_last_writer_wins() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = ListenerHandle::new();
        let (second, _second_rx) = ListenerHandle::new();
        registry.set_audio_source(first);
        registry.set_audio_source(second.clone());

        // The first source was replaced, not closed.
        assert!(first_rx.try_recv().is_err());

        let taken = registry.take_audio_source().unwrap();
        assert_eq!(taken.id(), second.id());
        assert!(registry.take_audio_source().is_none());
    }

    #[test]
    fn clear_audio_source_checks_ownership() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = ListenerHandle::new();
        let (second, _rx2) = ListenerHandle::new();
        let first_id = first.id();
        registry.set_audio_source(first);
        registry.set_audio_source(second.clone());

        // A stale disconnect must not clear the newer source.
        registry.clear_audio_source(first_id);
        assert!(registry.take_audio_source().is_some());
    }
}
