//! Session registry for live generation connections.
//!
//! Each admitted connection owns an outbound channel; a writer task drains it
//! into the socket. Messages to one session are delivered in the order `send`
//! was called, and sends to a removed session are dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use quillcast_domain::{SessionId, UserId};
use quillcast_shared::ServerMessage;

use crate::infrastructure::ports::ClockPort;

/// Information about an admitted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
}

/// Tracks all live generation sessions.
pub struct SessionRegistry {
    /// Map of session_id -> (SessionInfo, sender channel)
    sessions: DashMap<SessionId, (SessionInfo, mpsc::Sender<ServerMessage>)>,
    clock: Arc<dyn ClockPort>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }

    /// Admit a connection for an authenticated user.
    pub fn admit(&self, sender: mpsc::Sender<ServerMessage>, user_id: UserId) -> SessionInfo {
        let info = SessionInfo {
            session_id: SessionId::new(),
            user_id,
            connected_at: self.clock.now(),
        };
        self.sessions
            .insert(info.session_id, (info.clone(), sender));
        tracing::debug!(session_id = %info.session_id, user_id = %user_id, "Session admitted");
        info
    }

    /// Queue a message for a session without waiting.
    ///
    /// Returns `false` when the message was not queued. A session whose
    /// outbound buffer is full is evicted.
    pub fn send(&self, session_id: SessionId, message: ServerMessage) -> bool {
        let Some(sender) = self.sender(session_id) else {
            tracing::trace!(session_id = %session_id, "Dropping message for closed session");
            return false;
        };
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = %session_id, "Outbound buffer full, evicting session");
                self.remove(session_id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Remove a session. Idempotent.
    pub fn remove(&self, session_id: SessionId) -> Option<SessionInfo> {
        let removed = self.sessions.remove(&session_id).map(|(_, (info, _))| info);
        if removed.is_some() {
            tracing::debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    pub fn get(&self, session_id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&session_id).map(|entry| entry.0.clone())
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn sender(&self, session_id: SessionId) -> Option<mpsc::Sender<ServerMessage>> {
        self.sessions.get(&session_id).map(|entry| entry.1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(SystemClock::new()))
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(128);
        let info = registry.admit(tx, UserId::new());

        for i in 0..100 {
            assert!(registry.send(
                info.session_id,
                ServerMessage::Chunk {
                    content: i.to_string(),
                },
            ));
        }

        for i in 0..100 {
            assert_eq!(
                rx.recv().await,
                Some(ServerMessage::Chunk {
                    content: i.to_string()
                })
            );
        }
    }

    #[tokio::test]
    async fn send_after_remove_is_dropped() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(4);
        let info = registry.admit(tx, UserId::new());

        assert!(registry.remove(info.session_id).is_some());
        assert!(registry.remove(info.session_id).is_none());

        assert!(!registry.send(info.session_id, ServerMessage::Pong));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let registry = registry();
        let (tx, rx) = mpsc::channel(4);
        let info = registry.admit(tx, UserId::new());
        drop(rx);

        assert!(!registry.send(info.session_id, ServerMessage::Pong));
        assert!(registry.contains(info.session_id));
    }

    #[test]
    fn full_buffer_evicts_session_without_waiting() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(2);
        let info = registry.admit(tx, UserId::new());

        assert!(registry.send(info.session_id, ServerMessage::Pong));
        assert!(registry.send(info.session_id, ServerMessage::Pong));
        assert!(!registry.send(info.session_id, ServerMessage::Pong));
        assert!(!registry.contains(info.session_id));
    }

    #[test]
    fn admitted_sessions_are_distinct() {
        let registry = registry();
        let user = UserId::new();
        let (tx, _rx) = mpsc::channel(1);
        let a = registry.admit(tx.clone(), user);
        let b = registry.admit(tx, user);

        assert_ne!(a.session_id, b.session_id);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a.session_id).map(|i| i.user_id), Some(user));
    }
}
