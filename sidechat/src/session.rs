//! Cancellation registry for in-flight streamed requests.
//!
//! Each session owns exactly one registry key for its whole lifetime.
//! Registration hands back a guard that deregisters on drop, so a session
//! id can never leak past its terminal event.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Entry {
    epoch: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Entry>,
    next_epoch: u64,
}

/// Map of session id to cancel handle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its guard.
    ///
    /// Re-registering an id cancels the superseded session: a retry of a
    /// message takes over its slot.
    pub fn register(&self, id: impl Into<String>) -> SessionGuard {
        let id = id.into();
        let token = CancellationToken::new();

        let mut inner = self.inner.lock();
        let epoch = inner.next_epoch;
        inner.next_epoch += 1;
        if let Some(previous) = inner.sessions.insert(
            id.clone(),
            Entry {
                epoch,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        SessionGuard {
            id,
            epoch,
            token,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cancel a session and remove it. Returns whether one was registered.
    pub fn cancel(&self, id: &str) -> bool {
        let entry = self.inner.lock().sessions.remove(id);
        match entry {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a session is currently registered.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.inner.lock().sessions.contains_key(id)
    }

    /// Number of in-flight sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no session is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().sessions.is_empty()
    }
}

/// Scoped registration of one session.
pub struct SessionGuard {
    id: String,
    epoch: u64,
    token: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl SessionGuard {
    /// The session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The cancel handle.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the session was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        // Only remove the entry if it is still ours; a newer session may
        // have taken over the id.
        if inner
            .sessions
            .get(&self.id)
            .is_some_and(|entry| entry.epoch == self.epoch)
        {
            inner.sessions.remove(&self.id);
        }
    }
}
