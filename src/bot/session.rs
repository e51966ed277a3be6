use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use teloxide::types::UserId;
use tracing::debug;

/// Where a user is in the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingStart,
    AwaitingVerification,
    Ready,
    Dispatching,
    AwaitingResult,
    Responding,
}

impl SessionState {
    /// A request is between membership re-check and delivery.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Dispatching | Self::AwaitingResult | Self::Responding
        )
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::AwaitingStart | Self::AwaitingVerification)
    }
}

const BUSY: [SessionState; 3] = [
    SessionState::Dispatching,
    SessionState::AwaitingResult,
    SessionState::Responding,
];
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy)]
struct Entry {
    state: SessionState,
    touched: Instant,
}

struct Table {
    entries: HashMap<UserId, Entry>,
    last_prune: Instant,
}

/// Per-user session states. The lock is never held across an `.await`.
/// Users idle for longer than `idle_ttl` are forgotten and start over.
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<Mutex<Table>>,
    idle_ttl: Duration,
}

impl Sessions {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Table {
                entries: HashMap::new(),
                last_prune: Instant::now(),
            })),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.state.is_busy() || entry.touched.elapsed() < self.idle_ttl
    }

    fn current(&self, table: &Table, user: UserId) -> SessionState {
        table
            .entries
            .get(&user)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.state)
            .unwrap_or(SessionState::AwaitingStart)
    }

    fn store(&self, table: &mut Table, user: UserId, state: SessionState) {
        if table.last_prune.elapsed() >= self.idle_ttl.min(PRUNE_INTERVAL) {
            let before = table.entries.len();
            table.entries.retain(|_, entry| self.is_live(entry));
            table.last_prune = Instant::now();
            if table.entries.len() < before {
                debug!("Forgot {} idle sessions", before - table.entries.len());
            }
        }

        if state == SessionState::AwaitingStart {
            table.entries.remove(&user);
        } else {
            table.entries.insert(
                user,
                Entry {
                    state,
                    touched: Instant::now(),
                },
            );
        }
    }

    pub fn state(&self, user: UserId) -> SessionState {
        let table = self.lock();
        self.current(&table, user)
    }

    #[cfg(test)]
    pub fn set(&self, user: UserId, state: SessionState) {
        debug!(user_id = user.0, ?state, "session state");
        let mut table = self.lock();
        self.store(&mut table, user, state);
    }

    /// Moves to `to` only if the current state is one of `from`.
    pub fn transition(&self, user: UserId, from: &[SessionState], to: SessionState) -> bool {
        let mut table = self.lock();
        let current = self.current(&table, user);
        if from.contains(&current) {
            debug!(user_id = user.0, from = ?current, to = ?to, "session transition");
            self.store(&mut table, user, to);
            true
        } else {
            false
        }
    }

    /// Claims the user's single in-flight slot (`Ready` → `Dispatching`).
    /// Returns the current state when the user is not `Ready`.
    pub fn begin(&self, user: UserId) -> Result<InFlight, SessionState> {
        let mut table = self.lock();
        let current = self.current(&table, user);
        if current != SessionState::Ready {
            return Err(current);
        }
        self.store(&mut table, user, SessionState::Dispatching);
        debug!(user_id = user.0, "request dispatching");

        Ok(InFlight {
            sessions: self.clone(),
            user,
            exit: SessionState::Ready,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

/// Held while a request is in flight. Dropping it releases the slot.
pub struct InFlight {
    sessions: Sessions,
    user: UserId,
    exit: SessionState,
}

impl InFlight {
    pub fn advance(&self, state: SessionState) {
        self.sessions.transition(self.user, &BUSY, state);
    }

    /// Membership lapsed: the user goes back to verification on release.
    pub fn lapse(&mut self) {
        self.exit = SessionState::AwaitingVerification;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.sessions.transition(self.user, &BUSY, self.exit);
    }
}
