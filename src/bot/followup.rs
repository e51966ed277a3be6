use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use teloxide::types::UserId;
use tracing::debug;

use crate::media::{MediaResult, ScratchDir};

/// A delivered result that a follow-up button can still act on. The scratch
/// directory stays alive for as long as any holder keeps this value.
#[derive(Clone)]
pub struct FollowUp {
    pub media: MediaResult,
    _scratch: Arc<ScratchDir>,
}

struct Entry {
    owner: UserId,
    follow_up: FollowUp,
    stored_at: Instant,
}

/// Delivered videos keyed by the token carried in their "Download as MP3" button.
pub struct FollowUps {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl FollowUps {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, owner: UserId, media: MediaResult, scratch: ScratchDir) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        self.prune(&mut entries);
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(token, _)| token.clone());
            match oldest {
                Some(token) => {
                    debug!("Evicting follow-up {}", token);
                    entries.remove(&token);
                }
                None => break,
            }
        }

        entries.insert(
            token.clone(),
            Entry {
                owner,
                follow_up: FollowUp {
                    media,
                    _scratch: Arc::new(scratch),
                },
                stored_at: Instant::now(),
            },
        );
        token
    }

    /// The follow-up behind `token`, if it is still live and belongs to `owner`.
    pub fn get(&self, token: &str, owner: UserId) -> Option<FollowUp> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut entries);
        entries
            .get(token)
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.follow_up.clone())
    }

    /// Drops the entry behind `token`, e.g. when its button never reached the user.
    pub fn remove(&self, token: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(token).is_some() {
            debug!("Removed follow-up {}", token);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn prune(&self, entries: &mut HashMap<String, Entry>) {
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}
