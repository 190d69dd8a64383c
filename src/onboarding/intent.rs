//! Short-lived onboarding hints (chosen branch, skip flag) keyed by user.
//!
//! Advisory only: the profile row always wins once it carries a role. The
//! cache is owned by the service and handed in at construction, never global.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::models::{AccountType, UserId};

#[derive(Clone, Copy, Debug)]
struct Intent {
    account: AccountType,
    recorded_at: Instant,
}

pub struct IntentCache {
    ttl: Duration,
    intents: DashMap<UserId, Intent>,
    skipped: DashMap<UserId, Instant>,
}

impl IntentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            intents: DashMap::new(),
            skipped: DashMap::new(),
        }
    }

    /// Remember the branch picked on the role step. Only player and parent
    /// are branches a user can pick.
    pub fn record(&self, user: &UserId, account: AccountType) {
        match account {
            AccountType::Player | AccountType::Parent => {
                self.prune();
                self.intents.insert(
                    user.clone(),
                    Intent {
                        account,
                        recorded_at: Instant::now(),
                    },
                );
            }
            AccountType::Undetermined | AccountType::Scout => {
                tracing::debug!(user = %user, ?account, "ignoring non-branch intent");
            }
        }
    }

    /// Fresh intent, if any. Expired entries are dropped on read.
    pub fn get(&self, user: &UserId) -> Option<AccountType> {
        let intent = *self.intents.get(user)?;
        if intent.recorded_at.elapsed() >= self.ttl {
            self.intents.remove(user);
            return None;
        }
        Some(intent.account)
    }

    pub fn clear(&self, user: &UserId) {
        self.intents.remove(user);
        self.skipped.remove(user);
    }

    pub fn mark_skipped(&self, user: &UserId) {
        self.prune();
        self.skipped.insert(user.clone(), Instant::now());
    }

    /// Skip flags expire with the same TTL as intents.
    pub fn is_skipped(&self, user: &UserId) -> bool {
        self.skipped
            .remove_if(user, |_, at| at.elapsed() >= self.ttl)
            .is_none()
            && self.skipped.contains_key(user)
    }

    /// Drop every expired entry. Runs on each write so users who never come
    /// back do not pile up.
    fn prune(&self) {
        let ttl = self.ttl;
        self.intents.retain(|_, intent| intent.recorded_at.elapsed() < ttl);
        self.skipped.retain(|_, at| at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl Default for IntentCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}
