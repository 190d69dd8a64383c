#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use playerparent_onboarding::error::StoreError;
use playerparent_onboarding::onboarding::intent::IntentCache;
use playerparent_onboarding::onboarding::models::{
    BasicInfo, ParentChild, Profile, ProfilePatch, UserId,
};
use playerparent_onboarding::onboarding::retry::RetryPolicy;
use playerparent_onboarding::onboarding::{OnboardingService, ServiceOptions};
use playerparent_onboarding::session::Session;
use playerparent_onboarding::store::{MemoryStore, ProfileStore, StoreStats};

/// Memory store with switches for the failure modes the flow must survive.
#[derive(Default)]
pub struct Faulty {
    pub inner: MemoryStore,
    /// `get_link` reports nothing, as if the association never landed.
    pub hide_links: AtomicBool,
    /// Profile reads fail with a backend error.
    pub fail_reads: AtomicBool,
    /// Privileged creates pause before writing.
    pub slow_create: AtomicBool,
}

impl Faulty {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for Faulty {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.get_profile(user).await
    }

    async fn upsert_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<Profile, StoreError> {
        self.inner.upsert_profile(user, patch).await
    }

    async fn update_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<Profile, StoreError> {
        self.inner.update_profile(user, patch).await
    }

    async fn username_taken(&self, username: &str, except: Option<&UserId>) -> Result<bool, StoreError> {
        self.inner.username_taken(username, except).await
    }

    async fn search_players(&self, query: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
        self.inner.search_players(query, limit).await
    }

    async fn create_link(&self, parent: &UserId, player: &UserId) -> Result<ParentChild, StoreError> {
        self.inner.create_link(parent, player).await
    }

    async fn get_link(&self, parent: &UserId, player: &UserId) -> Result<Option<ParentChild>, StoreError> {
        if self.hide_links.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_link(parent, player).await
    }

    async fn parent_of(&self, player: &UserId) -> Result<Option<ParentChild>, StoreError> {
        self.inner.parent_of(player).await
    }

    async fn first_child(&self, parent: &UserId) -> Result<Option<ParentChild>, StoreError> {
        self.inner.first_child(parent).await
    }

    async fn create_player_with_link(
        &self,
        parent: &UserId,
        player: &UserId,
        seed: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        if self.slow_create.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        self.inner.create_player_with_link(parent, player, seed).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        Ok(!self.fail_reads.load(Ordering::SeqCst))
    }
}

pub fn fast_options() -> ServiceOptions {
    ServiceOptions {
        verify: RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        search_limit: 10,
    }
}

pub fn service(store: Arc<dyn ProfileStore>) -> OnboardingService {
    OnboardingService::new(store, Arc::new(IntentCache::default()), fast_options())
}

pub fn session(id: &str) -> Session {
    Session::new(id)
}

pub fn basic(username: &str) -> BasicInfo {
    BasicInfo {
        full_name: "Casey Jordan".into(),
        username: username.into(),
        birthday: "1985-04-12".into(),
        avatar_url: None,
    }
}
