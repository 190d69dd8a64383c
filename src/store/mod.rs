//! Profile store abstraction.
//!
//! Backends implement [`ProfileStore`] so the onboarding logic never depends on
//! a particular database. "Row not found" on a plain read is `Ok(None)`, not an
//! error; unique violations come back as [`StoreError::Conflict`].

mod memory;
mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Config, StoreKind};
use crate::error::StoreError;
use crate::onboarding::models::{ParentChild, Profile, ProfilePatch, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub profiles: u64,
    pub players: u64,
    pub parents: u64,
    pub parent_links: u64,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>, StoreError>;

    /// Update the row for `user`, or create it with `role = user` when missing.
    /// Returns the written row.
    async fn upsert_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError>;

    /// Field-level update of an existing row. `NotFound` if there is none.
    async fn update_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError>;

    /// Whether a normalized username belongs to someone other than `except`.
    async fn username_taken(
        &self,
        username: &str,
        except: Option<&UserId>,
    ) -> Result<bool, StoreError>;

    /// Player rows whose username or full name contains `query`, ignoring case.
    async fn search_players(&self, query: &str, limit: usize) -> Result<Vec<Profile>, StoreError>;

    async fn create_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<ParentChild, StoreError>;

    async fn get_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<Option<ParentChild>, StoreError>;

    async fn parent_of(&self, player: &UserId) -> Result<Option<ParentChild>, StoreError>;

    /// Oldest link of a parent.
    async fn first_child(&self, parent: &UserId) -> Result<Option<ParentChild>, StoreError>;

    /// Create a player row and its parent link as one unit, with service
    /// credentials. Either both rows are written or neither is.
    async fn create_player_with_link(
        &self,
        parent: &UserId,
        player: &UserId,
        seed: &ProfilePatch,
    ) -> Result<Profile, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    async fn ping(&self) -> Result<bool, StoreError>;
}

/// Open the backend named in the config.
pub async fn open(cfg: &Config) -> anyhow::Result<Arc<dyn ProfileStore>> {
    match cfg.store {
        StoreKind::Memory => {
            tracing::warn!("using the in-memory profile store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Surreal => {
            let db = crate::db::connect_db(cfg).await?;
            Ok(Arc::new(SurrealStore::new(db)))
        }
    }
}
