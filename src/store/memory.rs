//! In-memory profile store.
//!
//! Suitable for development (`ONBOARD_STORE=memory`) and tests. One lock
//! guards both tables, which makes the privileged player creation atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ProfileStore, StoreStats};
use crate::error::{Constraint, StoreError};
use crate::onboarding::models::{ParentChild, Profile, ProfilePatch, Role, UserId};

#[derive(Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    /// Insertion order doubles as creation order.
    links: Vec<ParentChild>,
}

impl Tables {
    fn username_owner(&self, username: &str) -> Option<&UserId> {
        self.profiles
            .values()
            .find(|p| p.username.as_deref() == Some(username))
            .map(|p| &p.user_id)
    }

    fn check_username(&self, user: &UserId, patch: &ProfilePatch) -> Result<(), StoreError> {
        if let Some(name) = patch.username.as_deref() {
            if self.username_owner(name).is_some_and(|owner| owner != user) {
                return Err(StoreError::Conflict(Constraint::Username));
            }
        }
        Ok(())
    }

    fn insert_profile(&mut self, user: &UserId, patch: &ProfilePatch) -> Profile {
        let now = Utc::now();
        let mut row = Profile {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.clone(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        };
        row.apply(patch);
        self.profiles.insert(user.clone(), row.clone());
        row
    }

    fn insert_link(&mut self, parent: &UserId, player: &UserId) -> Result<ParentChild, StoreError> {
        if self.links.iter().any(|l| &l.player_id == player) {
            return Err(StoreError::Conflict(Constraint::PlayerParent));
        }
        let link = ParentChild {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id: parent.clone(),
            player_id: player.clone(),
            created_at: Utc::now(),
        };
        self.links.push(link.clone());
        Ok(link)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(user).cloned())
    }

    async fn upsert_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_username(user, patch)?;
        if let Some(row) = tables.profiles.get_mut(user) {
            row.apply(patch);
            row.updated_at = Some(Utc::now());
            return Ok(row.clone());
        }
        Ok(tables.insert_profile(user, patch))
    }

    async fn update_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_username(user, patch)?;
        let row = tables.profiles.get_mut(user).ok_or(StoreError::NotFound)?;
        row.apply(patch);
        row.updated_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn username_taken(
        &self,
        username: &str,
        except: Option<&UserId>,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .username_owner(username)
            .is_some_and(|owner| Some(owner) != except))
    }

    async fn search_players(&self, query: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
        let needle = query.to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };
        let tables = self.tables.read().await;
        let mut hits: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.role == Role::Player && (contains(&p.username) || contains(&p.full_name)))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.username.cmp(&b.username));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn create_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<ParentChild, StoreError> {
        self.tables.write().await.insert_link(parent, player)
    }

    async fn get_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<Option<ParentChild>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .links
            .iter()
            .find(|l| &l.parent_id == parent && &l.player_id == player)
            .cloned())
    }

    async fn parent_of(&self, player: &UserId) -> Result<Option<ParentChild>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.links.iter().find(|l| &l.player_id == player).cloned())
    }

    async fn first_child(&self, parent: &UserId) -> Result<Option<ParentChild>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.links.iter().find(|l| &l.parent_id == parent).cloned())
    }

    async fn create_player_with_link(
        &self,
        parent: &UserId,
        player: &UserId,
        seed: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.profiles.contains_key(player) {
            return Err(StoreError::Conflict(Constraint::UserId));
        }
        tables.check_username(player, seed)?;
        if tables.links.iter().any(|l| &l.player_id == player) {
            return Err(StoreError::Conflict(Constraint::PlayerParent));
        }
        let seed = ProfilePatch {
            role: Some(Role::Player),
            ..seed.clone()
        };
        let row = tables.insert_profile(player, &seed);
        tables.insert_link(parent, player)?;
        Ok(row)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let tables = self.tables.read().await;
        let count = |role: Role| tables.profiles.values().filter(|p| p.role == role).count() as u64;
        Ok(StoreStats {
            profiles: tables.profiles.len() as u64,
            players: count(Role::Player),
            parents: count(Role::Parent),
            parent_links: tables.links.len() as u64,
        })
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
