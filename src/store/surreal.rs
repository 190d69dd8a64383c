use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use surrealdb::{Surreal, engine::remote::ws::Client, sql::Thing};

use super::{ProfileStore, StoreStats};
use crate::error::{Constraint, StoreError};
use crate::onboarding::models::{ParentChild, Profile, ProfilePatch, Role, UserId};

/// A row as SurrealDB returns it: record id plus the flattened body.
#[derive(Debug, Deserialize)]
struct Record<T> {
    id: Thing,
    #[serde(flatten)]
    body: T,
}

impl Record<Profile> {
    fn into_profile(self) -> Profile {
        Profile {
            id: self.id.id.to_raw(),
            ..self.body
        }
    }
}

impl Record<ParentChild> {
    fn into_link(self) -> ParentChild {
        ParentChild {
            id: self.id.id.to_raw(),
            ..self.body
        }
    }
}

#[derive(Debug, Deserialize)]
struct Owner {
    user_id: UserId,
}

/// Unique index violations read "Database index `<name>` already contains ...".
fn classify(err: surrealdb::Error) -> StoreError {
    let msg = err.to_string();
    if msg.contains("already contains") {
        if msg.contains("profile_username") {
            return StoreError::Conflict(Constraint::Username);
        }
        if msg.contains("parent_children_player") {
            return StoreError::Conflict(Constraint::PlayerParent);
        }
        if msg.contains("profile_user_id") {
            return StoreError::Conflict(Constraint::UserId);
        }
    }
    StoreError::Backend(msg)
}

fn content<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Patch body plus the store-owned columns for a fresh profile row.
fn new_profile_content(user: &UserId, patch: &ProfilePatch) -> Result<serde_json::Value, StoreError> {
    let now = Utc::now();
    let mut body = content(patch)?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("user_id".into(), serde_json::json!(user));
        obj.entry("role").or_insert(serde_json::json!(Role::User));
        obj.insert("created_at".into(), serde_json::json!(now));
        obj.insert("updated_at".into(), serde_json::json!(now));
    }
    Ok(body)
}

fn link_content(parent: &UserId, player: &UserId) -> serde_json::Value {
    serde_json::json!({
        "parent_id": parent,
        "player_id": player,
        "created_at": Utc::now(),
    })
}

#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Client>,
}

impl SurrealStore {
    pub fn new(db: Surreal<Client>) -> Self {
        Self { db }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        sql: &'static str,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<Vec<T>, StoreError> {
        let mut query = self.db.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let mut res = query.await.map_err(classify)?.check().map_err(classify)?;
        res.take(0).map_err(classify)
    }

    async fn one_link(
        &self,
        sql: &'static str,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<Option<ParentChild>, StoreError> {
        let rows: Vec<Record<ParentChild>> = self.fetch(sql, binds).await?;
        Ok(rows.into_iter().next().map(Record::into_link))
    }

    async fn count(&self, sql: &'static str) -> Result<u64, StoreError> {
        let mut res = self
            .db
            .query(sql)
            .await
            .map_err(classify)?
            .check()
            .map_err(classify)?;
        let n: Option<i64> = res.take((0, "n")).map_err(classify)?;
        Ok(n.unwrap_or(0).max(0) as u64)
    }
}

#[async_trait]
impl ProfileStore for SurrealStore {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Record<Profile>> = self
            .fetch(
                "SELECT * FROM profile WHERE user_id = $uid LIMIT 1;",
                vec![("uid", serde_json::json!(user))],
            )
            .await?;
        Ok(rows.into_iter().next().map(Record::into_profile))
    }

    async fn upsert_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        if self.get_profile(user).await?.is_some() {
            return self.update_profile(user, patch).await;
        }
        let rows: Vec<Record<Profile>> = self
            .fetch(
                "CREATE profile CONTENT $row;",
                vec![("row", new_profile_content(user, patch)?)],
            )
            .await?;
        rows.into_iter()
            .next()
            .map(Record::into_profile)
            .ok_or_else(|| StoreError::Backend("create returned no row".into()))
    }

    async fn update_profile(
        &self,
        user: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        let mut body = content(patch)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("updated_at".into(), serde_json::json!(Utc::now()));
        }
        let rows: Vec<Record<Profile>> = self
            .fetch(
                "UPDATE profile MERGE $patch WHERE user_id = $uid RETURN AFTER;",
                vec![("patch", body), ("uid", serde_json::json!(user))],
            )
            .await?;
        rows.into_iter()
            .next()
            .map(Record::into_profile)
            .ok_or(StoreError::NotFound)
    }

    async fn username_taken(
        &self,
        username: &str,
        except: Option<&UserId>,
    ) -> Result<bool, StoreError> {
        let owners: Vec<Owner> = self
            .fetch(
                "SELECT user_id FROM profile WHERE username = $username;",
                vec![("username", serde_json::json!(username))],
            )
            .await?;
        Ok(owners.iter().any(|o| Some(&o.user_id) != except))
    }

    async fn search_players(&self, query: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
        let rows: Vec<Record<Profile>> = self
            .fetch(
                "SELECT * FROM profile WHERE role = 'player' AND (
                    string::lowercase(username ?? '') CONTAINS $q
                    OR string::lowercase(full_name ?? '') CONTAINS $q
                ) ORDER BY username LIMIT $limit;",
                vec![
                    ("q", serde_json::json!(query.to_lowercase())),
                    ("limit", serde_json::json!(limit)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Record::into_profile).collect())
    }

    async fn create_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<ParentChild, StoreError> {
        self.one_link(
            "CREATE parent_children CONTENT $row;",
            vec![("row", link_content(parent, player))],
        )
        .await?
        .ok_or_else(|| StoreError::Backend("create returned no row".into()))
    }

    async fn get_link(
        &self,
        parent: &UserId,
        player: &UserId,
    ) -> Result<Option<ParentChild>, StoreError> {
        self.one_link(
            "SELECT * FROM parent_children WHERE parent_id = $parent AND player_id = $player LIMIT 1;",
            vec![
                ("parent", serde_json::json!(parent)),
                ("player", serde_json::json!(player)),
            ],
        )
        .await
    }

    async fn parent_of(&self, player: &UserId) -> Result<Option<ParentChild>, StoreError> {
        self.one_link(
            "SELECT * FROM parent_children WHERE player_id = $player LIMIT 1;",
            vec![("player", serde_json::json!(player))],
        )
        .await
    }

    async fn first_child(&self, parent: &UserId) -> Result<Option<ParentChild>, StoreError> {
        self.one_link(
            "SELECT * FROM parent_children WHERE parent_id = $parent ORDER BY created_at LIMIT 1;",
            vec![("parent", serde_json::json!(parent))],
        )
        .await
    }

    async fn create_player_with_link(
        &self,
        parent: &UserId,
        player: &UserId,
        seed: &ProfilePatch,
    ) -> Result<Profile, StoreError> {
        let seed = ProfilePatch {
            role: Some(Role::Player),
            ..seed.clone()
        };
        let mut res = self
            .db
            .query(
                "BEGIN TRANSACTION;
                 CREATE profile CONTENT $player;
                 CREATE parent_children CONTENT $link;
                 COMMIT TRANSACTION;",
            )
            .bind(("player", new_profile_content(player, &seed)?))
            .bind(("link", link_content(parent, player)))
            .await
            .map_err(classify)?;
        // A failed transaction reports every statement as failed; the one
        // that hit an index carries the real cause.
        let mut errors: Vec<StoreError> = res.take_errors().into_values().map(classify).collect();
        if !errors.is_empty() {
            errors.sort_by_key(|e| !matches!(e, StoreError::Conflict(_)));
            return Err(errors.swap_remove(0));
        }
        self.get_profile(player)
            .await?
            .ok_or_else(|| StoreError::Backend("player row not readable after create".into()))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            profiles: self
                .count("SELECT count() AS n FROM profile GROUP ALL;")
                .await?,
            players: self
                .count("SELECT count() AS n FROM profile WHERE role = 'player' GROUP ALL;")
                .await?,
            parents: self
                .count("SELECT count() AS n FROM profile WHERE role = 'parent' GROUP ALL;")
                .await?,
            parent_links: self
                .count("SELECT count() AS n FROM parent_children GROUP ALL;")
                .await?,
        })
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        crate::db::healthcheck(&self.db)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
