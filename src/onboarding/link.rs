//! Parent branch: attach an existing player to a parent, or create one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;

use super::models::{PlayerSeed, Profile, ProfilePatch, Role, UserId};
use super::retry::{RetryPolicy, read_until_present};
use super::validate;
use crate::error::{OnboardingError, ValidationError};
use crate::store::ProfileStore;

pub const MIN_SEARCH_LEN: usize = 2;
/// Rows fetched per result slot before ranking.
const SEARCH_WINDOW: usize = 5;
const PLACEHOLDER_PREFIX: &str = "player-";
const PLACEHOLDER_HEX_LEN: usize = 12;
/// Suffixes tried when a name-derived username is taken.
const MAX_USERNAME_SUFFIX: u32 = 20;

/// Held while a parent has a link/create call in flight.
struct BusyGuard<'a> {
    busy: &'a DashSet<UserId>,
    parent: UserId,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.remove(&self.parent);
    }
}

pub struct PlayerLinks {
    store: Arc<dyn ProfileStore>,
    verify: RetryPolicy,
    search_limit: usize,
    busy: DashSet<UserId>,
    consistency_failures: AtomicU64,
}

impl PlayerLinks {
    pub fn new(store: Arc<dyn ProfileStore>, verify: RetryPolicy, search_limit: usize) -> Self {
        Self {
            store,
            verify,
            search_limit,
            busy: DashSet::new(),
            consistency_failures: AtomicU64::new(0),
        }
    }

    /// Rows found missing after a write that should have produced them.
    pub fn consistency_failures(&self) -> u64 {
        self.consistency_failures.load(Ordering::Relaxed)
    }

    fn begin(&self, parent: &UserId) -> Result<BusyGuard<'_>, OnboardingError> {
        if !self.busy.insert(parent.clone()) {
            tracing::warn!(parent = %parent, "rejecting overlapping player link request");
            return Err(OnboardingError::Busy);
        }
        Ok(BusyGuard {
            busy: &self.busy,
            parent: parent.clone(),
        })
    }

    async fn require_parent(&self, parent: &UserId) -> Result<Profile, OnboardingError> {
        let profile = self
            .store
            .get_profile(parent)
            .await?
            .ok_or(OnboardingError::NotFound("profile"))?;
        if profile.role != Role::Parent {
            return Err(OnboardingError::Forbidden(
                "only parents can link or create player profiles",
            ));
        }
        Ok(profile)
    }

    /// Players matching `query` by name or username, best match first.
    pub async fn search(&self, parent: &UserId, query: &str) -> Result<Vec<Profile>, OnboardingError> {
        self.require_parent(parent).await?;
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let window = self.search_limit.saturating_mul(SEARCH_WINDOW);
        let mut hits = self.store.search_players(&query, window).await?;
        let score = |p: &Profile| {
            [p.username.as_deref(), p.full_name.as_deref()]
                .into_iter()
                .flatten()
                .map(|field| strsim::jaro_winkler(&query, &field.to_lowercase()))
                .fold(0.0_f64, f64::max)
        };
        hits.sort_by(|a, b| {
            score(b)
                .total_cmp(&score(a))
                .then_with(|| a.username.cmp(&b.username))
        });
        hits.truncate(self.search_limit);
        Ok(hits)
    }

    /// Link an existing player to `parent`. Re-linking the same pair is a no-op.
    pub async fn link_existing(
        &self,
        parent: &UserId,
        player_id: &UserId,
    ) -> Result<Profile, OnboardingError> {
        let _guard = self.begin(parent)?;
        self.require_parent(parent).await?;

        let player = self
            .store
            .get_profile(player_id)
            .await?
            .filter(|p| p.role == Role::Player)
            .ok_or(OnboardingError::NotFound("player"))?;

        match self.store.parent_of(player_id).await? {
            Some(link) if &link.parent_id == parent => {
                tracing::info!(parent = %parent, player = %player_id, "player already linked to this parent");
                return Ok(player);
            }
            Some(_) => return Err(OnboardingError::AlreadyLinked),
            None => {}
        }

        self.store.create_link(parent, player_id).await?;
        tracing::info!(parent = %parent, player = %player_id, "linked existing player");
        self.verify(parent, player_id, "link").await;
        Ok(player)
    }

    /// Create a brand-new player identity, its profile and the link through
    /// the privileged store path. Two calls create two players.
    pub async fn create_player(
        &self,
        parent: &UserId,
        seed: &PlayerSeed,
    ) -> Result<Profile, OnboardingError> {
        let _guard = self.begin(parent)?;
        self.require_parent(parent).await?;

        let player_id = UserId::generate();
        let patch = self.seed_patch(&player_id, seed).await?;
        let created = self
            .store
            .create_player_with_link(parent, &player_id, &patch)
            .await?;
        tracing::info!(
            parent = %parent,
            player = %player_id,
            username = created.username.as_deref().unwrap_or_default(),
            "created player for parent"
        );
        self.verify(parent, &player_id, "create").await;
        Ok(created)
    }

    async fn seed_patch(
        &self,
        player_id: &UserId,
        seed: &PlayerSeed,
    ) -> Result<ProfilePatch, OnboardingError> {
        let username = match validate::optional(seed.username.as_deref()) {
            Some(raw) => {
                let name = validate::validate_username(&raw)?;
                if self.store.username_taken(&name, Some(player_id)).await? {
                    return Err(OnboardingError::UsernameTaken);
                }
                name
            }
            None => placeholder_username(),
        };
        let hudl_link = validate::optional(seed.hudl_link.as_deref())
            .map(|link| validate::validate_hudl_link(&link))
            .transpose()?;
        Ok(ProfilePatch {
            role: Some(Role::Player),
            username: Some(username),
            full_name: validate::optional(seed.full_name.as_deref()),
            position: validate::optional(seed.position.as_deref()),
            school: validate::optional(seed.school.as_deref()),
            graduation_month: validate::validate_graduation_month(seed.graduation_month)?,
            graduation_year: seed.graduation_year,
            social_link: validate::optional(seed.social_link.as_deref()),
            hudl_link,
            ..Default::default()
        })
    }

    /// Name fields for a parent-managed child, written with its general info.
    /// The child must end up with a name; a placeholder username is replaced
    /// by the chosen one or by one derived from the name.
    pub async fn child_identity(
        &self,
        child: &Profile,
        full_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<ProfilePatch, OnboardingError> {
        let full_name = validate::optional(full_name);
        if full_name.is_none() && !child.has_full_name() {
            return Err(ValidationError::Missing("player name").into());
        }

        let username = match validate::optional(username) {
            Some(raw) => {
                let name = validate::validate_username(&raw)?;
                if self.store.username_taken(&name, Some(&child.user_id)).await? {
                    return Err(OnboardingError::UsernameTaken);
                }
                Some(name)
            }
            None if child.username.as_deref().is_none_or(is_placeholder_username) => {
                let source = full_name
                    .as_deref()
                    .or(child.full_name.as_deref())
                    .unwrap_or_default();
                self.derive_username(&child.user_id, source).await?
            }
            None => None,
        };
        Ok(ProfilePatch {
            full_name,
            username,
            ..Default::default()
        })
    }

    /// First free username built from `name`: `base`, then `base-2`, `base-3`...
    /// `None` when the name gives nothing usable, which keeps the placeholder.
    async fn derive_username(
        &self,
        owner: &UserId,
        name: &str,
    ) -> Result<Option<String>, OnboardingError> {
        let Ok(base) = validate::validate_username(name) else {
            tracing::debug!(player = %owner, "name yields no valid username; keeping placeholder");
            return Ok(None);
        };
        for n in 1..=MAX_USERNAME_SUFFIX {
            let candidate = if n == 1 {
                base.clone()
            } else {
                with_suffix(&base, n)
            };
            if !self.store.username_taken(&candidate, Some(owner)).await? {
                return Ok(Some(candidate));
            }
        }
        tracing::warn!(player = %owner, base = %base, "no free username derived from name");
        Ok(None)
    }

    /// Confirm both rows exist. Missing rows are logged as critical and
    /// counted, but never fail the caller.
    pub async fn verify(&self, parent: &UserId, player: &UserId, op: &'static str) -> bool {
        let store = &self.store;
        let row = read_until_present(&self.verify, "player profile", || store.get_profile(player)).await;
        let link =
            read_until_present(&self.verify, "parent link", || store.get_link(parent, player)).await;

        let mut ok = true;
        for (what, outcome) in [("player profile", row.map(|r| r.is_some())), ("parent link", link.map(|l| l.is_some()))] {
            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    ok = false;
                    self.consistency_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        target: "consistency",
                        critical = true,
                        parent = %parent,
                        player = %player,
                        op,
                        "{what} missing after {op}"
                    );
                }
                Err(err) => {
                    ok = false;
                    tracing::warn!(parent = %parent, player = %player, op, error = %err, "could not confirm {what}");
                }
            }
        }
        ok
    }
}

fn placeholder_username() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{PLACEHOLDER_PREFIX}{}", &id[..PLACEHOLDER_HEX_LEN])
}

/// `player-<12 hex>` as handed out to parent-created players.
pub fn is_placeholder_username(name: &str) -> bool {
    name.strip_prefix(PLACEHOLDER_PREFIX).is_some_and(|rest| {
        rest.len() == PLACEHOLDER_HEX_LEN && rest.chars().all(|c| c.is_ascii_hexdigit())
    })
}

fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{n}");
    // validated usernames are ASCII
    let head = &base[..base.len().min(validate::USERNAME_MAX_LEN - suffix.len())];
    format!("{}{suffix}", head.trim_end_matches(['-', '_']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_usernames_are_valid() {
        let name = placeholder_username();
        assert_eq!(name.len(), "player-".len() + 12);
        assert_eq!(validate::validate_username(&name).as_deref(), Ok(name.as_str()));
        assert_ne!(placeholder_username(), name);
        assert!(is_placeholder_username(&name));
    }

    #[test]
    fn chosen_usernames_are_not_placeholders() {
        assert!(!is_placeholder_username("player-one"));
        assert!(!is_placeholder_username("player-0123456789abz"));
        assert!(!is_placeholder_username("riley-jordan"));
        assert!(is_placeholder_username("player-0123456789ab"));
    }

    #[test]
    fn suffixed_usernames_stay_within_the_length_cap() {
        assert_eq!(with_suffix("riley-jordan", 2), "riley-jordan-2");
        let long = "a".repeat(validate::USERNAME_MAX_LEN);
        let suffixed = with_suffix(&long, 12);
        assert_eq!(suffixed.len(), validate::USERNAME_MAX_LEN);
        assert!(suffixed.ends_with("-12"));
        assert_eq!(validate::validate_username(&suffixed).as_deref(), Ok(suffixed.as_str()));
    }
}
