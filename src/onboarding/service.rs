//! One operation per onboarding screen, over a [`ProfileStore`].

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::intent::IntentCache;
use super::link::PlayerLinks;
use super::models::{
    AccountType, BasicInfo, GeneralInfo, HudlLink, LinkPlayer, PlayerSeed, Profile, ProfilePatch,
    Role, RoleChoice, SpecificInfo, UserId, onboarding_complete,
};
use super::resolve::{Action, ResolveInput, plan, reconcile, resolve_step};
use super::retry::RetryPolicy;
use super::sequencer::{Sequencer, Step, StepInfo, StepKind, Transition};
use super::validate;
use crate::config::Config;
use crate::error::{OnboardingError, StoreError, ValidationError};
use crate::session::Session;
use crate::store::{ProfileStore, StoreStats};

/// Where the caller belongs and what the client should do about it.
#[derive(Clone, Debug, Serialize)]
pub struct Resolution {
    pub action: Action,
    pub account: AccountType,
    pub steps: Vec<StepInfo>,
    pub skipped: bool,
    pub complete: bool,
    pub profile: Option<Profile>,
    pub player: Option<Profile>,
}

/// Result of a step submission.
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub transition: Transition,
    pub account: AccountType,
    pub profile: Profile,
    /// The linked child the parent branch wrote to.
    pub player: Option<Profile>,
}

/// The caller's row plus, on the parent branch, the child the player screens
/// write to.
struct Branch {
    account: AccountType,
    profile: Profile,
    player: Option<Profile>,
}

impl Branch {
    /// The row the player screens write to.
    fn target_row(&self) -> Result<&Profile, OnboardingError> {
        match self.account {
            AccountType::Parent => self.player.as_ref().ok_or(OnboardingError::NoLinkedPlayer),
            AccountType::Scout => Err(OnboardingError::Forbidden(
                "scout accounts do not fill in player details",
            )),
            AccountType::Player | AccountType::Undetermined => Ok(&self.profile),
        }
    }

    fn target(&self) -> Result<&UserId, OnboardingError> {
        self.target_row().map(|p| &p.user_id)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ServiceOptions {
    pub verify: RetryPolicy,
    pub search_limit: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            verify: RetryPolicy::default(),
            search_limit: 10,
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            verify: cfg.verify,
            search_limit: cfg.search_limit,
        }
    }
}

pub struct OnboardingService {
    store: Arc<dyn ProfileStore>,
    intents: Arc<IntentCache>,
    links: PlayerLinks,
}

fn require(session: Option<&Session>) -> Result<&UserId, OnboardingError> {
    session
        .map(|s| &s.user_id)
        .ok_or(OnboardingError::Unauthenticated)
}

fn advance(account: AccountType, kind: StepKind) -> Result<Transition, OnboardingError> {
    let step = account.step_of(kind).ok_or(OnboardingError::Forbidden(
        "this step is not part of the account's onboarding",
    ))?;
    Ok(Sequencer::new(account, step).complete(None))
}

impl OnboardingService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        intents: Arc<IntentCache>,
        opts: ServiceOptions,
    ) -> Self {
        let links = PlayerLinks::new(store.clone(), opts.verify, opts.search_limit);
        Self {
            store,
            intents,
            links,
        }
    }

    pub fn from_config(store: Arc<dyn ProfileStore>, cfg: &Config) -> Self {
        Self::new(
            store,
            Arc::new(IntentCache::new(cfg.intent_ttl)),
            ServiceOptions::from(cfg),
        )
    }

    pub fn intents(&self) -> &IntentCache {
        &self.intents
    }

    pub fn consistency_failures(&self) -> u64 {
        self.links.consistency_failures()
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats().await
    }

    pub async fn ping(&self) -> Result<bool, StoreError> {
        self.store.ping().await
    }

    async fn linked_player(&self, parent: &UserId) -> Result<Option<Profile>, StoreError> {
        match self.store.first_child(parent).await? {
            Some(link) => self.store.get_profile(&link.player_id).await,
            None => Ok(None),
        }
    }

    async fn branch(&self, user: &UserId) -> Result<Branch, OnboardingError> {
        let profile = self
            .store
            .get_profile(user)
            .await?
            .ok_or(OnboardingError::NotFound("profile"))?;
        let account = reconcile(Some(profile.role), self.intents.get(user));
        let player = match account {
            AccountType::Parent => self.linked_player(user).await?,
            _ => None,
        };
        Ok(Branch {
            account,
            profile,
            player,
        })
    }

    /// Work out the caller's canonical step and compare it with `url_step`.
    /// Store failures hold the user on the step they are on.
    pub async fn resolve(&self, session: Option<&Session>, url_step: Step) -> Resolution {
        let Some(session) = session else {
            let resolved = resolve_step(&ResolveInput::default());
            return self.resolution(plan(&resolved, url_step), resolved.account, None, None, false);
        };
        let user = &session.user_id;
        let intent = self.intents.get(user);
        let skipped = self.intents.is_skipped(user);

        let profile = match self.store.get_profile(user).await {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(user = %user, error = %err, "profile read failed; holding step");
                return self.hold(url_step, intent, skipped);
            }
        };
        let player = match profile.as_ref().map(|p| p.role) {
            Some(Role::Parent) => match self.linked_player(user).await {
                Ok(p) => p,
                Err(err) => {
                    tracing::error!(user = %user, error = %err, "linked player read failed; holding step");
                    return self.hold(url_step, intent, skipped);
                }
            },
            _ => None,
        };

        let resolved = resolve_step(&ResolveInput {
            authenticated: true,
            profile: profile.as_ref(),
            linked_player: player.as_ref(),
            intent,
        });
        let action = plan(&resolved, url_step);
        if let Action::Redirect { step, .. } = &action {
            tracing::debug!(user = %user, from = %url_step, to = %step, "redirecting to resolved step");
        }
        self.resolution(action, resolved.account, profile, player, skipped)
    }

    fn hold(&self, url_step: Step, intent: Option<AccountType>, skipped: bool) -> Resolution {
        let account = reconcile(None, intent);
        self.resolution(Action::Hold { step: url_step }, account, None, None, skipped)
    }

    fn resolution(
        &self,
        action: Action,
        account: AccountType,
        profile: Option<Profile>,
        player: Option<Profile>,
        skipped: bool,
    ) -> Resolution {
        let steps = action
            .step()
            .map(|step| Sequencer::new(account, step).steps())
            .unwrap_or_default();
        let complete = profile
            .as_ref()
            .is_some_and(|p| onboarding_complete(p, player.as_ref()));
        Resolution {
            action,
            account,
            steps,
            skipped,
            complete,
            profile,
            player,
        }
    }

    pub async fn profile(&self, session: Option<&Session>) -> Result<Option<Profile>, OnboardingError> {
        let user = require(session)?;
        Ok(self.store.get_profile(user).await?)
    }

    /// Step 2. Creates the row with the `user` sentinel role on first submit.
    pub async fn submit_basic_info(
        &self,
        session: Option<&Session>,
        input: &BasicInfo,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let today = Utc::now().date_naive();
        let full_name = validate::required(&input.full_name, "full name")?;
        let username = validate::validate_username(&input.username)?;
        let birthday = validate::validate_birthday(&input.birthday, today)?;

        if self.store.username_taken(&username, Some(user)).await? {
            return Err(OnboardingError::UsernameTaken);
        }
        let profile = self
            .store
            .upsert_profile(
                user,
                &ProfilePatch {
                    full_name: Some(full_name),
                    username: Some(username),
                    birthday: Some(birthday),
                    avatar_url: validate::optional(input.avatar_url.as_deref()),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(user = %user, username = profile.username.as_deref().unwrap_or_default(), "saved basic info");

        let account = reconcile(Some(profile.role), self.intents.get(user));
        Ok(StepOutcome {
            transition: advance(account, StepKind::BasicInfo)?,
            account,
            profile,
            player: None,
        })
    }

    /// Step 3. A single write whose returned row is checked before moving on.
    pub async fn select_role(
        &self,
        session: Option<&Session>,
        input: &RoleChoice,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let chosen = input.role;
        if chosen == AccountType::Undetermined {
            return Err(ValidationError::InvalidRole.into());
        }
        let current = self
            .store
            .get_profile(user)
            .await?
            .ok_or(OnboardingError::NotFound("profile"))?;
        if current.role == Role::Scout && chosen != AccountType::Scout {
            return Err(OnboardingError::Forbidden(
                "scout accounts cannot switch to player or parent",
            ));
        }

        let profile = self
            .store
            .update_profile(
                user,
                &ProfilePatch {
                    role: Some(chosen.role()),
                    ..Default::default()
                },
            )
            .await?;
        if profile.role != chosen.role() {
            tracing::error!(user = %user, wanted = chosen.role().as_str(), got = profile.role.as_str(), "role not persisted");
            return Err(StoreError::Backend("role update did not persist".into()).into());
        }
        self.intents.record(user, chosen);
        tracing::info!(user = %user, from = current.role.as_str(), to = profile.role.as_str(), "role selected");

        let player = match chosen {
            AccountType::Parent => self.linked_player(user).await?,
            _ => None,
        };
        Ok(StepOutcome {
            transition: advance(chosen, StepKind::SelectRole)?,
            account: chosen,
            profile,
            player,
        })
    }

    /// Players the calling parent can link, best match first.
    pub async fn search_players(
        &self,
        session: Option<&Session>,
        query: &str,
    ) -> Result<Vec<Profile>, OnboardingError> {
        let user = require(session)?;
        self.links.search(user, query).await
    }

    /// Parent step 4, existing player.
    pub async fn link_player(
        &self,
        session: Option<&Session>,
        input: &LinkPlayer,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let player = self.links.link_existing(user, &input.player_id).await?;
        self.parent_choice_done(user, player).await
    }

    /// Parent step 4, new player through the privileged path.
    pub async fn create_player(
        &self,
        session: Option<&Session>,
        seed: &PlayerSeed,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let player = self.links.create_player(user, seed).await?;
        self.parent_choice_done(user, player).await
    }

    async fn parent_choice_done(
        &self,
        parent: &UserId,
        player: Profile,
    ) -> Result<StepOutcome, OnboardingError> {
        let profile = self
            .store
            .get_profile(parent)
            .await?
            .ok_or(OnboardingError::NotFound("profile"))?;
        Ok(StepOutcome {
            transition: advance(AccountType::Parent, StepKind::ParentChoice)?,
            account: AccountType::Parent,
            profile,
            player: Some(player),
        })
    }

    async fn save_player_fields(
        &self,
        user: &UserId,
        branch: Branch,
        kind: StepKind,
        patch: ProfilePatch,
    ) -> Result<StepOutcome, OnboardingError> {
        let target = branch.target()?.clone();
        let written = self.store.update_profile(&target, &patch).await?;
        tracing::info!(user = %user, row = %target, step = ?kind, "saved player details");

        let transition = advance(branch.account, kind)?;
        let (profile, player) = match branch.account {
            AccountType::Parent => (branch.profile, Some(written)),
            _ => (written, None),
        };
        Ok(StepOutcome {
            transition,
            account: branch.account,
            profile,
            player,
        })
    }

    /// Hudl link for the player, or for the parent's child.
    pub async fn save_hudl_link(
        &self,
        session: Option<&Session>,
        input: &HudlLink,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let hudl_link = validate::validate_hudl_link(&input.hudl_link)?;
        let branch = self.branch(user).await?;
        self.save_player_fields(
            user,
            branch,
            StepKind::HudlLink,
            ProfilePatch {
                hudl_link: Some(hudl_link),
                ..Default::default()
            },
        )
        .await
    }

    /// General info. On the parent branch this is also where the child gets
    /// its name and, unless the parent picks one, a username derived from it.
    pub async fn save_general_info(
        &self,
        session: Option<&Session>,
        input: &GeneralInfo,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let position = validate::required(&input.position, "position")?;
        let school = validate::required(&input.school, "school")?;
        let graduation_year = input
            .graduation_year
            .ok_or(ValidationError::Missing("graduation year"))?;
        let graduation_month = validate::validate_graduation_month(input.graduation_month)?;

        let branch = self.branch(user).await?;
        let identity = match (branch.account, branch.player.as_ref()) {
            (AccountType::Parent, Some(child)) => {
                self.links
                    .child_identity(
                        child,
                        input.player_full_name.as_deref(),
                        input.player_username.as_deref(),
                    )
                    .await?
            }
            _ => ProfilePatch::default(),
        };
        self.save_player_fields(
            user,
            branch,
            StepKind::GeneralInfo,
            ProfilePatch {
                position: Some(position),
                school: Some(school),
                graduation_year: Some(graduation_year),
                graduation_month,
                social_link: validate::optional(input.social_link.as_deref()),
                ..identity
            },
        )
        .await
    }

    /// Terminal step. Stats are optional; the role is written again and the
    /// cached intent and skip flag are dropped.
    pub async fn save_specific_info(
        &self,
        session: Option<&Session>,
        input: &SpecificInfo,
    ) -> Result<StepOutcome, OnboardingError> {
        let user = require(session)?;
        let branch = self.branch(user).await?;
        let target = branch.target()?.clone();
        if let Some(field) = branch.target_row()?.missing_player_field() {
            tracing::info!(user = %user, row = %target, field, "player details incomplete; not finishing");
            return Err(ValidationError::Missing(field).into());
        }

        let stats = ProfilePatch {
            role: Some(Role::Player),
            gpa: input.gpa,
            weight: input.weight,
            height: validate::optional(input.height.as_deref()),
            forty_yd_dash: input.forty_yd_dash,
            bench_max: input.bench_max,
            squat_max: input.squat_max,
            clean_max: input.clean_max,
            state: validate::optional(input.state.as_deref()),
            classification: validate::optional(input.classification.as_deref()),
            college_offers: validate::optional(input.college_offers.as_deref()),
            ..Default::default()
        };
        let written = self.store.update_profile(&target, &stats).await?;

        let (profile, player) = match branch.account {
            AccountType::Parent => {
                let parent = self
                    .store
                    .update_profile(
                        user,
                        &ProfilePatch {
                            role: Some(Role::Parent),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.links.verify(user, &target, "completion").await;
                (parent, Some(written))
            }
            _ => (written, None),
        };
        self.intents.clear(user);
        tracing::info!(user = %user, account = ?branch.account, "onboarding finished");

        Ok(StepOutcome {
            transition: advance(branch.account, StepKind::SpecificInfo)?,
            account: branch.account,
            profile,
            player,
        })
    }

    /// Previous step. Nothing is validated or written.
    pub async fn back(&self, session: Option<&Session>, from: Step) -> Transition {
        let account = match session {
            Some(s) => {
                let role = self.store.get_profile(&s.user_id).await.ok().flatten().map(|p| p.role);
                reconcile(role, self.intents.get(&s.user_id))
            }
            None => AccountType::Undetermined,
        };
        Sequencer::new(account, from).back()
    }

    /// Remember that the user put off choosing a role. Advisory only.
    pub fn mark_skipped(&self, session: Option<&Session>) -> Result<(), OnboardingError> {
        let user = require(session)?;
        self.intents.mark_skipped(user);
        Ok(())
    }
}
