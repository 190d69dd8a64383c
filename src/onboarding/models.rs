use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identity key handed out by the session provider. Immutable once assigned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        UserId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted role column. `User` is the unset sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Player,
    Parent,
    Scout,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Player => "player",
            Role::Parent => "parent",
            Role::Scout => "scout",
        }
    }
}

/// Which onboarding branch a user is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Undetermined,
    Player,
    Parent,
    Scout,
}

impl AccountType {
    /// Branch implied by an authoritative role, if the role is set.
    pub fn from_role(role: Role) -> Option<Self> {
        match role {
            Role::User => None,
            Role::Player => Some(AccountType::Player),
            Role::Parent => Some(AccountType::Parent),
            Role::Scout => Some(AccountType::Scout),
        }
    }

    /// Role to persist for this branch. Undetermined falls back to player,
    /// which is never worse than leaving the sentinel in place.
    pub fn role(self) -> Role {
        match self {
            AccountType::Undetermined | AccountType::Player => Role::Player,
            AccountType::Parent => Role::Parent,
            AccountType::Scout => Role::Scout,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    pub user_id: UserId,
    #[serde(default)]
    pub role: Role,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub hudl_link: Option<String>,
    pub position: Option<String>,
    pub school: Option<String>,
    pub graduation_month: Option<u8>,
    pub graduation_year: Option<i32>,
    pub social_link: Option<String>,
    pub gpa: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<String>,
    pub forty_yd_dash: Option<f64>,
    pub bench_max: Option<f64>,
    pub squat_max: Option<f64>,
    pub clean_max: Option<f64>,
    pub state: Option<String>,
    pub classification: Option<String>,
    pub college_offers: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Profile {
    pub fn has_hudl_link(&self) -> bool {
        present(&self.hudl_link)
    }

    /// Position, school and graduation year are all filled in.
    pub fn has_general_info(&self) -> bool {
        present(&self.position) && present(&self.school) && self.graduation_year.is_some()
    }

    pub fn has_basic_info(&self) -> bool {
        present(&self.full_name) && present(&self.username) && self.birthday.is_some()
    }

    pub fn has_full_name(&self) -> bool {
        present(&self.full_name)
    }

    /// First field keeping this row below the evaluation-ready bar.
    pub fn missing_player_field(&self) -> Option<&'static str> {
        if !present(&self.full_name) {
            Some("player name")
        } else if !present(&self.username) {
            Some("username")
        } else if !self.has_hudl_link() {
            Some("hudl link")
        } else if !present(&self.position) {
            Some("position")
        } else if !present(&self.school) {
            Some("school")
        } else if self.graduation_year.is_none() {
            Some("graduation year")
        } else {
            None
        }
    }

    /// Evaluation-ready bar for a player row. Birthday is not required here
    /// because players created by a parent never carry one.
    pub fn player_ready(&self) -> bool {
        self.role != Role::User && self.missing_player_field().is_none()
    }

    /// Merge every `Some` field of `patch` into this row.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        macro_rules! merge {
            ($dst:expr, $src:expr; $($field:ident),* $(,)?) => {
                $(if let Some(v) = &$src.$field { $dst.$field = Some(v.clone()); })*
            };
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        merge!(
            self, patch;
            username,
            full_name,
            avatar_url,
            birthday,
            hudl_link,
            position,
            school,
            graduation_month,
            graduation_year,
            social_link,
            gpa,
            weight,
            height,
            forty_yd_dash,
            bench_max,
            squat_max,
            clean_max,
            state,
            classification,
            college_offers,
        );
    }
}

/// Onboarding-complete check across both branches.
pub fn onboarding_complete(profile: &Profile, linked_player: Option<&Profile>) -> bool {
    match profile.role {
        Role::User => false,
        Role::Scout => profile.has_basic_info(),
        Role::Player => profile.has_basic_info() && profile.player_ready(),
        Role::Parent => {
            profile.has_basic_info() && linked_player.is_some_and(Profile::player_ready)
        }
    }
}

/// Field-level update. Only `Some` fields are written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hudl_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_month: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forty_yd_dash: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bench_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squat_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college_offers: Option<String>,
}

/// Parent to player association row. Unique on `player_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChild {
    #[serde(default)]
    pub id: String,
    pub parent_id: UserId,
    pub player_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BasicInfo {
    pub full_name: String,
    pub username: String,
    /// `YYYY-MM-DD` as entered in the form.
    pub birthday: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleChoice {
    pub role: AccountType,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HudlLink {
    pub hudl_link: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeneralInfo {
    pub position: String,
    pub school: String,
    #[serde(default)]
    pub graduation_month: Option<u8>,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub social_link: Option<String>,
    /// Parent branch only: the child's name, required while the child has none.
    #[serde(default)]
    pub player_full_name: Option<String>,
    /// Parent branch only: replaces the child's placeholder username.
    #[serde(default)]
    pub player_username: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpecificInfo {
    pub gpa: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<String>,
    pub forty_yd_dash: Option<f64>,
    pub bench_max: Option<f64>,
    pub squat_max: Option<f64>,
    pub clean_max: Option<f64>,
    pub state: Option<String>,
    pub classification: Option<String>,
    pub college_offers: Option<String>,
}

/// Optional seed fields for a parent-created player.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlayerSeed {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub position: Option<String>,
    pub school: Option<String>,
    pub graduation_month: Option<u8>,
    pub graduation_year: Option<i32>,
    pub social_link: Option<String>,
    pub hudl_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LinkPlayer {
    pub player_id: UserId,
}
