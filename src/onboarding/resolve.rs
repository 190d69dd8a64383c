//! Decides which onboarding step a user belongs on.
//!
//! Everything here is pure: the service gathers the profile rows and the
//! cached hint, these functions turn them into a target and an action.

use serde::Serialize;

use super::models::{AccountType, Profile, Role};
use super::sequencer::{PROFILE_LOCATION, Step};

/// Two-tier reconcile of the authoritative role and the cached hint.
///
/// A set role always wins; a hint that disagrees with it is stale. The hint
/// only fills in while the row still carries the `user` sentinel.
pub fn reconcile(server: Option<Role>, hint: Option<AccountType>) -> AccountType {
    if let Some(account) = server.and_then(AccountType::from_role) {
        return account;
    }
    match hint {
        Some(AccountType::Player) => AccountType::Player,
        Some(AccountType::Parent) => AccountType::Parent,
        Some(AccountType::Undetermined | AccountType::Scout) | None => AccountType::Undetermined,
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveInput<'a> {
    pub authenticated: bool,
    pub profile: Option<&'a Profile>,
    /// First player linked to the profile, when the profile is a parent.
    pub linked_player: Option<&'a Profile>,
    pub intent: Option<AccountType>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Target {
    Step(Step),
    /// Not this flow's user any more (scouts).
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub target: Target,
    pub account: AccountType,
}

fn at(n: u8) -> Target {
    // Callers only pass literals in 1..=7.
    Target::Step(Step::new(n).unwrap_or(Step::FIRST))
}

pub fn resolve_step(input: &ResolveInput<'_>) -> Resolved {
    let account = reconcile(input.profile.map(|p| p.role), input.intent);

    if !input.authenticated {
        return Resolved {
            target: at(1),
            account,
        };
    }
    let Some(profile) = input.profile else {
        return Resolved {
            target: at(2),
            account,
        };
    };

    let target = match profile.role {
        Role::User => at(3),
        Role::Scout => Target::Exit,
        Role::Player => {
            if !profile.has_hudl_link() {
                at(4)
            } else if !profile.has_general_info() {
                at(5)
            } else {
                at(6)
            }
        }
        Role::Parent => match input.linked_player {
            None => at(4),
            Some(child) if !child.has_hudl_link() => at(5),
            Some(child) if !child.has_general_info() => at(6),
            Some(_) => at(7),
        },
    };
    Resolved { target, account }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Render { step: Step },
    Redirect { step: Step, location: String },
    Exit { location: String },
    /// Resolution failed; stay where the user is.
    Hold { step: Step },
}

impl Action {
    /// The step the client should show, if it stays in the flow.
    pub fn step(&self) -> Option<Step> {
        match self {
            Action::Render { step } | Action::Redirect { step, .. } | Action::Hold { step } => {
                Some(*step)
            }
            Action::Exit { .. } => None,
        }
    }
}

/// Compare the resolved target with the step in the URL.
pub fn plan(resolved: &Resolved, url_step: Step) -> Action {
    match resolved.target {
        Target::Exit => Action::Exit {
            location: PROFILE_LOCATION.to_string(),
        },
        Target::Step(step) if step == url_step => Action::Render { step },
        Target::Step(step) => Action::Redirect {
            step,
            location: step.location(),
        },
    }
}
