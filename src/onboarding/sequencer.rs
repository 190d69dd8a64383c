//! Linear step machine for the player and parent onboarding branches.
//!
//! Step numbers are overloaded between branches (4 is the Hudl link for a
//! player but the link-or-create-child screen for a parent), so every number
//! is paired with a [`StepKind`] through the account type before anything acts
//! on it.

use serde::{Deserialize, Serialize};

use super::models::AccountType;

pub const FLOW_PATH: &str = "/playerparent";
pub const COMPLETE_LOCATION: &str = "/profile?onboarding=complete";
pub const PROFILE_LOCATION: &str = "/profile";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(u8);

impl Step {
    pub const FIRST: Step = Step(1);
    pub const MAX: u8 = 7;

    pub fn new(n: u8) -> Option<Step> {
        (1..=Self::MAX).contains(&n).then_some(Step(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Reads the `step` query value. Missing or out-of-range values mean step 1.
    pub fn from_query(raw: Option<&str>) -> Step {
        raw.and_then(|s| s.trim().parse::<u8>().ok())
            .and_then(Step::new)
            .unwrap_or(Step::FIRST)
    }

    pub fn location(self) -> String {
        format!("{FLOW_PATH}?step={}", self.0)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SignUp,
    BasicInfo,
    SelectRole,
    ParentChoice,
    HudlLink,
    GeneralInfo,
    SpecificInfo,
}

impl StepKind {
    pub fn label(self) -> &'static str {
        match self {
            StepKind::SignUp => "Sign Up",
            StepKind::BasicInfo => "Basic Info",
            StepKind::SelectRole => "Select Role",
            StepKind::ParentChoice => "Link Player",
            StepKind::HudlLink => "HUDL Link",
            StepKind::GeneralInfo => "General Info",
            StepKind::SpecificInfo => "Specific Info",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            StepKind::SignUp => "Sign Up",
            StepKind::BasicInfo => "Basic",
            StepKind::SelectRole => "Role",
            StepKind::ParentChoice => "Link",
            StepKind::HudlLink => "HUDL",
            StepKind::GeneralInfo => "General",
            StepKind::SpecificInfo => "Specific",
        }
    }
}

const PLAYER_BRANCH: &[StepKind] = &[
    StepKind::SignUp,
    StepKind::BasicInfo,
    StepKind::SelectRole,
    StepKind::HudlLink,
    StepKind::GeneralInfo,
    StepKind::SpecificInfo,
];

const PARENT_BRANCH: &[StepKind] = &[
    StepKind::SignUp,
    StepKind::BasicInfo,
    StepKind::SelectRole,
    StepKind::ParentChoice,
    StepKind::HudlLink,
    StepKind::GeneralInfo,
    StepKind::SpecificInfo,
];

const SCOUT_BRANCH: &[StepKind] = &[StepKind::SignUp, StepKind::BasicInfo, StepKind::SelectRole];

impl AccountType {
    /// Ordered screens of this branch. Undetermined renders the player shape.
    pub fn branch(self) -> &'static [StepKind] {
        match self {
            AccountType::Undetermined | AccountType::Player => PLAYER_BRANCH,
            AccountType::Parent => PARENT_BRANCH,
            AccountType::Scout => SCOUT_BRANCH,
        }
    }

    pub fn max_steps(self) -> Step {
        // Branches are non-empty and at most Step::MAX long.
        Step(self.branch().len() as u8)
    }

    pub fn kind_at(self, step: Step) -> Option<StepKind> {
        self.branch().get(usize::from(step.0) - 1).copied()
    }

    pub fn step_of(self, kind: StepKind) -> Option<Step> {
        self.branch()
            .iter()
            .position(|k| *k == kind)
            .map(|i| Step(i as u8 + 1))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Move { step: Step, location: String },
    /// Left the flow after the terminal step.
    Finish { location: String },
}

impl Transition {
    pub fn to_step(step: Step) -> Self {
        Transition::Move {
            step,
            location: step.location(),
        }
    }

    pub fn finish() -> Self {
        Transition::Finish {
            location: COMPLETE_LOCATION.to_string(),
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Transition::Move { step, .. } => Some(*step),
            Transition::Finish { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Active,
    Upcoming,
}

/// One entry of the progress indicator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepInfo {
    pub number: Step,
    pub kind: StepKind,
    pub label: &'static str,
    pub short_label: &'static str,
    pub status: StepStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sequencer {
    account: AccountType,
    current: Step,
}

impl Sequencer {
    pub fn new(account: AccountType, current: Step) -> Self {
        Self {
            account,
            current: current.min(account.max_steps()),
        }
    }

    pub fn account(&self) -> AccountType {
        self.account
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn kind(&self) -> Option<StepKind> {
        self.account.kind_at(self.current)
    }

    pub fn is_terminal(&self) -> bool {
        self.current == self.account.max_steps()
    }

    /// Advance after the current screen finished. `next` defaults to the
    /// following step and is clamped to the branch.
    pub fn complete(&mut self, next: Option<Step>) -> Transition {
        if self.is_terminal() {
            return Transition::finish();
        }
        let wanted = next.map(Step::number).unwrap_or(self.current.0 + 1);
        self.current = Step(wanted.clamp(1, self.account.max_steps().0));
        Transition::to_step(self.current)
    }

    /// Previous step, floor 1. Never validates.
    pub fn back(&mut self) -> Transition {
        self.current = Step(self.current.0.saturating_sub(1).max(1));
        Transition::to_step(self.current)
    }

    /// Rebind to another branch after step 3 changed the role. Data entered so
    /// far lives on the profile row, so only the step bound changes.
    pub fn switch_account(&mut self, account: AccountType) {
        self.account = account;
        self.current = self.current.min(account.max_steps());
    }

    pub fn steps(&self) -> Vec<StepInfo> {
        self.account
            .branch()
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let number = Step(i as u8 + 1);
                let status = match number.cmp(&self.current) {
                    std::cmp::Ordering::Less => StepStatus::Completed,
                    std::cmp::Ordering::Equal => StepStatus::Active,
                    std::cmp::Ordering::Greater => StepStatus::Upcoming,
                };
                StepInfo {
                    number,
                    kind: *kind,
                    label: kind.label(),
                    short_label: kind.short_label(),
                    status,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: u8) -> Step {
        Step::new(n).unwrap()
    }

    #[test]
    fn query_parsing_defaults_to_first_step() {
        assert_eq!(Step::from_query(None), Step::FIRST);
        assert_eq!(Step::from_query(Some("abc")), Step::FIRST);
        assert_eq!(Step::from_query(Some("0")), Step::FIRST);
        assert_eq!(Step::from_query(Some("8")), Step::FIRST);
        assert_eq!(Step::from_query(Some("5")), step(5));
        assert_eq!(step(5).location(), "/playerparent?step=5");
    }

    #[test]
    fn step_four_is_overloaded_by_branch() {
        assert_eq!(AccountType::Player.kind_at(step(4)), Some(StepKind::HudlLink));
        assert_eq!(AccountType::Undetermined.kind_at(step(4)), Some(StepKind::HudlLink));
        assert_eq!(AccountType::Parent.kind_at(step(4)), Some(StepKind::ParentChoice));
        assert_eq!(AccountType::Parent.step_of(StepKind::HudlLink), Some(step(5)));
        assert_eq!(AccountType::Scout.kind_at(step(4)), None);
    }

    #[test]
    fn branch_lengths() {
        assert_eq!(AccountType::Player.max_steps(), step(6));
        assert_eq!(AccountType::Undetermined.max_steps(), step(6));
        assert_eq!(AccountType::Parent.max_steps(), step(7));
        assert_eq!(AccountType::Scout.max_steps(), step(3));
    }

    #[test]
    fn complete_clamps_and_finishes_on_terminal() {
        let mut seq = Sequencer::new(AccountType::Player, step(5));
        assert_eq!(seq.complete(Some(step(7))), Transition::to_step(step(6)));
        assert!(seq.is_terminal());
        assert_eq!(seq.complete(None), Transition::finish());
        assert_eq!(seq.current(), step(6));

        let mut parent = Sequencer::new(AccountType::Parent, step(6));
        assert_eq!(parent.complete(None), Transition::to_step(step(7)));
        assert_eq!(parent.complete(None), Transition::finish());
    }

    #[test]
    fn back_has_a_floor() {
        let mut seq = Sequencer::new(AccountType::Parent, step(2));
        assert_eq!(seq.back(), Transition::to_step(step(1)));
        assert_eq!(seq.back(), Transition::to_step(step(1)));
    }

    #[test]
    fn switching_branches_rebinds_the_bound() {
        let mut seq = Sequencer::new(AccountType::Parent, step(7));
        seq.switch_account(AccountType::Player);
        assert_eq!(seq.current(), step(6));
        assert_eq!(seq.kind(), Some(StepKind::SpecificInfo));

        let mut seq = Sequencer::new(AccountType::Player, step(3));
        seq.switch_account(AccountType::Parent);
        assert_eq!(seq.complete(None), Transition::to_step(step(4)));
        assert_eq!(seq.kind(), Some(StepKind::ParentChoice));
    }

    #[test]
    fn progress_marks_completed_active_upcoming() {
        let seq = Sequencer::new(AccountType::Parent, step(4));
        let steps = seq.steps();
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[2].status, StepStatus::Completed);
        assert_eq!(steps[3].status, StepStatus::Active);
        assert_eq!(steps[3].label, "Link Player");
        assert_eq!(steps[4].status, StepStatus::Upcoming);
    }

    #[test]
    fn transitions_serialize_with_location() {
        let json = serde_json::to_value(Transition::to_step(step(3))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "move", "step": 3, "location": "/playerparent?step=3"})
        );
    }
}
