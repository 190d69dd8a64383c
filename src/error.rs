use thiserror::Error;

/// Uniform error type for all profile store backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(Constraint),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Which unique constraint a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Username,
    UserId,
    /// One parent per player.
    PlayerParent,
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Constraint::Username => "username",
            Constraint::UserId => "user_id",
            Constraint::PlayerParent => "player_id",
        };
        f.write_str(name)
    }
}

/// Form-level problems. The flow never advances past one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("please enter a valid birthday")]
    InvalidBirthday,
    #[error("you must be at least 16 years old to use this platform")]
    Underage,
    #[error("username must be at least 3 characters")]
    UsernameTooShort,
    #[error("that username is reserved")]
    UsernameReserved,
    #[error("please enter a valid Hudl link")]
    InvalidHudlLink,
    #[error("graduation month must be between 1 and 12")]
    InvalidGraduationMonth,
    #[error("choose player, parent or scout")]
    InvalidRole,
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("that username is already taken, please choose another")]
    UsernameTaken,
    #[error("this player is already linked to another parent account")]
    AlreadyLinked,
    #[error("link or create a player profile first")]
    NoLinkedPlayer,
    #[error("a request for this account is already in progress")]
    Busy,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("store unavailable: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OnboardingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(Constraint::Username) => OnboardingError::UsernameTaken,
            StoreError::Conflict(Constraint::PlayerParent) => OnboardingError::AlreadyLinked,
            StoreError::NotFound => OnboardingError::NotFound("profile"),
            other => OnboardingError::Store(other),
        }
    }
}

impl OnboardingError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            OnboardingError::Validation(_) => "validation",
            OnboardingError::UsernameTaken => "username_taken",
            OnboardingError::AlreadyLinked => "already_linked",
            OnboardingError::NoLinkedPlayer => "no_linked_player",
            OnboardingError::Busy => "busy",
            OnboardingError::Unauthenticated => "unauthenticated",
            OnboardingError::Forbidden(_) => "forbidden",
            OnboardingError::NotFound(_) => "not_found",
            OnboardingError::Store(_) => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_surface_as_specific_conflicts() {
        assert!(matches!(
            OnboardingError::from(StoreError::Conflict(Constraint::Username)),
            OnboardingError::UsernameTaken
        ));
        assert!(matches!(
            OnboardingError::from(StoreError::Conflict(Constraint::PlayerParent)),
            OnboardingError::AlreadyLinked
        ));
        assert!(matches!(
            OnboardingError::from(StoreError::Backend("socket closed".into())),
            OnboardingError::Store(_)
        ));
        assert!(matches!(
            OnboardingError::from(StoreError::NotFound),
            OnboardingError::NotFound("profile")
        ));
    }

    #[test]
    fn already_linked_message_is_user_facing() {
        assert_eq!(
            OnboardingError::AlreadyLinked.to_string(),
            "this player is already linked to another parent account"
        );
    }

    #[test]
    fn role_message_lists_every_accepted_role() {
        let msg = ValidationError::InvalidRole.to_string();
        for role in ["player", "parent", "scout"] {
            assert!(msg.contains(role), "{msg}");
        }
    }
}
