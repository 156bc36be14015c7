use thiserror::Error;

pub type JourneyResult<T> = Result<T, JourneyError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JourneyError {
    // Journey construction
    #[error("Stage with ID {0} already exists in this journey")]
    DuplicateStageId(String),

    #[error("Journey can only have one onboarding stage (rejected {0})")]
    DuplicateOnboardingStage(String),

    #[error("Journey can only have one terminal stage (rejected {0})")]
    DuplicateTerminalStage(String),

    #[error("Stage {0} does not exist in this journey")]
    UnknownStage(String),

    // Validation
    #[error("Journey {0} must have an onboarding stage")]
    NoOnboardingStage(String),

    #[error("Journey {0} must have a terminal stage")]
    NoTerminalStage(String),

    #[error("Journey {0} has no valid path from onboarding to terminal stage")]
    NoPathToTerminal(String),

    // Registration / lookup
    #[error("Journey with ID {0} already exists")]
    JourneyAlreadyExists(String),

    #[error("{0}")]
    InvalidJourney(String),

    #[error("Journey with ID {0} not found")]
    JourneyNotFound(String),

    // Per-user operations
    #[error("User {user_id} is not onboarded to journey {journey_id}")]
    UserNotOnboarded { user_id: String, journey_id: String },

    #[error("User {user_id} is already onboarded to journey {journey_id}")]
    UserAlreadyOnboarded { user_id: String, journey_id: String },

    #[error("Stage {to} is not a valid next stage from {from}")]
    InvalidStageTransition { from: String, to: String },

    // Condition resolution
    #[error("No predicate registered under name `{0}`")]
    UnknownPredicate(String),
}

impl JourneyError {
    /// Stable machine-readable code used by the administrative surface.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateStageId(_) => "DUPLICATE_STAGE_ID",
            Self::DuplicateOnboardingStage(_) => "DUPLICATE_ONBOARDING_STAGE",
            Self::DuplicateTerminalStage(_) => "DUPLICATE_TERMINAL_STAGE",
            Self::UnknownStage(_) => "UNKNOWN_STAGE",
            Self::NoOnboardingStage(_) => "NO_ONBOARDING_STAGE",
            Self::NoTerminalStage(_) => "NO_TERMINAL_STAGE",
            Self::NoPathToTerminal(_) => "NO_PATH_TO_TERMINAL",
            Self::JourneyAlreadyExists(_) => "JOURNEY_ALREADY_EXISTS",
            Self::InvalidJourney(_) => "INVALID_JOURNEY",
            Self::JourneyNotFound(_) => "JOURNEY_NOT_FOUND",
            Self::UserNotOnboarded { .. } => "USER_NOT_ONBOARDED",
            Self::UserAlreadyOnboarded { .. } => "USER_ALREADY_ONBOARDED",
            Self::InvalidStageTransition { .. } => "INVALID_STAGE_TRANSITION",
            Self::UnknownPredicate(_) => "UNKNOWN_PREDICATE",
        }
    }

    /// True for failures caused by a malformed journey definition.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateStageId(_)
                | Self::DuplicateOnboardingStage(_)
                | Self::DuplicateTerminalStage(_)
                | Self::UnknownStage(_)
                | Self::NoOnboardingStage(_)
                | Self::NoTerminalStage(_)
                | Self::NoPathToTerminal(_)
                | Self::InvalidJourney(_)
                | Self::UnknownPredicate(_)
        )
    }
}
