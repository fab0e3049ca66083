// ❗ Engine errors - one enum, one stable reason code per failure class
//
// Validation and precondition errors are raised before anything is written.
// Store errors wrap whatever the record layer reported (anyhow, like db.rs).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A required request field was absent or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A date/time field could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Any other malformed argument (negative timeout, threshold out of range...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Some requested draws do not exist
    #[error("Draw count mismatch: expected {expected}, found {found}")]
    DrawCountMismatch {
        expected: usize,
        found: usize,
        missing: Vec<String>,
    },

    /// Some requested draws are not in the `staged` status
    #[error("Draws not in staged status: {}", .ids.join(", "))]
    InvalidDrawStatus { ids: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A status change the state machine does not allow
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// The server-side shared secret is unset; every request is refused
    #[error("Shared secret is not configured")]
    SecretNotConfigured,

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Machine-readable reason code, stable across releases
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::MissingField(_) => "missing_field",
            EngineError::InvalidDate(_) => "invalid_date",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::DrawCountMismatch { .. } => "draw_count_mismatch",
            EngineError::InvalidDrawStatus { .. } => "invalid_draw_status",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidTransition(_) => "invalid_transition",
            EngineError::Unauthorized => "unauthorized",
            EngineError::SecretNotConfigured => "secret_not_configured",
            EngineError::Store(_) => "store_error",
        }
    }

    /// True for errors raised before any record was touched
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EngineError::Store(_))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Store(err.into())
    }
}
