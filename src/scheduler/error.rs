//! Error types for the scheduler module

use std::fmt;

use crate::error::{ErrorCategory, SeatErrorTrait};
use crate::session::AuthError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Fatal setup failures; a run that merely finds no seat is not an error
#[derive(Debug)]
pub enum SchedulerError {
    /// Credential check failed before waiting for the window
    CredentialValidation { source: AuthError },

    /// Login failed once the window opened
    Login { attempts: u32, source: AuthError },

    /// The task has nothing to book
    NoTargets { room: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialValidation { source } => {
                write!(f, "Credential validation failed: {}", source)
            }
            Self::Login { attempts, source } => {
                write!(f, "Login failed after {} attempt(s): {}", attempts, source)
            }
            Self::NoTargets { room } => {
                write!(f, "No seats configured for room '{}'", room)
            }
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CredentialValidation { source } | Self::Login { source, .. } => Some(source),
            Self::NoTargets { .. } => None,
        }
    }
}

impl SchedulerError {
    pub fn validation(source: AuthError) -> Self {
        Self::CredentialValidation { source }
    }

    pub fn login(attempts: u32, source: AuthError) -> Self {
        Self::Login { attempts, source }
    }

    /// The auth failure behind a setup error, if any
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            Self::CredentialValidation { source } | Self::Login { source, .. } => Some(source),
            Self::NoTargets { .. } => None,
        }
    }
}

impl SeatErrorTrait for SchedulerError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialValidation { .. } | Self::Login { .. } => ErrorCategory::Auth,
            Self::NoTargets { .. } => ErrorCategory::Scheduler,
        }
    }
}
