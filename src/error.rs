//! Unified error handling for the seat-killer crate
//!
//! Each subsystem owns a domain error; this module gathers them into one
//! [`Error`] enum and gives all of them a common [`SeatErrorTrait`] so callers
//! can ask whether a failure is worth retrying and which category it belongs
//! to without matching on every variant.
//!
//! # Taxonomy
//!
//! | Category | Examples | Handling |
//! |----------|----------|----------|
//! | `Network` | connection reset, timeout | retry with delay |
//! | `Booking` | server rejected the seat, unparseable reply | next tick |
//! | `Resolution` | seat label not in the seat map | skip the seat |
//! | `Auth` | wrong password, SSO down | fatal once retries are spent |
//! | `Config` | out-of-range hour | fatal before anything starts |

use thiserror::Error;

pub use crate::booking::BookingError;
pub use crate::config::ConfigError;
pub use crate::scheduler::SchedulerError;
pub use crate::seatmap::ResolveError;
pub use crate::session::AuthError;

/// Common trait for all seat-killer error types
pub trait SeatErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the same call can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport-level failures (HTTP, timeout)
    Network,
    /// Credential or session failures
    Auth,
    /// Seat label lookups
    Resolution,
    /// Well-formed or malformed booking replies that did not succeed
    Booking,
    /// Configuration and validation errors
    Config,
    /// Scheduling and timing errors
    Scheduler,
    /// File and stream I/O
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Resolution => "resolution",
            Self::Booking => "booking",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Io => "io",
        }
    }
}

/// Unified error type for the seat-killer crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Seat map error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl SeatErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(e) => e.is_recoverable(),
            Self::Auth(e) => e.is_recoverable(),
            Self::Resolve(e) => e.is_recoverable(),
            Self::Booking(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Auth(e) => e.category(),
            Self::Resolve(e) => e.category(),
            Self::Booking(e) => e.category(),
            Self::Scheduler(e) => e.category(),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
