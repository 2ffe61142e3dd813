//! Seat acquisition
//!
//! An [`AcquisitionClient`] fires exactly one booking request and reports what
//! happened as an [`AttemptOutcome`]. Outcomes are never persisted; the phase
//! loop turns them into a [`BookingError`] and classifies that error for the
//! retry helper.

pub mod client;
pub mod response;

pub use client::HttpBookingClient;
pub use response::{BookResponse, ResponseCode};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCategory, SeatErrorTrait};
use crate::seatmap::SeatId;
use crate::session::Session;
use crate::utils::retry::Classified;

/// The slot being reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub begin: DateTime<Local>,
    pub duration: Duration,
}

impl Reservation {
    pub fn new(begin: DateTime<Local>, duration: Duration) -> Self {
        Self { begin, duration }
    }

    pub fn hours(&self) -> u64 {
        self.duration.as_secs() / 3600
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} for {}h",
            self.begin.format("%Y-%m-%d"),
            self.begin.format("%H:%M"),
            self.hours()
        )
    }
}

/// One booking request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRequest {
    pub seat_id: SeatId,
    pub reservation: Reservation,
}

/// Result of a single acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server accepted the booking
    Success { confirmation: String },
    /// A well-formed refusal, e.g. seat taken or requests too frequent
    ServerRejected { code: String, message: String },
    /// The request never got a usable answer
    TransportFailure(String),
    /// The seat label could not be mapped to an id
    ResolutionFailure(String),
    /// An answer arrived but could not be understood
    MalformedResponse(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Metric label for the outcome
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ServerRejected { .. } => "rejected",
            Self::TransportFailure(_) => "transport",
            Self::ResolutionFailure(_) => "unresolved",
            Self::MalformedResponse(_) => "malformed",
        }
    }

    /// Confirmation id on success, the failure otherwise
    pub fn into_result(self) -> Result<String, BookingError> {
        match self {
            Self::Success { confirmation } => Ok(confirmation),
            Self::ServerRejected { code, message } => Err(BookingError::Rejected { code, message }),
            Self::TransportFailure(cause) => Err(BookingError::Transport(cause)),
            Self::ResolutionFailure(cause) => Err(BookingError::Unresolved(cause)),
            Self::MalformedResponse(cause) => Err(BookingError::Malformed(cause)),
        }
    }
}

/// A failed booking attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("booking failed with server message: [{code}] {message}")]
    Rejected { code: String, message: String },

    #[error("booking request failed: {0}")]
    Transport(String),

    #[error("seat not resolvable: {0}")]
    Unresolved(String),

    #[error("malformed booking response: {0}")]
    Malformed(String),
}

impl SeatErrorTrait for BookingError {
    /// Only transport blips are worth an immediate second try; a server
    /// decision waits for the next tick.
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Network,
            Self::Unresolved(_) => ErrorCategory::Resolution,
            Self::Rejected { .. } | Self::Malformed(_) => ErrorCategory::Booking,
        }
    }
}

impl BookingError {
    pub fn classify(self) -> Classified<Self> {
        Classified::by_recoverability(self)
    }
}

/// Issues one acquisition attempt
#[async_trait]
pub trait AcquisitionClient: Send + Sync {
    async fn attempt(&self, session: &Session, request: &BookingRequest) -> AttemptOutcome;
}
