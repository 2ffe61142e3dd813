//! Booking response decoding
//!
//! The `CODE` field has shown up as a string sentinel (`"ok"`), as a number and
//! as other shapes depending on the server revision. It is decoded into
//! [`ResponseCode`] first and only then asked whether the booking went through.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use super::AttemptOutcome;
use crate::utils::truncate_text;

/// The sentinel the server uses for an accepted booking
pub const ACCEPTED_CODE: &str = "ok";

const PREVIEW_CHARS: usize = 100;

/// Status code in whatever representation the server chose
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResponseCode {
    Text(String),
    Number(i64),
    Other(Value),
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl ResponseCode {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Text(code) if code == ACCEPTED_CODE)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(code) => write!(f, "{code}"),
            Self::Number(code) => write!(f, "{code}"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Top-level booking response
#[derive(Debug, Clone, Deserialize)]
pub struct BookResponse {
    #[serde(rename = "CODE", default)]
    pub code: ResponseCode,

    #[serde(rename = "MESSAGE", default)]
    pub message: String,

    /// Kept loose; failed bookings often send an empty array here
    #[serde(rename = "DATA", default)]
    pub data: Value,
}

impl BookResponse {
    pub fn is_success(&self) -> bool {
        self.code.is_accepted()
    }

    pub fn booking_id(&self) -> Option<String> {
        match self.data.get("bookingId")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> AttemptOutcome {
        if self.is_success() {
            AttemptOutcome::Success {
                confirmation: self.booking_id().unwrap_or_default(),
            }
        } else {
            AttemptOutcome::ServerRejected {
                code: self.code.to_string(),
                message: self.message,
            }
        }
    }
}

/// Decode a raw response body into an outcome
///
/// HTML bodies are gateway or firewall error pages and count as malformed.
pub fn decode_body(body: &str) -> AttemptOutcome {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return AttemptOutcome::MalformedResponse(format!(
            "server returned HTML (likely error page): {}",
            truncate_text(trimmed, PREVIEW_CHARS)
        ));
    }

    match serde_json::from_str::<BookResponse>(body) {
        Ok(response) => response.into_outcome(),
        Err(e) => AttemptOutcome::MalformedResponse(format!(
            "failed to decode book response: {e} | Body: {}",
            truncate_text(body, PREVIEW_CHARS)
        )),
    }
}
