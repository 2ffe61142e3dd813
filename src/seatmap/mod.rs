//! Seat label to seat id lookup
//!
//! The seat map is a plain-text report listing every room followed by its
//! seats:
//!
//! ```text
//! # Room: Study Room A
//! SeatID: 14601, Title: 101
//! SeatID: 14602, Title: 102
//! ```
//!
//! Lines that match neither pattern are ignored, as are seat lines that appear
//! before the first room header.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

use crate::error::{ErrorCategory, SeatErrorTrait};

/// Numeric seat identifier used by the booking API
pub type SeatId = u64;

/// Errors raised by seat lookups
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("room '{room}' not found in seat map")]
    RoomNotFound { room: String },

    #[error("seat '{seat}' not found in room '{room}'")]
    SeatNotFound { room: String, seat: String },

    #[error("failed to read seat map {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SeatErrorTrait for ResolveError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Load { .. } => ErrorCategory::Io,
            _ => ErrorCategory::Resolution,
        }
    }
}

/// Maps a (room, seat label) pair to a seat id
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, room: &str, label: &str) -> Result<SeatId, ResolveError>;
}

/// One seat entry of a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatInfo {
    pub seat_id: SeatId,
    pub title: String,
}

/// Rooms keyed by name, seats kept in report order
#[derive(Debug, Clone, Default)]
pub struct SeatMap {
    rooms: HashMap<String, Vec<SeatInfo>>,
}

fn room_regex() -> &'static Regex {
    static ROOM_RE: OnceLock<Regex> = OnceLock::new();
    ROOM_RE.get_or_init(|| Regex::new(r"^# Room: (.+)$").expect("Invalid regex pattern"))
}

fn seat_regex() -> &'static Regex {
    static SEAT_RE: OnceLock<Regex> = OnceLock::new();
    SEAT_RE.get_or_init(|| {
        Regex::new(r"^SeatID: (\d+), Title: (.+)$").expect("Invalid regex pattern")
    })
}

impl SeatMap {
    /// Load a seat report from disk
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = std::fs::read_to_string(path).map_err(|source| ResolveError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse seat report text
    pub fn parse(content: &str) -> Self {
        let mut rooms: HashMap<String, Vec<SeatInfo>> = HashMap::new();
        let mut current_room: Option<String> = None;

        for line in content.lines() {
            let line = line.trim_end_matches('\r');

            if let Some(caps) = room_regex().captures(line) {
                let room = caps[1].trim().to_string();
                rooms.entry(room.clone()).or_default();
                current_room = Some(room);
            } else if let Some(caps) = seat_regex().captures(line) {
                let Some(room) = current_room.as_ref() else {
                    continue;
                };
                let Ok(seat_id) = caps[1].parse::<SeatId>() else {
                    continue;
                };
                rooms.entry(room.clone()).or_default().push(SeatInfo {
                    seat_id,
                    title: caps[2].trim().to_string(),
                });
            }
        }

        Self { rooms }
    }

    /// Build a map from literal entries
    pub fn from_rooms<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<SeatInfo>)>,
        S: Into<String>,
    {
        Self {
            rooms: rooms.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn seat_count(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }

    pub fn seats(&self, room: &str) -> Option<&[SeatInfo]> {
        self.rooms.get(room).map(Vec::as_slice)
    }

    /// Labels of `seats` that are not present in `room`
    pub fn missing_labels<'a>(&self, room: &str, seats: &'a [String]) -> Vec<&'a str> {
        seats
            .iter()
            .filter(|label| self.resolve(room, label).is_err())
            .map(String::as_str)
            .collect()
    }
}

impl ResourceResolver for SeatMap {
    fn resolve(&self, room: &str, label: &str) -> Result<SeatId, ResolveError> {
        let seats = self
            .rooms
            .get(room)
            .ok_or_else(|| ResolveError::RoomNotFound {
                room: room.to_string(),
            })?;

        seats
            .iter()
            .find(|seat| seat.title == label)
            .map(|seat| seat.seat_id)
            .ok_or_else(|| ResolveError::SeatNotFound {
                room: room.to_string(),
                seat: label.to_string(),
            })
    }
}
