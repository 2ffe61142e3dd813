//! Common test utilities: simulated clock instants and scripted collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use seat_killer::booking::{AcquisitionClient, AttemptOutcome, BookingRequest, Reservation};
use seat_killer::config::Credentials;
use seat_killer::scheduler::{BookingTask, Clock, ManualClock, Targets};
use seat_killer::seatmap::{SeatId, SeatInfo, SeatMap};
use seat_killer::session::{AuthError, Session, SessionProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const ROOM: &str = "Floor 3 North";

/// A fixed Monday, local time
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
}

/// Seats A, B and C with ids 101, 102 and 103
pub fn seat_map() -> SeatMap {
    SeatMap::from_rooms([(
        ROOM,
        ["A", "B", "C"]
            .iter()
            .zip(101..)
            .map(|(title, seat_id)| SeatInfo {
                seat_id,
                title: title.to_string(),
            })
            .collect(),
    )])
}

pub fn credentials() -> Credentials {
    Credentials::new("22050101", "hunter2")
}

/// Task released at 20:00 for the given seats
pub fn task(labels: &[&str]) -> BookingTask {
    BookingTask {
        targets: Targets::new(ROOM, labels.iter().map(|l| l.to_string()).collect()),
        release_hour: 20,
        release_minute: 0,
        reservation: Reservation::new(
            Local.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap(),
            Duration::from_secs(10 * 3600),
        ),
    }
}

/// Session provider failing a set number of times before succeeding
pub struct ScriptedSessions {
    validate_error: Mutex<Option<AuthError>>,
    login_failures: u32,
    validate_calls: AtomicU32,
    login_calls: AtomicU32,
}

impl ScriptedSessions {
    pub fn ok() -> Self {
        Self::failing_logins(0)
    }

    /// The first `n` logins fail with a transient error
    pub fn failing_logins(n: u32) -> Self {
        Self {
            validate_error: Mutex::new(None),
            login_failures: n,
            validate_calls: AtomicU32::new(0),
            login_calls: AtomicU32::new(0),
        }
    }

    /// Validation fails once with `err`, then succeeds
    pub fn rejecting_validation(err: AuthError) -> Self {
        let sessions = Self::ok();
        *sessions.validate_error.lock().unwrap() = Some(err);
        sessions
    }

    pub fn validate_calls(&self) -> u32 {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for ScriptedSessions {
    async fn login(&self, _credentials: &Credentials) -> Result<Session, AuthError> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.login_failures {
            return Err(AuthError::ServiceUnavailable(format!("login overloaded ({n})")));
        }
        Ok(Session::new(reqwest::Client::new(), "777").with_display_name("Test User"))
    }

    async fn validate(&self, _credentials: &Credentials) -> Result<(), AuthError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        match self.validate_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Booking client that accepts a seat only from a given instant on
pub struct ScriptedBooking {
    clock: ManualClock,
    accept_from: HashMap<SeatId, DateTime<Local>>,
    calls: Mutex<Vec<(SeatId, DateTime<Local>)>>,
}

impl ScriptedBooking {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            accept_from: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn accept_from(mut self, seat_id: SeatId, instant: DateTime<Local>) -> Self {
        self.accept_from.insert(seat_id, instant);
        self
    }

    pub fn calls(&self) -> Vec<(SeatId, DateTime<Local>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AcquisitionClient for ScriptedBooking {
    async fn attempt(&self, _session: &Session, request: &BookingRequest) -> AttemptOutcome {
        let now = self.clock.now();
        self.calls.lock().unwrap().push((request.seat_id, now));

        match self.accept_from.get(&request.seat_id) {
            Some(from) if now >= *from => AttemptOutcome::Success {
                confirmation: format!("BK-{}-{}", request.seat_id, now.format("%H%M%S")),
            },
            _ => AttemptOutcome::ServerRejected {
                code: "1".to_string(),
                message: "预约尚未开放".to_string(),
            },
        }
    }
}
