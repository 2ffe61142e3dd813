//! seat-killer - timed library seat reservation
//!
//! Books a library seat the moment reservations for it open. Every day the
//! booking service releases the next slots at a fixed instant; this crate
//! plans the windows around that instant, logs in just before it and walks a
//! prioritized seat list on a fixed tick until a booking is confirmed.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - TOML configuration, weekly tasks and validation
//! - [`seatmap`] - Room and seat label lookup
//! - [`session`] - Single sign-on login and authenticated sessions
//! - [`booking`] - Booking requests and response decoding
//! - [`scheduler`] - Window planning, the tick loop and the run state machine
//! - [`metrics`] - Prometheus counters for attempts, phases and runs
//! - [`utils`] - Retry helper and small time/text helpers
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Datelike, Local};
//! use seat_killer::prelude::*;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("config.toml"), None)?;
//!     let seats = SeatMap::load(Path::new("seat_report.txt"))?;
//!     let now = Local::now();
//!     let Some(task) = config.today_task(now.weekday()) else {
//!         return Ok(());
//!     };
//!
//!     let sessions = CasSessionProvider::new(config.client.clone());
//!     let booking = HttpBookingClient::new(&config.client);
//!     let clock = SystemClock;
//!     let collaborators = Collaborators {
//!         sessions: &sessions,
//!         resolver: &seats,
//!         booking: &booking,
//!         clock: &clock,
//!     };
//!
//!     let mut run = SessionOrchestrator::new(
//!         collaborators,
//!         config.credentials()?,
//!         RunSettings::from_config(&config),
//!         BookingTask::from_day_task(task, now, config.scheduler.advance_days),
//!     );
//!     println!("{:?}", run.run().await?);
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod seatmap;
pub mod session;
pub mod utils;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::booking::{AcquisitionClient, AttemptOutcome, HttpBookingClient, Reservation};
    pub use crate::config::{Config, Credentials, DayTask};
    pub use crate::error::{Error, ErrorCategory, Result, SeatErrorTrait};
    pub use crate::scheduler::{
        BookingTask, Clock, Collaborators, RunOutcome, RunSettings, SessionOrchestrator,
        SystemClock,
    };
    pub use crate::seatmap::{ResourceResolver, SeatMap};
    pub use crate::session::{CasSessionProvider, Session, SessionProvider};
}
