//! Timed preemptive seat acquisition
//!
//! This module drives one day's run against the library booking service. It
//! waits for the daily release instant, logs in, then hammers the booking
//! endpoint on a fixed tick until a seat is confirmed or the grace period
//! after release runs out.
//!
//! # Timeline
//!
//! ```text
//!        attack_start          release            fallback_end
//!   ─────────┼────────────────────┼────────────────────┼──────────▶ t
//!            │◀── attack phase ──▶│◀─ fallback phase ─▶│
//!            │  primary seat only │   every seat, in   │
//!            │                    │   priority order   │
//!   validate ┘ wait    login      │                    └ exhausted
//! ```
//!
//! # Modules
//!
//! - [`window`] - Release plan and window arithmetic
//! - [`clock`] - Wall clock, ticker and the simulated clock used in tests
//! - [`phase`] - The tick loop over one window
//! - [`orchestrator`] - State machine sequencing a full run
//! - [`error`] - Setup failures
//!
//! # Failure handling
//!
//! Per-attempt failures are classified before they reach the retry helper:
//!
//! | Failure              | Immediate retry | Effect on the phase         |
//! |----------------------|-----------------|-----------------------------|
//! | Transport error      | yes, bounded    | next target after budget    |
//! | Server rejection     | no              | next target, next tick      |
//! | Malformed response   | no              | next target, next tick      |
//! | Unknown seat label   | no              | skipped every tick          |
//! | Wrong credentials    | no              | run aborts with setup error |

pub mod clock;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock, Ticker};
pub use error::{SchedulerError, SchedulerResult};
pub use orchestrator::{
    Booking, BookingTask, Collaborators, RunOutcome, RunSettings, RunState, SessionOrchestrator,
};
pub use phase::{Phase, PhaseExecutor, PhaseResult, PhaseWin, Targets, DEFAULT_TICK_INTERVAL};
pub use window::{plan, ReleasePlan, TimeWindow, DEFAULT_FALLBACK_WINDOW};
