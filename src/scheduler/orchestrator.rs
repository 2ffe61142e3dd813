//! One day's booking run, from credential check to a booked seat
//!
//! ```text
//! Idle -> Validating -> WaitingForWindow -> LoggingIn -> AttackPhase -> FallbackPhase -> Done
//! ```
//!
//! Validation and login failures end the run with a [`SchedulerError`]. Every
//! other ending, including "nothing booked", is a [`RunOutcome`].

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::clock::Clock;
use super::error::{SchedulerError, SchedulerResult};
use super::phase::{Phase, PhaseExecutor, PhaseResult, PhaseWin, Targets, DEFAULT_TICK_INTERVAL};
use super::window::{self, ReleasePlan, DEFAULT_FALLBACK_WINDOW};
use crate::booking::{AcquisitionClient, Reservation};
use crate::config::{Config, Credentials, DayTask};
use crate::metrics;
use crate::seatmap::{ResourceResolver, SeatId};
use crate::session::{Session, SessionProvider};
use crate::utils::format_wait;
use crate::utils::retry::{with_retry, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    WaitingForWindow,
    LoggingIn,
    AttackPhase,
    FallbackPhase,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::WaitingForWindow => "waiting_for_window",
            Self::LoggingIn => "logging_in",
            Self::AttackPhase => "attack_phase",
            Self::FallbackPhase => "fallback_phase",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A confirmed reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub phase: Phase,
    pub room: String,
    pub seat: String,
    pub seat_id: SeatId,
    pub confirmation: String,
    pub reservation: Reservation,
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} (id {}) on {}, confirmation '{}', won in {} phase",
            self.room, self.seat, self.seat_id, self.reservation, self.confirmation, self.phase
        )
    }
}

/// How a run ended when setup succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Booked(Booking),
    /// Both phases ran out without a booking
    Exhausted,
    /// The fallback window had already closed when the run reached it
    WindowPassed,
    Cancelled,
}

impl RunOutcome {
    /// Metric label, matching [`metrics::RUN_RESULTS`]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Booked(_) => "booked",
            Self::Exhausted => "exhausted",
            Self::WindowPassed => "window_passed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Borrowed collaborators of one run
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub sessions: &'a dyn SessionProvider,
    pub resolver: &'a dyn ResourceResolver,
    pub booking: &'a dyn AcquisitionClient,
    pub clock: &'a dyn Clock,
}

/// Timing and retry tunables of one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub tick_interval: Duration,
    pub preempt_lead: Duration,
    pub fallback_window: Duration,
    pub validation_retry: RetryConfig,
    pub login_retry: RetryConfig,
    pub booking_retry: RetryConfig,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            preempt_lead: Duration::from_secs(15),
            fallback_window: DEFAULT_FALLBACK_WINDOW,
            validation_retry: RetryConfig::fixed(3, Duration::from_secs(2)),
            login_retry: RetryConfig::fixed(20, Duration::from_secs(3)),
            booking_retry: RetryConfig::fixed(2, Duration::from_millis(100)),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        let scheduler = &config.scheduler;
        Self {
            tick_interval: scheduler.tick_interval(),
            preempt_lead: config.global.preempt_lead(),
            fallback_window: scheduler.fallback_window(),
            validation_retry: scheduler.validation_retry(),
            login_retry: scheduler.login_retry(),
            booking_retry: scheduler.booking_retry(),
        }
    }
}

/// What to book and when it is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingTask {
    pub targets: Targets,
    pub release_hour: u32,
    pub release_minute: u32,
    pub reservation: Reservation,
}

impl BookingTask {
    /// The run for `task` on `today`, reserving `advance_days` ahead
    pub fn from_day_task(task: &DayTask, today: DateTime<Local>, advance_days: u32) -> Self {
        Self {
            targets: Targets::new(task.name.clone(), task.seats.clone()),
            release_hour: task.run_at_hour,
            release_minute: task.run_at_minute,
            reservation: Reservation::new(
                task.reservation_start(today, advance_days),
                task.reservation_duration(),
            ),
        }
    }
}

/// Sequences one booking run
pub struct SessionOrchestrator<'a> {
    collaborators: Collaborators<'a>,
    credentials: &'a Credentials,
    settings: RunSettings,
    task: BookingTask,
    plan: ReleasePlan,
    cancel: CancellationToken,
    state: RunState,
}

impl<'a> SessionOrchestrator<'a> {
    /// Plan today's windows from the collaborator clock
    pub fn new(
        collaborators: Collaborators<'a>,
        credentials: &'a Credentials,
        settings: RunSettings,
        task: BookingTask,
    ) -> Self {
        let plan = window::plan(
            task.release_hour,
            task.release_minute,
            settings.preempt_lead,
            settings.fallback_window,
            collaborators.clock.now(),
        );

        Self {
            collaborators,
            credentials,
            settings,
            task,
            plan,
            cancel: CancellationToken::new(),
            state: RunState::Idle,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self) -> &ReleasePlan {
        &self.plan
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the run to its end
    pub async fn run(&mut self) -> SchedulerResult<RunOutcome> {
        let result = self.execute().await;
        self.transition(RunState::Done);

        match &result {
            Ok(outcome) => metrics::record_run_result(outcome.label()),
            Err(_) => metrics::record_run_result("setup_failed"),
        }
        result
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }

    async fn execute(&mut self) -> SchedulerResult<RunOutcome> {
        if self.task.targets.is_empty() {
            return Err(SchedulerError::NoTargets {
                room: self.task.targets.group.clone(),
            });
        }

        info!(
            room = %self.task.targets.group,
            seats = ?self.task.targets.labels,
            reservation = %self.task.reservation,
            attack = %self.plan.attack_window(),
            fallback = %self.plan.fallback_window(),
            "Run planned"
        );

        self.transition(RunState::Validating);
        self.validate().await?;

        self.transition(RunState::WaitingForWindow);
        if !self.wait_for_window().await {
            return Ok(RunOutcome::Cancelled);
        }
        if self.plan.has_passed(self.collaborators.clock.now()) {
            warn!(fallback_end = %self.plan.fallback_end.format("%H:%M:%S"), "Window already passed");
            return Ok(RunOutcome::WindowPassed);
        }

        self.transition(RunState::LoggingIn);
        let session = self.login().await?;

        self.transition(RunState::AttackPhase);
        let executor = PhaseExecutor::new(
            &session,
            self.collaborators.resolver,
            self.collaborators.booking,
            self.collaborators.clock,
            self.task.reservation,
        )
        .with_tick_interval(self.settings.tick_interval)
        .with_retry(self.settings.booking_retry.clone())
        .with_cancellation(self.cancel.clone());

        let attack = executor
            .run(
                Phase::Attack,
                self.plan.attack_window(),
                &self.task.targets.primary_only(),
            )
            .await;
        match attack {
            PhaseResult::Won(win) => return Ok(self.booked(win)),
            PhaseResult::Cancelled => return Ok(RunOutcome::Cancelled),
            PhaseResult::Exhausted => {}
        }

        if self.plan.has_passed(self.collaborators.clock.now()) {
            info!("Fallback window already elapsed, skipping fallback phase");
            return Ok(RunOutcome::Exhausted);
        }

        self.transition(RunState::FallbackPhase);
        let fallback = executor
            .run(Phase::Fallback, self.plan.fallback_window(), &self.task.targets)
            .await;
        Ok(match fallback {
            PhaseResult::Won(win) => self.booked(win),
            PhaseResult::Cancelled => RunOutcome::Cancelled,
            PhaseResult::Exhausted => RunOutcome::Exhausted,
        })
    }

    async fn validate(&self) -> SchedulerResult<()> {
        let sessions = self.collaborators.sessions;
        let credentials = self.credentials;

        with_retry(&self.settings.validation_retry, move || async move {
            sessions.validate(credentials).await.map_err(|e| {
                metrics::record_auth_failure("validation");
                e.classify()
            })
        })
        .await
        .map_err(SchedulerError::validation)?;

        info!("Credentials validated");
        Ok(())
    }

    /// `false` when cancelled before the window opened
    async fn wait_for_window(&self) -> bool {
        let clock = self.collaborators.clock;
        let start = self.plan.attack_start;

        if let Ok(wait) = (start - clock.now()).to_std() {
            info!(
                attack_start = %start.format("%H:%M:%S"),
                wait = %format_wait(wait),
                "Waiting for attack window"
            );
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Cancelled while waiting for the window");
                false
            }
            _ = clock.sleep_until(start) => true,
        }
    }

    async fn login(&self) -> SchedulerResult<Session> {
        let sessions = self.collaborators.sessions;
        let credentials = self.credentials;
        let mut attempts: u32 = 0;

        let result = with_retry(&self.settings.login_retry, || {
            attempts += 1;
            async move {
                sessions.login(credentials).await.map_err(|e| {
                    metrics::record_auth_failure("login");
                    e.classify()
                })
            }
        })
        .await;

        let session = result.map_err(|e| SchedulerError::login(attempts, e))?;
        info!(
            uid = session.uid(),
            name = session.display_name().unwrap_or("-"),
            attempts,
            "Logged in"
        );
        Ok(session)
    }

    fn booked(&self, win: PhaseWin) -> RunOutcome {
        RunOutcome::Booked(Booking {
            phase: win.phase,
            room: self.task.targets.group.clone(),
            seat: win.label,
            seat_id: win.seat_id,
            confirmation: win.confirmation,
            reservation: self.task.reservation,
        })
    }
}
