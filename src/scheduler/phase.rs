//! Fixed-interval attempt loop over one time window
//!
//! A phase owns a single ticker. On every tick inside the window it walks the
//! target labels in priority order, one request at a time, and stops at the
//! first confirmed booking. Failures of a single target never end the phase;
//! only a win, the window closing or cancellation do.

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::window::TimeWindow;
use crate::booking::{
    AcquisitionClient, AttemptOutcome, BookingError, BookingRequest, Reservation,
};
use crate::metrics;
use crate::seatmap::{ResourceResolver, SeatId};
use crate::session::Session;
use crate::utils::retry::{with_retry, RetryConfig};

/// Default spacing between ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Primary seat only, up to the release instant
    Attack,
    /// Every seat, during the grace period after release
    Fallback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seat labels in priority order, scoped to one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub group: String,
    pub labels: Vec<String>,
}

impl Targets {
    pub fn new(group: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            group: group.into(),
            labels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Highest-priority label
    pub fn primary(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// The same room restricted to its highest-priority label
    pub fn primary_only(&self) -> Self {
        Self {
            group: self.group.clone(),
            labels: self.labels.iter().take(1).cloned().collect(),
        }
    }
}

/// The winning attempt of a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseWin {
    pub phase: Phase,
    pub label: String,
    pub seat_id: SeatId,
    pub confirmation: String,
    /// Tick instant the winning attempt belonged to
    pub attempted_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    Won(PhaseWin),
    /// The window closed without a confirmed booking
    Exhausted,
    Cancelled,
}

impl PhaseResult {
    fn label(&self) -> &'static str {
        match self {
            Self::Won(_) => "won",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Runs one phase against borrowed collaborators
pub struct PhaseExecutor<'a> {
    session: &'a Session,
    resolver: &'a dyn ResourceResolver,
    client: &'a dyn AcquisitionClient,
    clock: &'a dyn Clock,
    reservation: Reservation,
    tick_interval: Duration,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<'a> PhaseExecutor<'a> {
    pub fn new(
        session: &'a Session,
        resolver: &'a dyn ResourceResolver,
        client: &'a dyn AcquisitionClient,
        clock: &'a dyn Clock,
        reservation: Reservation,
    ) -> Self {
        Self {
            session,
            resolver,
            client,
            clock,
            reservation,
            tick_interval: DEFAULT_TICK_INTERVAL,
            retry: RetryConfig::fixed(2, Duration::from_millis(100)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Immediate retry budget for a single target within one tick
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the tick loop until a win, the end of `window` or cancellation
    pub async fn run(&self, phase: Phase, window: TimeWindow, targets: &Targets) -> PhaseResult {
        info!(
            %phase,
            %window,
            room = %targets.group,
            seats = ?targets.labels,
            "Phase started"
        );

        let result = self.tick_loop(phase, window, targets).await;
        metrics::record_phase(phase.as_str(), result.label());
        result
    }

    async fn tick_loop(&self, phase: Phase, window: TimeWindow, targets: &Targets) -> PhaseResult {
        let mut ticker = self.clock.ticker(self.tick_interval);
        let mut ticks: u32 = 0;

        loop {
            let t = ticker.tick().await;

            if self.cancel.is_cancelled() {
                info!(%phase, "Phase cancelled");
                return PhaseResult::Cancelled;
            }
            if window.not_yet_open(t) {
                continue;
            }
            if window.has_closed(t) {
                info!(%phase, ticks, "Phase window closed without a booking");
                return PhaseResult::Exhausted;
            }

            ticks += 1;
            debug!(%phase, tick = ticks, at = %t.format("%H:%M:%S%.3f"), "Tick");

            for label in &targets.labels {
                if let Some(win) = self.try_target(phase, &targets.group, label, t).await {
                    return PhaseResult::Won(win);
                }
            }
        }
    }

    /// One target within one tick; `None` means move on to the next target
    async fn try_target(
        &self,
        phase: Phase,
        room: &str,
        label: &str,
        t: DateTime<Local>,
    ) -> Option<PhaseWin> {
        let (seat_id, result) = match self.resolver.resolve(room, label) {
            Ok(seat_id) => (seat_id, self.book(phase, seat_id).await),
            Err(e) => {
                let outcome = AttemptOutcome::ResolutionFailure(e.to_string());
                metrics::record_attempt(phase.as_str(), outcome.kind());
                (0, outcome.into_result())
            }
        };

        match result {
            Ok(confirmation) => {
                info!(
                    %phase,
                    room,
                    seat = label,
                    seat_id,
                    confirmation = %confirmation,
                    "Seat booked"
                );
                Some(PhaseWin {
                    phase,
                    label: label.to_string(),
                    seat_id,
                    confirmation,
                    attempted_at: t,
                })
            }
            Err(BookingError::Unresolved(cause)) => {
                warn!(%phase, room, seat = label, error = %cause, "Seat could not be resolved, skipping");
                None
            }
            Err(BookingError::Rejected { code, message }) => {
                debug!(%phase, seat = label, code = %code, message = %message, "Rejected, next tick decides");
                None
            }
            Err(e) => {
                debug!(%phase, seat = label, error = %e, "Attempt abandoned");
                None
            }
        }
    }

    /// Attempts for one resolved seat under the short retry budget
    async fn book(&self, phase: Phase, seat_id: SeatId) -> Result<String, BookingError> {
        let request = BookingRequest {
            seat_id,
            reservation: self.reservation,
        };
        let client = self.client;
        let session = self.session;

        with_retry(&self.retry, move || async move {
            let _timer = metrics::start_attempt_timer(phase.as_str());
            let outcome = client.attempt(session, &request).await;
            metrics::record_attempt(phase.as_str(), outcome.kind());
            outcome.into_result().map_err(BookingError::classify)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::clock::ManualClock;
    use crate::seatmap::{SeatInfo, SeatMap};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    fn seat_map() -> SeatMap {
        SeatMap::from_rooms([(
            "Floor 3 North",
            vec![
                SeatInfo {
                    seat_id: 101,
                    title: "A".into(),
                },
                SeatInfo {
                    seat_id: 102,
                    title: "B".into(),
                },
                SeatInfo {
                    seat_id: 103,
                    title: "C".into(),
                },
            ],
        )])
    }

    #[derive(Clone, Copy)]
    enum Script {
        Reject,
        Accept,
        Transport,
    }

    /// Scripted client that records every attempt with the clock instant
    struct ScriptedClient {
        clock: ManualClock,
        scripts: HashMap<SeatId, Script>,
        calls: Mutex<Vec<(SeatId, DateTime<Local>)>>,
    }

    impl ScriptedClient {
        fn new(clock: &ManualClock, scripts: &[(SeatId, Script)]) -> Self {
            Self {
                clock: clock.clone(),
                scripts: scripts.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(SeatId, DateTime<Local>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AcquisitionClient for ScriptedClient {
        async fn attempt(&self, _session: &Session, request: &BookingRequest) -> AttemptOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((request.seat_id, self.clock.now()));
            match self.scripts.get(&request.seat_id).copied().unwrap_or(Script::Reject) {
                Script::Reject => AttemptOutcome::ServerRejected {
                    code: "1".into(),
                    message: "seat already taken".into(),
                },
                Script::Accept => AttemptOutcome::Success {
                    confirmation: format!("BK-{}", request.seat_id),
                },
                Script::Transport => AttemptOutcome::TransportFailure("connection reset".into()),
            }
        }
    }

    fn session() -> Session {
        Session::new(reqwest::Client::new(), "777")
    }

    fn reservation() -> Reservation {
        Reservation::new(at(8, 0, 0), Duration::from_secs(3600))
    }

    fn targets(labels: &[&str]) -> Targets {
        Targets::new("Floor 3 North", labels.iter().map(|l| l.to_string()).collect())
    }

    #[tokio::test]
    async fn test_first_success_in_priority_order_wins() {
        let clock = ManualClock::new(at(20, 0, 0));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(101, Script::Reject), (102, Script::Accept)]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation());
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 15));
        let result = executor
            .run(Phase::Fallback, window, &targets(&["A", "B", "C"]))
            .await;

        match result {
            PhaseResult::Won(win) => {
                assert_eq!(win.label, "B");
                assert_eq!(win.seat_id, 102);
                assert_eq!(win.confirmation, "BK-102");
                assert_eq!(win.attempted_at, at(20, 0, 0));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let attempted: Vec<SeatId> = client.calls().iter().map(|(id, _)| *id).collect();
        assert_eq!(attempted, vec![101, 102]);
    }

    #[tokio::test]
    async fn test_tick_exactly_at_window_end_is_attempted() {
        let clock = ManualClock::new(at(19, 59, 59));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(101, Script::Reject)]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation());
        let window = TimeWindow::new(at(19, 59, 59), at(20, 0, 0));
        let result = executor.run(Phase::Attack, window, &targets(&["A"])).await;

        assert_eq!(result, PhaseResult::Exhausted);
        let instants: Vec<_> = client.calls().iter().map(|(_, t)| *t).collect();
        assert_eq!(instants.first(), Some(&at(19, 59, 59)));
        assert_eq!(instants.last(), Some(&at(20, 0, 0)));
        assert_eq!(instants.len(), 3);
    }

    #[tokio::test]
    async fn test_ticks_before_window_are_skipped() {
        let clock = ManualClock::new(at(19, 59, 58));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(101, Script::Accept)]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation());
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 15));
        let result = executor.run(Phase::Attack, window, &targets(&["A"])).await;

        assert!(matches!(result, PhaseResult::Won(ref win) if win.attempted_at == at(20, 0, 0)));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_label_does_not_abort_phase() {
        let clock = ManualClock::new(at(20, 0, 0));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(103, Script::Accept)]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation());
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 15));
        let result = executor
            .run(Phase::Fallback, window, &targets(&["Z-999", "C"]))
            .await;

        assert!(matches!(result, PhaseResult::Won(ref win) if win.label == "C" && win.seat_id == 103));
        assert_eq!(client.calls(), vec![(103, at(20, 0, 0))]);
    }

    #[tokio::test]
    async fn test_only_unresolved_label_exhausts() {
        let clock = ManualClock::new(at(20, 0, 0));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation());
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 5));
        let result = executor.run(Phase::Attack, window, &targets(&["Z-999"])).await;

        assert_eq!(result, PhaseResult::Exhausted);
        assert!(client.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_retried_then_next_target() {
        let clock = ManualClock::new(at(20, 0, 0));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(101, Script::Transport), (102, Script::Accept)]);
        let session = session();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation())
            .with_retry(RetryConfig::fixed(2, Duration::from_millis(100)));
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 15));
        let result = executor
            .run(Phase::Fallback, window, &targets(&["A", "B"]))
            .await;

        assert!(matches!(result, PhaseResult::Won(ref win) if win.seat_id == 102));
        let attempted: Vec<SeatId> = client.calls().iter().map(|(id, _)| *id).collect();
        assert_eq!(attempted, vec![101, 101, 102]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_tick() {
        let clock = ManualClock::new(at(20, 0, 0));
        let map = seat_map();
        let client = ScriptedClient::new(&clock, &[(101, Script::Accept)]);
        let session = session();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let executor = PhaseExecutor::new(&session, &map, &client, &clock, reservation())
            .with_cancellation(cancel);
        let window = TimeWindow::new(at(20, 0, 0), at(20, 0, 15));
        let result = executor.run(Phase::Attack, window, &targets(&["A"])).await;

        assert_eq!(result, PhaseResult::Cancelled);
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_primary_only() {
        let t = targets(&["A", "B", "C"]);
        assert_eq!(t.primary(), Some("A"));
        assert_eq!(t.primary_only().labels, vec!["A".to_string()]);
        assert!(targets(&[]).primary_only().is_empty());
    }
}
