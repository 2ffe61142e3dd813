use anyhow::{Context, Result};
use chrono::Datelike;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use seat_killer::booking::HttpBookingClient;
use seat_killer::config::weekday_key;
use seat_killer::metrics;
use seat_killer::scheduler::{
    BookingTask, Clock, Collaborators, RunOutcome, RunSettings, SessionOrchestrator, SystemClock,
};
use seat_killer::session::CasSessionProvider;

use super::{report, Paths};

pub async fn run(paths: &Paths, metrics_file: Option<&Path>) -> Result<()> {
    let config = paths.load_config()?;
    let seats = paths.load_seat_map()?;
    let credentials = config.credentials()?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let clock = SystemClock;
    let now = clock.now();
    let Some(task) = config.today_task(now.weekday()) else {
        tracing::info!(day = weekday_key(now.weekday()), "No task enabled today, nothing to do");
        return Ok(());
    };

    let missing = seats.missing_labels(&task.name, &task.seats);
    if !missing.is_empty() {
        tracing::warn!(room = %task.name, seats = ?missing, "Seats not in seat map will be skipped");
    }

    let sessions = CasSessionProvider::new(config.client.clone());
    let booking = HttpBookingClient::new(&config.client);
    let collaborators = Collaborators {
        sessions: &sessions,
        resolver: &seats,
        booking: &booking,
        clock: &clock,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping at the next checkpoint");
            on_signal.cancel();
        }
    });

    let mut orchestrator = SessionOrchestrator::new(
        collaborators,
        credentials,
        RunSettings::from_config(&config),
        BookingTask::from_day_task(task, now, config.scheduler.advance_days),
    )
    .with_cancellation(cancel);

    let result = orchestrator.run().await;

    if let Some(path) = metrics_file {
        if let Err(e) = metrics::write_textfile(path).await {
            tracing::warn!(path = %path.display(), "Failed to write metrics file: {}", e);
        }
    }

    match result.map_err(|e| report(e.into())).context("setup failed")? {
        RunOutcome::Booked(booking) => {
            tracing::info!(%booking, "Booking confirmed");
            println!("Booked: {booking}");
        }
        RunOutcome::Exhausted => {
            tracing::info!("Both phases exhausted without a booking");
            println!("Exhausted: no seat could be booked");
        }
        RunOutcome::WindowPassed => {
            tracing::warn!("Release window already passed for today");
            println!("Window already passed");
        }
        RunOutcome::Cancelled => {
            tracing::info!("Run cancelled");
            println!("Cancelled");
        }
    }

    Ok(())
}
