use anyhow::{Context, Result};
use chrono::{Datelike, Local};

use seat_killer::booking::{
    AcquisitionClient, BookingError, BookingRequest, HttpBookingClient, Reservation,
};
use seat_killer::error::SeatErrorTrait;
use seat_killer::seatmap::{ResourceResolver, SeatId, SeatMap};
use seat_killer::session::{CasSessionProvider, SessionProvider};

use super::{report, Paths};

/// Offset that pushes a real seat id outside the valid range
const PROBE_OFFSET: SeatId = 1_000_000;

/// Seat id that the server is guaranteed to reject
///
/// A known label is shifted out of range; an unknown one is used as-is when
/// numeric and falls back to 0.
pub fn probe_seat_id(seats: &SeatMap, room: &str, label: &str) -> SeatId {
    match seats.resolve(room, label) {
        Ok(id) => id + PROBE_OFFSET,
        Err(_) => label.trim().parse().unwrap_or(0),
    }
}

/// Log in and send one booking that cannot succeed
///
/// Exercises the whole path (login, profile, request signing, response
/// decoding) without holding a seat.
pub async fn check(paths: &Paths) -> Result<()> {
    let config = paths.load_config()?;
    let seats = paths.load_seat_map()?;
    let credentials = config.credentials()?;
    let now = Local::now();

    let task = config
        .probe
        .as_ref()
        .or_else(|| config.today_task(now.weekday()))
        .context("No [probe] task configured and no task enabled today")?;
    let label = task
        .seats
        .first()
        .context("Probe task lists no seats")?;
    let seat_id = probe_seat_id(&seats, &task.name, label);

    println!("Probing booking service");
    println!("================================");

    let sessions = CasSessionProvider::new(config.client.clone());
    let session = sessions
        .login(credentials)
        .await
        .map_err(|e| report(e.into()))
        .context("Login failed")?;
    println!(
        "  Logged in:   uid {} ({})",
        session.uid(),
        session.display_name().unwrap_or("unknown")
    );

    let request = BookingRequest {
        seat_id,
        reservation: Reservation::new(
            task.reservation_start(now, config.scheduler.advance_days),
            task.reservation_duration(),
        ),
    };
    println!("  Room:        {} / {}", task.name, label);
    println!("  Probe seat:  {}", seat_id);
    println!("  Reservation: {}", request.reservation);

    let client = HttpBookingClient::new(&config.client);
    let outcome = client.attempt(&session, &request).await;
    tracing::info!(outcome = outcome.kind(), "Probe finished");

    match outcome.into_result() {
        Ok(confirmation) => {
            println!("  Result:      accepted (confirmation {confirmation}), cancel it manually");
        }
        Err(BookingError::Rejected { code, message }) => {
            println!("  Result:      rejected as expected [{code}] {message}");
        }
        Err(e) => {
            let err = report(e.into());
            println!("  Result:      failed ({}): {err}", err.category().as_str());
        }
    }

    Ok(())
}
