use anyhow::{bail, Result};
use chrono::{Datelike, Local};

use seat_killer::config::weekday_key;
use seat_killer::scheduler::{self, BookingTask, RunSettings};
use seat_killer::utils::format_wait;

use super::Paths;

/// Print today's task and its windows, without any network I/O
pub fn plan(paths: &Paths) -> Result<()> {
    let config = paths.load_config()?;
    let now = Local::now();
    let today = now.weekday();

    println!("Weekly schedule");
    println!("================================");
    for (day, task) in config.week.iter() {
        let marker = if day == today { ">" } else { " " };
        println!(
            "{marker} {:<9} {:<5} {:02}:{:02}  {} {:?}  {:02}:00 +{}h",
            weekday_key(day),
            if task.enable { "on" } else { "off" },
            task.run_at_hour,
            task.run_at_minute,
            task.name,
            task.seats,
            task.book_start_hour,
            task.duration
        );
    }

    let Some(task) = config.today_task(today) else {
        println!("\nNo task enabled for {}", weekday_key(today));
        return Ok(());
    };

    let settings = RunSettings::from_config(&config);
    let booking = BookingTask::from_day_task(task, now, config.scheduler.advance_days);
    let release_plan = scheduler::plan(
        booking.release_hour,
        booking.release_minute,
        settings.preempt_lead,
        settings.fallback_window,
        now,
    );

    println!("\nToday ({})", weekday_key(today));
    println!("================================");
    println!("  Room:        {}", booking.targets.group);
    println!("  Seats:       {}", booking.targets.labels.join(", "));
    println!("  Reservation: {}", booking.reservation);
    println!("  Attack:      {}", release_plan.attack_window());
    println!("  Fallback:    {}", release_plan.fallback_window());
    println!("  Tick:        {} ms", settings.tick_interval.as_millis());

    if release_plan.has_passed(now) {
        println!("  Status:      window already passed");
    } else if let Ok(wait) = (release_plan.attack_start - now).to_std() {
        println!("  Status:      opens in {}", format_wait(wait));
    } else {
        println!("  Status:      window open");
    }

    Ok(())
}

/// Load and validate the config and check every enabled seat against the seat map
pub fn validate_config(paths: &Paths) -> Result<()> {
    let config = paths.load_config()?;
    let seats = paths.load_seat_map()?;

    let mut problems = 0;
    for (day, task) in config.week.iter().filter(|(_, task)| task.enable) {
        if seats.seats(&task.name).is_none() {
            println!("{}: room '{}' not in seat map", weekday_key(day), task.name);
            problems += 1;
            continue;
        }

        let missing = seats.missing_labels(&task.name, &task.seats);
        if !missing.is_empty() {
            println!(
                "{}: seats {:?} not in room '{}'",
                weekday_key(day),
                missing,
                task.name
            );
            problems += 1;
        }
    }

    if config.credentials.is_none() {
        println!("warning: no credentials configured");
    }

    if problems > 0 {
        bail!("{problems} task(s) reference rooms or seats missing from the seat map");
    }

    println!(
        "Configuration OK ({} room(s), {} seat(s) in seat map)",
        seats.room_count(),
        seats.seat_count()
    );
    Ok(())
}
