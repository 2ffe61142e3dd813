pub mod check;
pub mod plan;
pub mod run;

use std::path::PathBuf;

use seat_killer::config::Config;
use seat_killer::error::{Result, SeatErrorTrait};
use seat_killer::seatmap::SeatMap;

// Re-export command functions for convenience
pub use check::check;
pub use plan::{plan, validate_config};
pub use run::run;

/// Input files shared by every command
pub struct Paths {
    pub config: PathBuf,
    pub credentials: Option<PathBuf>,
    pub seat_map: PathBuf,
}

impl Paths {
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(&self.config, self.credentials.as_deref())?;
        Ok(config)
    }

    pub fn load_seat_map(&self) -> Result<SeatMap> {
        let map = SeatMap::load(&self.seat_map)?;
        tracing::debug!(
            rooms = map.room_count(),
            seats = map.seat_count(),
            "Seat map loaded"
        );
        Ok(map)
    }
}

/// Log a failure with its category before it leaves the command
pub fn report(err: seat_killer::Error) -> seat_killer::Error {
    tracing::error!(
        category = err.category().as_str(),
        recoverable = err.is_recoverable(),
        "{}",
        err
    );
    err
}
