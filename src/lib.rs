//! Conway's Game of Life on an 8x8 pad controller.
//!
//! The grid advances once per tick while pad presses toggle cells in real
//! time. See [`controller`] for how the two are kept from racing.

use std::time::SystemTime;

pub mod config;
pub mod controller;
pub mod device;
pub mod grid;
pub mod rendering;
pub mod sim;
pub mod util;

pub use config::LifeConfig;
pub use controller::{Command, CommandSender, ControllerHandle, spawn_controller};
pub use grid::{Grid, GridError};
pub use sim::{Simulation, SimulationFrame, SimulationStatistics};

/// Installs the stderr logger. Calling it again is a no-op.
pub fn init_logging(level: log::LevelFilter) {
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();
}
