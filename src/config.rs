use std::{error::Error, fmt, time::Duration};

use crate::{device::KeyLayout, util::LedColor};

/// The runtime parameters of a pad simulation
#[derive(Clone, Debug)]
pub struct LifeConfig {
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Time between generations
    pub tick_period: Duration,
    /// How long a single input read may block before the consumer re-checks
    /// the stop flag
    pub poll_interval: Duration,
    /// Seed roughly a quarter of the grid with live cells before the first tick
    pub random_init: bool,
    pub alive_color: LedColor,
    pub dead_color: LedColor,
    /// Publish each frame with one `write_frame` call instead of one
    /// `set_cell` per cell
    pub batched_output: bool,
    pub layout: KeyLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyGrid,
    ZeroTickPeriod,
    GridExceedsLayout {
        width: usize,
        height: usize,
        layout: KeyLayout,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyGrid => write!(f, "grid dimensions must be positive"),
            ConfigError::ZeroTickPeriod => write!(f, "tick period must be non-zero"),
            ConfigError::GridExceedsLayout {
                width,
                height,
                layout,
            } => write!(
                f,
                "a {width}x{height} grid does not fit the {}x{} pad layout",
                layout.width, layout.height
            ),
        }
    }
}

impl Error for ConfigError {}

impl LifeConfig {
    /// Defaults for the 8x8 AKAI APC mini pad.
    pub fn apc_mini() -> LifeConfig {
        let layout = KeyLayout::APC_MINI;
        Self {
            width: layout.width as usize,
            height: layout.height as usize,
            tick_period: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            random_init: false,
            alive_color: LedColor::GREEN,
            dead_color: LedColor::OFF,
            batched_output: true,
            layout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.width > self.layout.width as usize || self.height > self.layout.height as usize {
            return Err(ConfigError::GridExceedsLayout {
                width: self.width,
                height: self.height,
                layout: self.layout,
            });
        }
        Ok(())
    }
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self::apc_mini()
    }
}
