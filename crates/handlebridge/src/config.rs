//! Bridge configuration
//!
//! All knobs have defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! sweep_interval_ms = 10000
//! max_allocation_attempts = 100
//! handle_floor = 1073741824
//! handle_ceiling = 2147483647
//! sweeper_enabled = true
//! release_on_shutdown = true
//! ```

use crate::error::{BridgeError, BridgeResult};
use serde::Deserialize;
use std::time::Duration;

/// Lowest handle the local allocator issues by default.
///
/// Handles below this value are left to the foreign runtime, so handles it
/// mints never collide with locally assigned ones.
pub const DEFAULT_HANDLE_FLOOR: u32 = 1 << 30;

/// Highest handle the local allocator issues by default (fits a signed 32-bit int)
pub const DEFAULT_HANDLE_CEILING: u32 = i32::MAX as u32;

/// Configuration for a [`BridgeContext`](crate::BridgeContext)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Period of the background reclamation sweep, in milliseconds
    pub sweep_interval_ms: u64,
    /// Random candidates tried before allocation fails
    pub max_allocation_attempts: u32,
    /// Lowest locally assigned handle (inclusive, must be non-zero)
    pub handle_floor: u32,
    /// Highest locally assigned handle (inclusive)
    pub handle_ceiling: u32,
    /// Run the background sweeper; when off, call `sweep_now` yourself
    pub sweeper_enabled: bool,
    /// Release every outstanding handle on shutdown
    pub release_on_shutdown: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 10_000,
            max_allocation_attempts: 100,
            handle_floor: DEFAULT_HANDLE_FLOOR,
            handle_ceiling: DEFAULT_HANDLE_CEILING,
            sweeper_enabled: true,
            release_on_shutdown: true,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> BridgeResult<Self> {
        let config: BridgeConfig =
            toml::from_str(source).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable
    pub fn validate(&self) -> BridgeResult<()> {
        if self.handle_floor == 0 {
            return Err(BridgeError::Config(
                "handle_floor must be non-zero (handle 0 is reserved)".to_string(),
            ));
        }
        if self.handle_floor > self.handle_ceiling {
            return Err(BridgeError::Config(format!(
                "handle_floor {} is above handle_ceiling {}",
                self.handle_floor, self.handle_ceiling
            )));
        }
        if self.max_allocation_attempts == 0 {
            return Err(BridgeError::Config(
                "max_allocation_attempts must be at least 1".to_string(),
            ));
        }
        if self.sweeper_enabled && self.sweep_interval_ms == 0 {
            return Err(BridgeError::Config(
                "sweep_interval_ms must be positive while the sweeper is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Sweep period as a `Duration`
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
