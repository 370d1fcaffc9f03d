//! Configuration loader for the `minewatch-telemetry` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
//! Engine tunables are collected into a [`SimulationConfig`]; everything else
//! (database, listener, feed path, mirroring) stays on [`Config`].
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::engine::risk::RiskThresholds;
use crate::engine::{HistoryMode, InitialAgeSampling, SimulationConfig};

/// Parse an optional environment variable with `FromStr`, falling back to a default.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// How live readings are mirrored into persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorMode {
    Off,
    /// Write into this service's own database.
    Local,
    /// POST to a remote persistence API at this base URL.
    Rest(String),
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// HTTP listen address.
    pub bind_addr: SocketAddr,

    /// Path of the site source feed CSV.
    pub sites_csv: PathBuf,

    /// Real milliseconds per simulated day.
    pub clock_tick_ms: u64,

    pub mirror: MirrorMode,

    pub simulation: SimulationConfig,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – SQLite connection string (default: `sqlite://telemetry.db?mode=rwc`)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:3001`)
/// - `SITES_CSV` – site feed path (default: `data/sites.csv`)
/// - `CLOCK_TICK_MS` – ms per simulated day (default: 1000)
/// - `SENSOR_EVERY_TICKS` – clock ticks per sensor sample (default: 7)
/// - `HISTORY_MODE` – `eager` | `lazy` (default: `eager`)
/// - `HISTORY_CAPACITY` – readings kept per site (default: 30)
/// - `BACKFILL_READINGS` – lazy backfill length (default: 20)
/// - `INITIAL_AGE_SAMPLING` – `random-uniform-0-400` | `zero`
/// - `RISK_MODERATE` / `RISK_CRITICAL` – status thresholds (default: 35 / 75)
/// - `SIM_SEED` – fixed RNG seed
/// - `MIRROR_MODE` – `off` | `local` | `rest` (default: `off`)
/// - `MIRROR_API_URL` – remote API base URL, required for `rest`
///
/// Returns an error if any variable is invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = env_or!("DATABASE_URL", "sqlite://telemetry.db?mode=rwc");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let bind_addr = parse_env!("BIND_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 3001)));
    let sites_csv = PathBuf::from(env_or!("SITES_CSV", "data/sites.csv"));
    let clock_tick_ms = parse_env!("CLOCK_TICK_MS", u64, 1000);

    let defaults = SimulationConfig::default();
    let thresholds = RiskThresholds {
        moderate: parse_env!("RISK_MODERATE", u8, defaults.thresholds.moderate),
        critical: parse_env!("RISK_CRITICAL", u8, defaults.thresholds.critical),
    };

    let simulation = SimulationConfig {
        thresholds,
        history_mode: parse_env!("HISTORY_MODE", HistoryMode, defaults.history_mode),
        history_capacity: parse_env!("HISTORY_CAPACITY", usize, defaults.history_capacity),
        backfill_readings: parse_env!("BACKFILL_READINGS", usize, defaults.backfill_readings),
        initial_sampling: parse_env!(
            "INITIAL_AGE_SAMPLING",
            InitialAgeSampling,
            defaults.initial_sampling
        ),
        sensor_every_ticks: parse_env!("SENSOR_EVERY_TICKS", u64, defaults.sensor_every_ticks),
        seed: env::var("SIM_SEED")
            .ok()
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid SIM_SEED: {}", e))?,
        ..defaults
    };

    let mirror = match env_or!("MIRROR_MODE", "off").as_str() {
        "off" => MirrorMode::Off,
        "local" => MirrorMode::Local,
        "rest" => MirrorMode::Rest(
            env::var("MIRROR_API_URL")
                .map_err(|_| anyhow!("MIRROR_API_URL must be set when MIRROR_MODE=rest"))?,
        ),
        other => bail!("Invalid MIRROR_MODE: {}", other),
    };

    let config = Config {
        db_url,
        db_pool_max,
        bind_addr,
        sites_csv,
        clock_tick_ms,
        mirror,
        simulation,
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        // ---
        let t = &self.simulation.thresholds;
        if !(t.moderate < t.critical && t.critical <= 100) {
            bail!(
                "Risk thresholds must satisfy RISK_MODERATE < RISK_CRITICAL <= 100 (got {} / {})",
                t.moderate,
                t.critical
            );
        }
        if self.simulation.history_capacity == 0 {
            bail!("HISTORY_CAPACITY must be at least 1");
        }
        if self.simulation.sensor_every_ticks == 0 {
            bail!("SENSOR_EVERY_TICKS must be at least 1");
        }
        if self.clock_tick_ms == 0 {
            bail!("CLOCK_TICK_MS must be at least 1");
        }
        Ok(())
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the query string of the database URL, which may carry
    /// credentials for remote SQLite hosts.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = match self.db_url.split_once('?') {
            Some((path, _)) => format!("{}?****", path),
            None => self.db_url.clone(),
        };
        let sim = &self.simulation;

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL         : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX          : {}", self.db_pool_max);
        tracing::info!("  BIND_ADDR            : {}", self.bind_addr);
        tracing::info!("  SITES_CSV            : {}", self.sites_csv.display());
        tracing::info!("  CLOCK_TICK_MS        : {}", self.clock_tick_ms);
        tracing::info!("  SENSOR_EVERY_TICKS   : {}", sim.sensor_every_ticks);
        tracing::info!("  HISTORY_MODE         : {:?}", sim.history_mode);
        tracing::info!("  HISTORY_CAPACITY     : {}", sim.history_capacity);
        tracing::info!("  BACKFILL_READINGS    : {}", sim.backfill_readings);
        tracing::info!("  INITIAL_AGE_SAMPLING : {:?}", sim.initial_sampling);
        tracing::info!(
            "  RISK THRESHOLDS      : {} / {}",
            sim.thresholds.moderate,
            sim.thresholds.critical
        );
        tracing::info!("  SIM_SEED             : {:?}", sim.seed);
        tracing::info!("  MIRROR               : {:?}", self.mirror);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn config() -> Config {
        Config {
            db_url: "sqlite::memory:".into(),
            db_pool_max: 1,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            sites_csv: PathBuf::from("data/sites.csv"),
            clock_tick_ms: 1000,
            mirror: MirrorMode::Off,
            simulation: SimulationConfig::default(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        // ---
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        // ---
        let mut cfg = config();
        cfg.simulation.thresholds = RiskThresholds {
            moderate: 80,
            critical: 40,
        };
        assert!(cfg.validate().is_err());

        cfg.simulation.thresholds = RiskThresholds {
            moderate: 40,
            critical: 101,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        // ---
        let mut cfg = config();
        cfg.simulation.sensor_every_ticks = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.clock_tick_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.simulation.history_capacity = 0;
        assert!(cfg.validate().is_err());
    }
}
