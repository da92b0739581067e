//! Simulation parameters and the key=value parameter file.
//!
//! Parameters are loaded once at startup, validated, and then handed by
//! value to every unit. Nothing mutates them afterwards.
//!
//! ```text
//! # params.txt
//! mass = 1.0
//! visc = 1.0
//! dt   = 0.05
//! ```

use crate::error::ParamsError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Immutable simulation parameters shared by every unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Mass of the drone
    pub mass: f64,

    /// Viscous damping coefficient
    pub visc: f64,

    /// Fixed integration timestep (seconds)
    pub dt: f64,

    /// Force added by one directional command
    pub force_step: f64,

    /// Arena spans x, y in [-world_half, +world_half]
    pub world_half: f64,

    /// Distance from a wall where wall repulsion starts
    pub wall_clearance: f64,

    /// Strength of the wall repulsion
    pub wall_gain: f64,

    /// Heartbeat age (seconds) at which the watchdog warns
    pub warn_sec: f64,

    /// Heartbeat age (seconds) at which the watchdog shuts everything down
    pub kill_sec: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            visc: 1.0,
            dt: 0.05,
            force_step: 5.0,
            world_half: 50.0,
            wall_clearance: 5.0,
            wall_gain: 0.1,
            warn_sec: 2.0,
            kill_sec: 5.0,
        }
    }
}

impl SimParams {
    /// Parses key=value text on top of the defaults.
    ///
    /// Blank lines and `#` comments are skipped. Unknown keys and values that
    /// do not parse as floating point are logged and ignored.
    pub fn from_kv_str(text: &str) -> Self {
        let mut params = Self::default();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let Ok(v) = value.parse::<f64>() else {
                warn!(key, value, "unparsable parameter value, keeping default");
                continue;
            };

            match key {
                "mass" => params.mass = v,
                "visc" => params.visc = v,
                "dt" => params.dt = v,
                "force_step" => params.force_step = v,
                "world_half" => params.world_half = v,
                "wall_clearance" => params.wall_clearance = v,
                "wall_gain" => params.wall_gain = v,
                "warn_sec" => params.warn_sec = v,
                "kill_sec" => params.kill_sec = v,
                _ => warn!(key, "unknown parameter key, ignoring"),
            }
        }

        params
    }

    /// Loads parameters from a file, falling back to defaults when the file
    /// does not exist. The result is validated before it is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let params = match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "loading parameters");
                Self::from_kv_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "parameter file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ParamsError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        params.validate()?;
        info!(
            mass = params.mass,
            visc = params.visc,
            dt = params.dt,
            force_step = params.force_step,
            world_half = params.world_half,
            wall_clearance = params.wall_clearance,
            wall_gain = params.wall_gain,
            warn_sec = params.warn_sec,
            kill_sec = params.kill_sec,
            "parameters loaded"
        );
        Ok(params)
    }

    /// Rejects parameter sets the integrator or the watchdog cannot run with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let all = [
            ("mass", self.mass),
            ("visc", self.visc),
            ("dt", self.dt),
            ("force_step", self.force_step),
            ("world_half", self.world_half),
            ("wall_clearance", self.wall_clearance),
            ("wall_gain", self.wall_gain),
            ("warn_sec", self.warn_sec),
            ("kill_sec", self.kill_sec),
        ];
        for (key, value) in all {
            if !value.is_finite() {
                return Err(ParamsError::Invalid {
                    key,
                    value,
                    reason: "must be a finite number",
                });
            }
        }

        let positive = [
            ("mass", self.mass),
            ("dt", self.dt),
            ("force_step", self.force_step),
            ("world_half", self.world_half),
            ("warn_sec", self.warn_sec),
        ];
        for (key, value) in positive {
            if value <= 0.0 {
                return Err(ParamsError::Invalid {
                    key,
                    value,
                    reason: "must be positive",
                });
            }
        }
        let non_negative = [
            ("visc", self.visc),
            ("wall_clearance", self.wall_clearance),
            ("wall_gain", self.wall_gain),
        ];
        for (key, value) in non_negative {
            if value < 0.0 {
                return Err(ParamsError::Invalid {
                    key,
                    value,
                    reason: "must not be negative",
                });
            }
        }
        if self.kill_sec <= self.warn_sec {
            return Err(ParamsError::Invalid {
                key: "kill_sec",
                value: self.kill_sec,
                reason: "must be greater than warn_sec",
            });
        }
        Ok(())
    }

    /// The fixed timestep as a `Duration`.
    pub fn timestep(&self) -> Duration {
        Duration::from_secs_f64(self.dt)
    }

    pub fn warn_after(&self) -> Duration {
        Duration::from_secs_f64(self.warn_sec)
    }

    pub fn kill_after(&self) -> Duration {
        Duration::from_secs_f64(self.kill_sec)
    }
}
