//! Per-tick world view handed to renderers and exporters.

use crate::blackboard::{Mode, ScoreState};
use crate::entities::Entity;
use crate::messages::{DroneState, ForceCommand};
use crate::potential::VirtualKey;
use serde::Serialize;

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: u64,
    pub mode: Mode,
    pub state: DroneState,

    /// Force last sent to the dynamics engine (user force plus virtual key)
    pub force: ForceCommand,
    pub user_force: [f64; 2],
    pub virtual_key: Option<VirtualKey>,

    pub score: ScoreState,

    /// Seconds since the last target hit
    pub time_since_last_hit: Option<f64>,

    pub obstacles: Vec<Entity>,
    pub targets: Vec<Entity>,
    pub last_key: Option<char>,

    pub warning_active: bool,

    /// Banner visibility for the current blink phase
    pub blink_on: bool,

    /// Seconds since the last heartbeat
    pub heartbeat_age: f64,
    pub warn_in: f64,
    pub kill_in: f64,
}

impl Snapshot {
    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "step={} mode={:?} pos=({:.2},{:.2}) vel=({:.2},{:.2}) F=({:.1},{:.1}) score={} obs={} tgt={}{}",
            self.step,
            self.mode,
            self.state.x,
            self.state.y,
            self.state.vx,
            self.state.vy,
            self.force.fx,
            self.force.fy,
            self.score.score,
            self.obstacles.len(),
            self.targets.len(),
            if self.warning_active { " WATCHDOG WARNING" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::blackboard::Blackboard;
    use crate::params::SimParams;
    use std::time::Duration;

    #[test]
    fn test_summary_mentions_warning() {
        let mut b = Blackboard::new(SimParams::default());
        assert!(!b.snapshot(Duration::ZERO).summary().contains("WARNING"));
        b.on_warning();
        let s = b.snapshot(Duration::ZERO).summary();
        assert!(s.contains("WATCHDOG WARNING"));
        assert!(s.starts_with("step=0 mode=Running"));
    }
}
