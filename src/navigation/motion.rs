//! Motion command execution
//!
//! Issues motion commands on behalf of the walker, the bypass maneuver and the
//! greeting sequence. Failures are logged and reported as `false`; nothing here
//! retries.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::Shutdown;
use crate::TurnDirection;
use crate::gateway::{ActuatorGateway, MotionCommand};

/// Thin wrapper around the actuator gateway with the skip-and-continue policy
#[derive(Clone)]
pub struct MotionExecutor {
    actuator: Arc<dyn ActuatorGateway>,
}

impl MotionExecutor {
    /// Wrap an actuator gateway
    pub fn new(actuator: Arc<dyn ActuatorGateway>) -> Self {
        MotionExecutor { actuator }
    }

    /// Walk forward. Returns whether the robot reported success.
    pub fn forward(&self, steps: u32) -> bool {
        match self.actuator.execute(MotionCommand::forward(steps)) {
            Ok(()) => {
                debug!("Walked forward {} steps", steps);
                true
            }
            Err(e) => {
                warn!("Move forward {} failed: {}", steps, e);
                false
            }
        }
    }

    /// One ~30° turn
    pub fn unit_turn(&self, direction: TurnDirection) -> bool {
        match self.actuator.execute(MotionCommand::unit_turn(direction)) {
            Ok(()) => {
                debug!("Turned {:?} one unit", direction);
                true
            }
            Err(e) => {
                warn!("Turn {:?} failed: {}", direction, e);
                false
            }
        }
    }

    /// A 90° turn made of `units` unit turns separated by `gap`.
    ///
    /// Every unit is attempted even if an earlier one failed. Returns the
    /// number of units the robot accepted; stops early on shutdown.
    pub fn quarter_turn(
        &self,
        direction: TurnDirection,
        units: u32,
        gap: Duration,
        shutdown: &Shutdown,
    ) -> u32 {
        let mut accepted = 0;
        for i in 0..units {
            if self.unit_turn(direction) {
                accepted += 1;
            }
            if i + 1 < units && !shutdown.sleep(gap) {
                break;
            }
        }
        accepted
    }

    /// Halt everything
    pub fn stop_all(&self) -> bool {
        match self.actuator.stop_all() {
            Ok(()) => true,
            Err(e) => {
                warn!("Stop-all failed: {}", e);
                false
            }
        }
    }

    /// Play a named action
    pub fn play_action(&self, name: &str) -> bool {
        match self.actuator.play_action(name) {
            Ok(()) => {
                debug!("Action '{}' executed", name);
                true
            }
            Err(e) => {
                warn!("Action '{}' failed: {}", name, e);
                false
            }
        }
    }
}
