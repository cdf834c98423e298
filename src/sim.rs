//! Simulated robot
//!
//! Stands in for the real gateways when no robot is attached: it tracks a
//! planar pose, records every command it receives and serves scripted
//! distance readings. The binary runs against it, and so do the integration
//! tests.

use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_6;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use nalgebra::Vector2;

use crate::config::SimulationConfig;
use crate::face::FaceObservation;
use crate::gateway::{ActuatorGateway, GatewayError, MotionCommand, MoveDirection, SensorGateway};
use crate::navigation::Shutdown;

/// Heading change of one unit turn (30°)
pub const UNIT_TURN_RAD: f64 = FRAC_PI_6;

/// A command as received by the simulated robot
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    /// Walk or turn
    Motion(MotionCommand),
    /// Halt everything
    StopAll,
    /// Named action
    Action(String),
}

#[derive(Debug)]
struct SimState {
    position: Vector2<f64>, // mm
    heading: f64,           // rad, counterclockwise from +x
    commands: Vec<RobotCommand>,
    distances: VecDeque<Option<f32>>,
    failing_motions: u32,
}

/// In-memory robot implementing both gateways
#[derive(Debug)]
pub struct SimulatedRobot {
    state: Mutex<SimState>,
    step_length_mm: f64,
    clear_distance_mm: f32,
    latency: Duration,
}

impl SimulatedRobot {
    /// Robot at the origin facing +x
    pub fn new(config: &SimulationConfig) -> Self {
        SimulatedRobot {
            state: Mutex::new(SimState {
                position: Vector2::zeros(),
                heading: 0.0,
                commands: Vec::new(),
                distances: config.distance_script.iter().copied().collect(),
                failing_motions: 0,
            }),
            step_length_mm: config.step_length_mm as f64,
            clear_distance_mm: config.clear_distance_mm,
            latency: Duration::from_millis(config.motion_latency_ms),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue more distance readings (`None` = failed read)
    pub fn push_distances<I: IntoIterator<Item = Option<f32>>>(&self, readings: I) {
        self.lock().distances.extend(readings);
    }

    /// Reject the next `count` motion commands
    pub fn fail_next_motions(&self, count: u32) {
        self.lock().failing_motions = count;
    }

    /// Position in millimeters
    pub fn position(&self) -> Vector2<f64> {
        self.lock().position
    }

    /// Heading in radians, normalized to (-π, π]
    pub fn heading(&self) -> f64 {
        normalize_angle(self.lock().heading)
    }

    /// Every command received so far
    pub fn commands(&self) -> Vec<RobotCommand> {
        self.lock().commands.clone()
    }

    /// Drain the command log
    pub fn take_commands(&self) -> Vec<RobotCommand> {
        std::mem::take(&mut self.lock().commands)
    }
}

impl ActuatorGateway for SimulatedRobot {
    fn execute(&self, command: MotionCommand) -> Result<(), GatewayError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let mut state = self.lock();
        state.commands.push(RobotCommand::Motion(command));
        if state.failing_motions > 0 {
            state.failing_motions -= 1;
            return Err(GatewayError::Rejected("simulated motion fault".into()));
        }

        let steps = command.steps as f64;
        match command.direction {
            MoveDirection::Forward => {
                let dir = Vector2::new(state.heading.cos(), state.heading.sin());
                state.position += dir * steps * self.step_length_mm;
            }
            MoveDirection::Left => state.heading += steps * UNIT_TURN_RAD,
            MoveDirection::Right => state.heading -= steps * UNIT_TURN_RAD,
        }
        debug!(
            "[sim] {:?} x{} -> ({:.0}, {:.0}) @ {:.0}°",
            command.direction,
            command.steps,
            state.position.x,
            state.position.y,
            normalize_angle(state.heading).to_degrees()
        );
        Ok(())
    }

    fn stop_all(&self) -> Result<(), GatewayError> {
        self.lock().commands.push(RobotCommand::StopAll);
        debug!("[sim] stop all");
        Ok(())
    }

    fn play_action(&self, name: &str) -> Result<(), GatewayError> {
        self.lock().commands.push(RobotCommand::Action(name.to_string()));
        info!("[sim] playing action '{}'", name);
        Ok(())
    }
}

impl SensorGateway for SimulatedRobot {
    fn read_distance(&self) -> Result<f32, GatewayError> {
        match self.lock().distances.pop_front() {
            Some(Some(mm)) => Ok(mm),
            Some(None) => Err(GatewayError::Unavailable("simulated sensor fault".into())),
            None => Ok(self.clear_distance_mm),
        }
    }
}

/// Report one visitor every `interval` until shutdown.
///
/// A zero interval disables the simulator and no thread is started.
pub fn spawn_visitor_simulator(
    observations: Sender<FaceObservation>,
    interval: Duration,
    shutdown: Shutdown,
) -> std::io::Result<Option<JoinHandle<()>>> {
    if interval.is_zero() {
        info!("Visitor simulator disabled");
        return Ok(None);
    }
    let handle = thread::Builder::new()
        .name("visitor-sim".into())
        .spawn(move || {
            while shutdown.sleep(interval) {
                if observations.try_send(FaceObservation::faces(1)).is_err() {
                    warn!("Face feed full, visitor dropped");
                }
            }
        })?;
    Ok(Some(handle))
}

fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * std::f64::consts::PI);
    if wrapped > std::f64::consts::PI {
        wrapped - 2.0 * std::f64::consts::PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TurnDirection;

    fn robot() -> SimulatedRobot {
        SimulatedRobot::new(&SimulationConfig::default())
    }

    #[test]
    fn test_forward_then_quarter_turn() {
        let robot = robot();
        robot.execute(MotionCommand::forward(5)).unwrap();
        for _ in 0..3 {
            robot.execute(MotionCommand::unit_turn(TurnDirection::Left)).unwrap();
        }
        robot.execute(MotionCommand::forward(5)).unwrap();

        let position = robot.position();
        assert!((position.x - 100.0).abs() < 1e-6);
        assert!((position.y - 100.0).abs() < 1e-6);
        assert!((robot.heading() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_scripted_distances_then_clear() {
        let robot = robot();
        robot.push_distances([Some(80.0), None]);
        assert_eq!(robot.read_distance(), Ok(80.0));
        assert!(robot.read_distance().is_err());
        assert_eq!(robot.read_distance(), Ok(1000.0));
    }

    #[test]
    fn test_zero_visitor_interval_starts_nothing() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let handle = spawn_visitor_simulator(tx, Duration::ZERO, Shutdown::new()).unwrap();
        assert!(handle.is_none());
        // The sender was dropped with the disabled simulator
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_visitor_simulator_reports_until_shutdown() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let shutdown = Shutdown::new();
        let handle = spawn_visitor_simulator(tx, Duration::from_millis(5), shutdown.clone())
            .unwrap()
            .unwrap();
        let seen = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(seen, FaceObservation::faces(1));

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_injected_failures_leave_pose() {
        let robot = robot();
        robot.fail_next_motions(1);
        assert!(robot.execute(MotionCommand::forward(5)).is_err());
        assert_eq!(robot.position(), Vector2::zeros());
        assert!(robot.execute(MotionCommand::forward(5)).is_ok());
        assert_eq!(robot.commands().len(), 2);
    }
}
