//! Robot gateways
//!
//! The controller talks to the robot through three narrow interfaces:
//! - [`ActuatorGateway`] for walking, turning, gestures and emergency stops
//! - [`SensorGateway`] for the forward distance sensor
//! - [`Announcer`] for fire-and-forget speech
//!
//! Each call maps to a single command on the robot. Gateways never retry and
//! keep no state; callers decide what a failure means.

mod announcer;

use thiserror::Error;

pub use announcer::{BackgroundAnnouncer, LogSpeech, SpeechBackend};

/// Direction of a single motion command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Walk straight ahead
    Forward,
    /// Turn in place to the left
    Left,
    /// Turn in place to the right
    Right,
}

/// A single walking or turning command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    /// Where to move
    pub direction: MoveDirection,
    /// How many steps (one turning step is roughly 30°)
    pub steps: u32,
}

impl MotionCommand {
    /// Walk forward `steps` steps
    pub fn forward(steps: u32) -> Self {
        MotionCommand {
            direction: MoveDirection::Forward,
            steps,
        }
    }

    /// One unit turn in the given direction
    pub fn unit_turn(direction: crate::TurnDirection) -> Self {
        MotionCommand {
            direction: direction.into(),
            steps: 1,
        }
    }
}

impl From<crate::TurnDirection> for MoveDirection {
    fn from(direction: crate::TurnDirection) -> Self {
        match direction {
            crate::TurnDirection::Left => MoveDirection::Left,
            crate::TurnDirection::Right => MoveDirection::Right,
        }
    }
}

/// Result of a distance read as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    /// Measured distance in millimeters
    Millimeters(f32),
    /// The read failed; treated as a clear path
    Unknown,
}

impl DistanceReading {
    /// Whether this reading should stop the robot.
    ///
    /// `Unknown` never does: losing the sensor keeps the patrol going.
    pub fn is_obstacle(&self, threshold_mm: f32) -> bool {
        match self {
            DistanceReading::Millimeters(mm) => *mm <= threshold_mm,
            DistanceReading::Unknown => false,
        }
    }
}

impl std::fmt::Display for DistanceReading {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DistanceReading::Millimeters(mm) => write!(f, "{:.1} mm", mm),
            DistanceReading::Unknown => write!(f, "unknown"),
        }
    }
}

/// Gateway failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The robot answered but refused or failed the command
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The robot could not be reached
    #[error("robot unavailable: {0}")]
    Unavailable(String),

    /// No answer in time
    #[error("command timed out")]
    Timeout,
}

/// Motion and action commands
#[cfg_attr(test, mockall::automock)]
pub trait ActuatorGateway: Send + Sync {
    /// Execute one motion command
    fn execute(&self, command: MotionCommand) -> Result<(), GatewayError>;

    /// Halt every running motion and action
    fn stop_all(&self) -> Result<(), GatewayError>;

    /// Play a named built-in action (e.g. a wave)
    fn play_action(&self, name: &str) -> Result<(), GatewayError>;
}

/// Forward distance sensor
#[cfg_attr(test, mockall::automock)]
pub trait SensorGateway: Send + Sync {
    /// Read the distance to the nearest object ahead, in millimeters
    fn read_distance(&self) -> Result<f32, GatewayError>;
}

/// Speech output that never blocks the caller
#[cfg_attr(test, mockall::automock)]
pub trait Announcer: Send + Sync {
    /// Start speaking `text` and return immediately
    fn say(&self, text: &str);
}

/// Read the sensor, substituting the fail-open sentinel on error
pub fn read_distance(sensor: &dyn SensorGateway) -> DistanceReading {
    match sensor.read_distance() {
        Ok(mm) if mm.is_finite() && mm >= 0.0 => DistanceReading::Millimeters(mm),
        Ok(mm) => {
            log::warn!("Discarding invalid distance reading {}", mm);
            DistanceReading::Unknown
        }
        Err(e) => {
            log::warn!("Distance read failed ({}), assuming clear path", e);
            DistanceReading::Unknown
        }
    }
}
