//! Configuration loading for Promobot
//!
//! Everything is read from a single YAML document. Every field carries a
//! default, so an empty file (or no file at all) yields the values the robot
//! was hand-tuned with: 5-step strides, 20-step square legs, a 150 mm
//! obstacle threshold and a 5 s greeting cooldown.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PromoterError, Result};

/// Longest bypass run accepted from configuration
pub const MAX_BYPASS_STEPS: u32 = 1000;

/// Walking pattern, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Straight legs joined by 90° corners
    Square,
    /// One stride followed by one ~30° turn, forever
    Circle,
}

/// Direction of every pattern turn, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    /// Counterclockwise
    Left,
    /// Clockwise
    Right,
}

/// Which interrupts may suspend the pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptPolicy {
    /// Only the distance sensor interrupts the walk
    ObstacleOnly,
    /// Obstacles first, then visitor greetings
    ObstacleAndFace,
}

impl InterruptPolicy {
    /// Whether the face event source should be started
    pub fn greets_faces(self) -> bool {
        matches!(self, InterruptPolicy::ObstacleAndFace)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterConfig {
    /// Walking pattern
    #[serde(default = "default_pattern")]
    pub pattern: PatternKind,
    /// Turn direction of the pattern
    #[serde(default = "default_direction")]
    pub direction: TurnDirection,
    /// Active interrupts
    #[serde(default = "default_interrupts")]
    pub interrupts: InterruptPolicy,
    /// Pattern walker tuning
    #[serde(default)]
    pub walker: WalkerConfig,
    /// Obstacle bypass tuning
    #[serde(default)]
    pub bypass: BypassConfig,
    /// Greeting interrupt tuning
    #[serde(default)]
    pub greeting: GreetingConfig,
    /// Spoken phrases
    #[serde(default)]
    pub phrases: Phrases,
    /// Speech dispatch limits
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Simulated robot used by the binary
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Pattern walker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Readings at or below this distance count as an obstacle (mm)
    #[serde(default = "default_obstacle_threshold_mm")]
    pub obstacle_threshold_mm: f32,

    /// Steps per forward command
    #[serde(default = "default_forward_step")]
    pub forward_step: u32,

    /// Steps walked before a square corner
    #[serde(default = "default_square_leg_length")]
    pub square_leg_length: u32,

    /// Unit turns that make up a 90° corner (each unit is ~30°)
    #[serde(default = "default_unit_turns_per_quarter")]
    pub unit_turns_per_quarter: u32,

    /// Pause after each forward step and circle turn (ms)
    #[serde(default = "default_step_pause_ms")]
    pub step_pause_ms: u64,

    /// Pause between the unit turns of a corner (ms)
    #[serde(default = "default_turn_gap_ms")]
    pub turn_gap_ms: u64,

    /// Pause after a square corner (ms)
    #[serde(default = "default_leg_pause_ms")]
    pub leg_pause_ms: u64,

    /// Poll interval while a greeting holds the pattern (ms)
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// Promotion phrase cadence on the square, in legs
    #[serde(default = "default_square_announce_every_legs")]
    pub square_announce_every_legs: u64,

    /// Promotion phrase cadence on the circle, in turns
    #[serde(default = "default_circle_announce_every_turns")]
    pub circle_announce_every_turns: u64,
}

/// Obstacle bypass parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BypassConfig {
    /// Steps of each straight run of the maneuver
    #[serde(default = "default_bypass_steps")]
    pub forward_steps: u32,
}

/// Greeting interrupt parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingConfig {
    /// Minimum time between two greetings (ms)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// How long the robot stays paused after greeting (ms)
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Physical gesture played during the greeting, if any
    #[serde(default = "default_gesture")]
    pub gesture: Option<String>,
}

/// Spoken phrases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrases {
    /// Promotion phrase spoken at start and on the pattern cadence
    #[serde(default = "default_promotion")]
    pub promotion: String,
    /// Spoken when a bypass starts
    #[serde(default = "default_obstacle")]
    pub obstacle: String,
    /// Spoken when a bypass completes
    #[serde(default = "default_resuming")]
    pub resuming: String,
    /// Spoken to a detected visitor
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

/// Speech dispatch parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Utterances allowed in flight at once; extra ones are dropped
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

/// Simulated robot parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Distance covered by one walking step (mm)
    #[serde(default = "default_step_length_mm")]
    pub step_length_mm: f32,

    /// Distance reported when nothing is scripted (mm)
    #[serde(default = "default_clear_distance_mm")]
    pub clear_distance_mm: f32,

    /// Scripted distance readings, served before the clear distance.
    /// A `null` entry simulates a failed read.
    #[serde(default)]
    pub distance_script: Vec<Option<f32>>,

    /// Interval between simulated visitor sightings (ms), 0 disables them
    #[serde(default = "default_visitor_interval_ms")]
    pub visitor_interval_ms: u64,

    /// Simulated duration of a motion command (ms)
    #[serde(default = "default_motion_latency_ms")]
    pub motion_latency_ms: u64,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            direction: default_direction(),
            interrupts: default_interrupts(),
            walker: WalkerConfig::default(),
            bypass: BypassConfig::default(),
            greeting: GreetingConfig::default(),
            phrases: Phrases::default(),
            speech: SpeechConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            obstacle_threshold_mm: default_obstacle_threshold_mm(),
            forward_step: default_forward_step(),
            square_leg_length: default_square_leg_length(),
            unit_turns_per_quarter: default_unit_turns_per_quarter(),
            step_pause_ms: default_step_pause_ms(),
            turn_gap_ms: default_turn_gap_ms(),
            leg_pause_ms: default_leg_pause_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            square_announce_every_legs: default_square_announce_every_legs(),
            circle_announce_every_turns: default_circle_announce_every_turns(),
        }
    }
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            forward_steps: default_bypass_steps(),
        }
    }
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            dwell_ms: default_dwell_ms(),
            gesture: default_gesture(),
        }
    }
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            promotion: default_promotion(),
            obstacle: default_obstacle(),
            resuming: default_resuming(),
            greeting: default_greeting(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_length_mm: default_step_length_mm(),
            clear_distance_mm: default_clear_distance_mm(),
            distance_script: Vec::new(),
            visitor_interval_ms: default_visitor_interval_ms(),
            motion_latency_ms: default_motion_latency_ms(),
        }
    }
}

// Default value functions
fn default_pattern() -> PatternKind {
    PatternKind::Square
}
fn default_direction() -> TurnDirection {
    TurnDirection::Left
}
fn default_interrupts() -> InterruptPolicy {
    InterruptPolicy::ObstacleAndFace
}
fn default_obstacle_threshold_mm() -> f32 {
    150.0
}
fn default_forward_step() -> u32 {
    5
}
fn default_square_leg_length() -> u32 {
    20
}
fn default_unit_turns_per_quarter() -> u32 {
    3
}
fn default_step_pause_ms() -> u64 {
    300
}
fn default_turn_gap_ms() -> u64 {
    100
}
fn default_leg_pause_ms() -> u64 {
    600
}
fn default_pause_poll_ms() -> u64 {
    500
}
fn default_square_announce_every_legs() -> u64 {
    4
}
fn default_circle_announce_every_turns() -> u64 {
    2
}
fn default_bypass_steps() -> u32 {
    7
}
fn default_cooldown_ms() -> u64 {
    5_000
}
fn default_dwell_ms() -> u64 {
    8_000
}
fn default_gesture() -> Option<String> {
    Some("greet_2".to_string())
}
fn default_promotion() -> String {
    "Welcome to PSB academy, I am robot promoter. Nice to meet you!".to_string()
}
fn default_obstacle() -> String {
    "I'm fine, just need to avoid an obstacle".to_string()
}
fn default_resuming() -> String {
    "Resuming promoting".to_string()
}
fn default_greeting() -> String {
    "Hi, how are you? If you have any questions, scan the QR code".to_string()
}
fn default_max_in_flight() -> usize {
    4
}
fn default_step_length_mm() -> f32 {
    20.0
}
fn default_clear_distance_mm() -> f32 {
    1000.0
}
fn default_visitor_interval_ms() -> u64 {
    20_000
}
fn default_motion_latency_ms() -> u64 {
    0
}

impl PromoterConfig {
    /// Load and validate configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: PromoterConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        let walker = &self.walker;
        if walker.obstacle_threshold_mm <= 0.0 || !walker.obstacle_threshold_mm.is_finite() {
            return Err(PromoterError::Config(format!(
                "obstacle_threshold_mm must be positive, got {}",
                walker.obstacle_threshold_mm
            )));
        }
        if walker.forward_step == 0 {
            return Err(PromoterError::Config("forward_step must be at least 1".into()));
        }
        if walker.square_leg_length == 0 {
            return Err(PromoterError::Config(
                "square_leg_length must be at least 1".into(),
            ));
        }
        if walker.unit_turns_per_quarter == 0 {
            return Err(PromoterError::Config(
                "unit_turns_per_quarter must be at least 1".into(),
            ));
        }
        if walker.square_announce_every_legs == 0 || walker.circle_announce_every_turns == 0 {
            return Err(PromoterError::Config(
                "announcement cadence must be at least 1".into(),
            ));
        }
        if !(1..=MAX_BYPASS_STEPS).contains(&self.bypass.forward_steps) {
            return Err(PromoterError::Config(format!(
                "bypass forward_steps must be within 1..={}, got {}",
                MAX_BYPASS_STEPS, self.bypass.forward_steps
            )));
        }
        if !(1_000..=60_000).contains(&self.greeting.cooldown_ms) {
            return Err(PromoterError::Config(format!(
                "greeting cooldown_ms must be within 1000..=60000, got {}",
                self.greeting.cooldown_ms
            )));
        }
        if self.speech.max_in_flight == 0 {
            return Err(PromoterError::Config(
                "speech max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl WalkerConfig {
    /// Pause after each forward step
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    /// Pause between unit turns
    pub fn turn_gap(&self) -> Duration {
        Duration::from_millis(self.turn_gap_ms)
    }

    /// Pause after a square corner
    pub fn leg_pause(&self) -> Duration {
        Duration::from_millis(self.leg_pause_ms)
    }

    /// Poll interval while paused
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

impl GreetingConfig {
    /// Minimum time between greetings
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Time spent paused in front of a visitor
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_match_tuned_robot() {
        let config = PromoterConfig::default();
        assert_eq!(config.pattern, PatternKind::Square);
        assert_eq!(config.walker.obstacle_threshold_mm, 150.0);
        assert_eq!(config.walker.forward_step, 5);
        assert_eq!(config.walker.square_leg_length, 20);
        assert_eq!(config.greeting.cooldown(), Duration::from_secs(5));
        assert_eq!(config.greeting.gesture.as_deref(), Some("greet_2"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
pattern: circle
direction: right
interrupts: obstacle_only
greeting:
  cooldown_ms: 8000
simulation:
  distance_script: [1000.0, null, 80.0]
"#;
        let config = PromoterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.pattern, PatternKind::Circle);
        assert_eq!(config.direction, TurnDirection::Right);
        assert!(!config.interrupts.greets_faces());
        assert_eq!(config.greeting.cooldown_ms, 8000);
        assert_eq!(config.greeting.dwell_ms, 8000);
        assert_eq!(config.walker.pause_poll(), Duration::from_millis(500));
        assert_eq!(
            config.simulation.distance_script,
            vec![Some(1000.0), None, Some(80.0)]
        );
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = PromoterConfig::from_yaml("{}").unwrap();
        assert_eq!(config.bypass.forward_steps, 7);
        assert_eq!(config.interrupts, InterruptPolicy::ObstacleAndFace);
    }

    #[rstest]
    #[case("walker: { forward_step: 0 }")]
    #[case("walker: { square_leg_length: 0 }")]
    #[case("walker: { obstacle_threshold_mm: 0.0 }")]
    #[case("walker: { unit_turns_per_quarter: 0 }")]
    #[case("bypass: { forward_steps: 0 }")]
    #[case("bypass: { forward_steps: 1001 }")]
    #[case("bypass: { forward_steps: 4294967295 }")]
    #[case("greeting: { cooldown_ms: 500 }")]
    #[case("greeting: { cooldown_ms: 120000 }")]
    #[case("speech: { max_in_flight: 0 }")]
    fn test_invalid_values_are_rejected(#[case] yaml: &str) {
        let result = PromoterConfig::from_yaml(yaml);
        assert!(matches!(result, Err(PromoterError::Config(_))));
    }

    #[test]
    fn test_unknown_pattern_is_a_yaml_error() {
        let result = PromoterConfig::from_yaml("pattern: triangle");
        assert!(matches!(result, Err(PromoterError::Yaml(_))));
    }
}
