//! Pattern walker
//!
//! Advances the square or circle pattern one tick at a time. Every tick
//! starts by honouring the pause flag, and every forward step is preceded by
//! a distance read: an obstacle at or below the threshold triggers the bypass
//! maneuver instead of the step.
//!
//! Bypasses and square corners run under a maneuver guard from
//! [`NavigationState::try_begin_maneuver`]: no greeting can start until they
//! finish, and they do not start while a greeting holds the pause.

use std::sync::Arc;

use log::{debug, info, warn};

use super::bypass::{BypassOutcome, ObstacleBypass};
use super::{MotionExecutor, NavigationState, Shutdown};
use crate::config::{PatternKind, PromoterConfig, TurnDirection, WalkerConfig};
use crate::gateway::{self, Announcer, DistanceReading, SensorGateway};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// A greeting holds the pattern; nothing was issued
    Paused,
    /// The path was blocked and the bypass ran instead of a step
    ObstacleBypassed {
        /// Reading that triggered the bypass
        reading: DistanceReading,
        /// Whether the maneuver ran to the end
        outcome: BypassOutcome,
    },
    /// A forward step succeeded (square: with the leg progress so far)
    Stepped {
        /// Progress along the current leg after the step
        steps_in_leg: u32,
    },
    /// The robot refused the forward step; progress unchanged
    StepFailed,
    /// A square corner was turned and a new leg begins
    LegCompleted {
        /// Legs completed so far
        legs: u64,
    },
    /// A circle stride and turn completed
    Turned {
        /// Turns completed so far
        turns: u64,
    },
    /// The robot refused the circle turn; the turn is not counted
    TurnFailed,
    /// Shutdown was requested
    Cancelled,
}

/// Counters for a whole walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Ticks executed
    pub ticks: u64,
    /// Successful forward steps
    pub steps: u64,
    /// Forward steps the robot refused
    pub failed_steps: u64,
    /// Bypass maneuvers started
    pub bypasses: u64,
    /// Ticks spent waiting on a greeting
    pub paused_ticks: u64,
}

/// Walks one pattern until shutdown
pub struct PatternWalker {
    pattern: PatternKind,
    direction: TurnDirection,
    config: WalkerConfig,
    promotion: String,
    motion: MotionExecutor,
    sensor: Arc<dyn SensorGateway>,
    announcer: Arc<dyn Announcer>,
    bypass: ObstacleBypass,
    state: Arc<NavigationState>,
    shutdown: Shutdown,
    stats: WalkStats,
}

impl PatternWalker {
    /// Build a walker for the pattern and direction in `config`
    pub fn new(
        config: &PromoterConfig,
        motion: MotionExecutor,
        sensor: Arc<dyn SensorGateway>,
        announcer: Arc<dyn Announcer>,
        state: Arc<NavigationState>,
        shutdown: Shutdown,
    ) -> Self {
        let bypass = ObstacleBypass::new(
            motion.clone(),
            Arc::clone(&announcer),
            config.phrases.clone(),
            config.bypass.forward_steps,
            config.walker.unit_turns_per_quarter,
            config.walker.turn_gap(),
            shutdown.clone(),
        );
        PatternWalker {
            pattern: config.pattern,
            direction: config.direction,
            config: config.walker.clone(),
            promotion: config.phrases.promotion.clone(),
            motion,
            sensor,
            announcer,
            bypass,
            state,
            shutdown,
            stats: WalkStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Walk until shutdown is triggered
    pub fn run(&mut self) -> WalkStats {
        info!(
            "Walking pattern {:?}, turning {:?}",
            self.pattern, self.direction
        );
        loop {
            if self.tick() == TickOutcome::Cancelled {
                break;
            }
        }
        info!("Pattern walker stopped after {} ticks", self.stats.ticks);
        self.stats
    }

    /// Advance the pattern by one tick
    pub fn tick(&mut self) -> TickOutcome {
        if self.shutdown.is_triggered() {
            return TickOutcome::Cancelled;
        }
        self.stats.ticks += 1;

        if self.state.is_paused() {
            self.stats.paused_ticks += 1;
            self.shutdown.sleep(self.config.pause_poll());
            return TickOutcome::Paused;
        }

        let outcome = match self.pattern {
            PatternKind::Square => self.square_tick(),
            PatternKind::Circle => self.circle_tick(),
        };
        debug!("Tick {}: {:?}", self.stats.ticks, outcome);
        outcome
    }

    fn square_tick(&mut self) -> TickOutcome {
        // A finished leg turns its corner on its own tick, after the pause check
        if self.state.steps_in_leg() >= self.config.square_leg_length {
            return self.turn_corner();
        }

        if let Some(outcome) = self.check_path() {
            return outcome;
        }
        if !self.state.step_permitted() {
            return TickOutcome::Paused;
        }

        let step = self.config.forward_step;
        if !self.motion.forward(step) {
            self.stats.failed_steps += 1;
            self.shutdown.sleep(self.config.step_pause());
            return TickOutcome::StepFailed;
        }
        self.stats.steps += 1;
        let steps_in_leg = self.state.record_steps(step);
        self.shutdown.sleep(self.config.step_pause());
        TickOutcome::Stepped { steps_in_leg }
    }

    fn turn_corner(&mut self) -> TickOutcome {
        let Some(maneuver) = self.state.try_begin_maneuver() else {
            return TickOutcome::Paused;
        };
        let units = self.config.unit_turns_per_quarter;
        let accepted =
            self.motion
                .quarter_turn(self.direction, units, self.config.turn_gap(), &self.shutdown);
        if accepted < units {
            warn!("Corner turn incomplete: {}/{} units", accepted, units);
        }

        let legs = self.state.complete_leg();
        drop(maneuver);
        info!("Side {} complete, turned 90° {:?}", legs, self.direction);
        if legs % self.config.square_announce_every_legs == 0 {
            self.announcer.say(&self.promotion);
        }
        self.shutdown.sleep(self.config.leg_pause());
        TickOutcome::LegCompleted { legs }
    }

    fn circle_tick(&mut self) -> TickOutcome {
        if let Some(outcome) = self.check_path() {
            return outcome;
        }
        if !self.state.step_permitted() {
            return TickOutcome::Paused;
        }

        if !self.motion.forward(self.config.forward_step) {
            self.stats.failed_steps += 1;
            self.shutdown.sleep(self.config.step_pause());
            return TickOutcome::StepFailed;
        }
        self.stats.steps += 1;
        self.shutdown.sleep(self.config.step_pause());

        if !self.motion.unit_turn(self.direction) {
            self.shutdown.sleep(self.config.step_pause());
            return TickOutcome::TurnFailed;
        }
        let turns = self.state.complete_leg();
        if turns % self.config.circle_announce_every_turns == 0 {
            self.announcer.say(&self.promotion);
        }
        self.shutdown.sleep(self.config.step_pause());
        TickOutcome::Turned { turns }
    }

    /// Read the sensor and bypass if blocked. `None` means the path is clear.
    fn check_path(&mut self) -> Option<TickOutcome> {
        let reading = gateway::read_distance(self.sensor.as_ref());
        if !reading.is_obstacle(self.config.obstacle_threshold_mm) {
            return None;
        }

        let Some(_maneuver) = self.state.try_begin_maneuver() else {
            debug!("Obstacle at {} while greeting, bypass deferred", reading);
            return Some(TickOutcome::Paused);
        };
        warn!("Obstacle detected at {}! Stopping and bypassing", reading);
        self.stats.bypasses += 1;
        let outcome = self.bypass.execute(self.pattern);
        Some(TickOutcome::ObstacleBypassed { reading, outcome })
    }
}
