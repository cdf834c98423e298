//! Obstacle bypass maneuver
//!
//! A fixed, open-loop detour around whatever tripped the distance sensor:
//!
//! ```text
//!          ┌──────────────┐
//!          │              │
//!   ───────┘   obstacle   └───────▶
//! ```
//!
//! Left 90°, out, right 90°, past, right 90°, back in, left 90°. The two left
//! and two right quarter turns cancel, so the robot leaves facing its original
//! heading, shifted sideways by one bypass run.
//!
//! The distance sensor is not consulted during the maneuver. A second
//! obstacle met mid-bypass is not detected.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::{MotionExecutor, Shutdown};
use crate::config::{PatternKind, Phrases};
use crate::gateway::Announcer;
use crate::TurnDirection;

/// Which phrase an announce step speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassPhrase {
    /// Bypass starting
    Obstacle,
    /// Bypass done
    Resuming,
}

/// One step of the maneuver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassStep {
    /// Halt all motion
    StopAll,
    /// Speak a phrase in the background
    Announce(BypassPhrase),
    /// Turn 90°
    QuarterTurn(TurnDirection),
    /// Walk straight
    Forward(u32),
}

/// The ordered steps of one bypass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassPlan {
    steps: Vec<BypassStep>,
}

impl BypassPlan {
    /// Build the maneuver for a pattern.
    ///
    /// The square variant walks the far side as two runs, the circle variant
    /// as one double-length run. Both cover the same ground.
    pub fn for_pattern(pattern: PatternKind, run: u32) -> Self {
        use BypassStep::*;
        use TurnDirection::{Left, Right};

        let mut steps = vec![
            StopAll,
            Announce(BypassPhrase::Obstacle),
            QuarterTurn(Left),
            Forward(run),
            QuarterTurn(Right),
        ];
        match pattern {
            PatternKind::Square => steps.extend([Forward(run), Forward(run)]),
            PatternKind::Circle => steps.push(Forward(run.saturating_mul(2))),
        }
        steps.extend([
            QuarterTurn(Right),
            Forward(run),
            QuarterTurn(Left),
            Announce(BypassPhrase::Resuming),
        ]);
        BypassPlan { steps }
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[BypassStep] {
        &self.steps
    }

    /// Net heading change in quarter turns (left positive)
    pub fn net_quarter_turns(&self) -> i32 {
        self.steps
            .iter()
            .map(|step| match step {
                BypassStep::QuarterTurn(TurnDirection::Left) => 1,
                BypassStep::QuarterTurn(TurnDirection::Right) => -1,
                _ => 0,
            })
            .sum()
    }

    /// Total forward steps walked
    pub fn forward_steps(&self) -> u32 {
        self.steps
            .iter()
            .map(|step| match step {
                BypassStep::Forward(n) => *n,
                _ => 0,
            })
            .fold(0u32, u32::saturating_add)
    }
}

/// How a bypass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassOutcome {
    /// Every step ran (individual commands may still have failed)
    Completed,
    /// Shutdown arrived mid-maneuver; remaining steps were skipped
    Aborted,
}

/// Runs [`BypassPlan`]s against the robot
pub struct ObstacleBypass {
    motion: MotionExecutor,
    announcer: Arc<dyn Announcer>,
    phrases: Phrases,
    run: u32,
    unit_turns_per_quarter: u32,
    turn_gap: Duration,
    shutdown: Shutdown,
}

impl ObstacleBypass {
    /// Create a bypass executor
    pub fn new(
        motion: MotionExecutor,
        announcer: Arc<dyn Announcer>,
        phrases: Phrases,
        run: u32,
        unit_turns_per_quarter: u32,
        turn_gap: Duration,
        shutdown: Shutdown,
    ) -> Self {
        ObstacleBypass {
            motion,
            announcer,
            phrases,
            run,
            unit_turns_per_quarter,
            turn_gap,
            shutdown,
        }
    }

    /// Plan for the given pattern with the configured run length
    pub fn plan(&self, pattern: PatternKind) -> BypassPlan {
        BypassPlan::for_pattern(pattern, self.run)
    }

    /// Run the full maneuver
    pub fn execute(&self, pattern: PatternKind) -> BypassOutcome {
        info!("Initiating obstacle bypass");
        for step in self.plan(pattern).steps() {
            if self.shutdown.is_triggered() {
                warn!("Bypass aborted by shutdown at {:?}", step);
                return BypassOutcome::Aborted;
            }
            match *step {
                BypassStep::StopAll => {
                    self.motion.stop_all();
                }
                BypassStep::Announce(BypassPhrase::Obstacle) => {
                    self.announcer.say(&self.phrases.obstacle)
                }
                BypassStep::Announce(BypassPhrase::Resuming) => {
                    self.announcer.say(&self.phrases.resuming)
                }
                BypassStep::QuarterTurn(direction) => {
                    let accepted = self.motion.quarter_turn(
                        direction,
                        self.unit_turns_per_quarter,
                        self.turn_gap,
                        &self.shutdown,
                    );
                    if accepted < self.unit_turns_per_quarter {
                        warn!(
                            "Bypass turn {:?} incomplete: {}/{} units",
                            direction, accepted, self.unit_turns_per_quarter
                        );
                    }
                }
                BypassStep::Forward(steps) => {
                    self.motion.forward(steps);
                }
            }
        }
        info!("Obstacle bypassed, resuming pattern");
        BypassOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::{
        Call, CallLog, forward, recording_actuator, recording_actuator_with,
        recording_announcer, turn,
    };
    use crate::gateway::{GatewayError, MockActuatorGateway, MockAnnouncer};
    use rstest::rstest;

    #[rstest]
    #[case(PatternKind::Square)]
    #[case(PatternKind::Circle)]
    fn test_net_turn_is_zero(#[case] pattern: PatternKind) {
        let plan = BypassPlan::for_pattern(pattern, 7);
        assert_eq!(plan.net_quarter_turns(), 0);
        assert_eq!(plan.forward_steps(), 28);
        assert_eq!(plan.steps()[0], BypassStep::StopAll);
        assert_eq!(
            plan.steps().last(),
            Some(&BypassStep::Announce(BypassPhrase::Resuming))
        );
    }

    #[test]
    fn test_oversized_run_saturates() {
        let plan = BypassPlan::for_pattern(PatternKind::Circle, u32::MAX);
        assert!(plan.steps().contains(&BypassStep::Forward(u32::MAX)));
    }

    #[test]
    fn test_circle_variant_doubles_far_side() {
        let plan = BypassPlan::for_pattern(PatternKind::Circle, 7);
        assert!(plan.steps().contains(&BypassStep::Forward(14)));
        let square = BypassPlan::for_pattern(PatternKind::Square, 7);
        assert!(!square.steps().contains(&BypassStep::Forward(14)));
        assert_eq!(square.steps().len(), plan.steps().len() + 1);
    }

    fn bypass(actuator: MockActuatorGateway, announcer: MockAnnouncer) -> ObstacleBypass {
        ObstacleBypass::new(
            MotionExecutor::new(Arc::new(actuator)),
            Arc::new(announcer),
            Phrases::default(),
            7,
            3,
            Duration::ZERO,
            Shutdown::new(),
        )
    }

    fn quarter(direction: TurnDirection) -> Vec<Call> {
        vec![turn(direction); 3]
    }

    #[test]
    fn test_square_bypass_command_order() {
        let log = CallLog::default();
        let outcome = bypass(recording_actuator(&log), recording_announcer(&log))
            .execute(PatternKind::Square);
        assert_eq!(outcome, BypassOutcome::Completed);

        let phrases = Phrases::default();
        let mut expected = vec![Call::StopAll, Call::Say(phrases.obstacle)];
        expected.extend(quarter(TurnDirection::Left));
        expected.push(forward(7));
        expected.extend(quarter(TurnDirection::Right));
        expected.extend([forward(7), forward(7)]);
        expected.extend(quarter(TurnDirection::Right));
        expected.push(forward(7));
        expected.extend(quarter(TurnDirection::Left));
        expected.push(Call::Say(phrases.resuming));
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn test_failed_commands_do_not_abort_maneuver() {
        let log = CallLog::default();
        let actuator = recording_actuator_with(&log, |_| {
            Err(GatewayError::Rejected("fallen over".into()))
        });
        let outcome = bypass(actuator, recording_announcer(&log)).execute(PatternKind::Circle);
        assert_eq!(outcome, BypassOutcome::Completed);

        let calls = log.lock().unwrap();
        let motions = calls
            .iter()
            .filter(|c| matches!(c, Call::Execute(_)))
            .count();
        // 4 quarter turns of 3 units plus 3 straight runs
        assert_eq!(motions, 15);
        assert!(calls.contains(&forward(14)));
    }

    #[test]
    fn test_shutdown_aborts_before_first_step() {
        let mut actuator = MockActuatorGateway::new();
        actuator.expect_stop_all().never();
        actuator.expect_execute().never();
        let announcer = MockAnnouncer::new();

        let bypass = bypass(actuator, announcer);
        bypass.shutdown.trigger();
        assert_eq!(bypass.execute(PatternKind::Square), BypassOutcome::Aborted);
    }
}
