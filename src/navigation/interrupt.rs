//! Face interrupt handling
//!
//! Decides, per face observation, whether to suspend the pattern and greet.
//! The decision and the pause happen atomically in [`NavigationState`]; the
//! greeting itself runs on its own thread so the face delivery thread returns
//! immediately.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use super::state::GreetingRejection;
use super::{MotionExecutor, NavigationState, Shutdown};
use crate::clock::Clock;
use crate::config::GreetingConfig;
use crate::face::{FaceHandler, FaceObservation};
use crate::gateway::Announcer;

/// What the coordinator did with one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// Detection failed; ignored
    Discarded,
    /// No one in view
    NoFaces,
    /// Faces seen but a greeting was not allowed
    Suppressed(GreetingRejection),
    /// A greeting thread was started
    GreetingStarted,
    /// The greeting thread could not be spawned; the pause was lifted
    SpawnFailed,
}

/// Turns face observations into greetings
pub struct InterruptCoordinator {
    state: Arc<NavigationState>,
    motion: MotionExecutor,
    announcer: Arc<dyn Announcer>,
    clock: Arc<dyn Clock>,
    greeting: GreetingConfig,
    phrase: String,
    shutdown: Shutdown,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl InterruptCoordinator {
    /// Create a coordinator sharing `state` with the walker
    pub fn new(
        state: Arc<NavigationState>,
        motion: MotionExecutor,
        announcer: Arc<dyn Announcer>,
        clock: Arc<dyn Clock>,
        greeting: GreetingConfig,
        phrase: String,
        shutdown: Shutdown,
    ) -> Self {
        InterruptCoordinator {
            state,
            motion,
            announcer,
            clock,
            greeting,
            phrase,
            shutdown,
            active: Mutex::new(None),
        }
    }

    /// Handler to register with a face source
    pub fn handler(self: &Arc<Self>) -> FaceHandler {
        let coordinator = Arc::clone(self);
        Arc::new(move |observation| {
            coordinator.handle_observation(observation);
        })
    }

    /// Process one observation
    pub fn handle_observation(self: &Arc<Self>, observation: FaceObservation) -> ObservationOutcome {
        if !observation.success {
            debug!("Face detection failed, observation discarded");
            return ObservationOutcome::Discarded;
        }
        if observation.face_count == 0 {
            return ObservationOutcome::NoFaces;
        }

        if let Err(rejection) = self
            .state
            .try_begin_greeting(self.clock.now(), self.greeting.cooldown())
        {
            match rejection {
                GreetingRejection::AlreadyGreeting => {
                    debug!("Faces seen while greeting, ignored")
                }
                GreetingRejection::Maneuvering => {
                    debug!("Faces seen during a maneuver, ignored")
                }
                GreetingRejection::CoolingDown { remaining } => {
                    debug!("Faces seen, greeting cooldown {:?} remaining", remaining)
                }
            }
            return ObservationOutcome::Suppressed(rejection);
        }

        info!(
            "Face detected ({}), pausing navigation",
            observation.face_count
        );
        let coordinator = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("greeting".into())
            .spawn(move || coordinator.greet());

        match spawned {
            Ok(handle) => {
                let previous = self.lock_active().replace(handle);
                // The previous greeting already cleared the pause, so it is
                // at most finishing its final log line
                if let Some(previous) = previous {
                    if previous.join().is_err() {
                        warn!("Previous greeting thread panicked");
                    }
                }
                ObservationOutcome::GreetingStarted
            }
            Err(e) => {
                error!("Failed to spawn greeting thread: {}", e);
                self.state.force_resume();
                ObservationOutcome::SpawnFailed
            }
        }
    }

    /// Wait for the in-flight greeting, if any
    pub fn join_active(&self) {
        let handle = self.lock_active().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Greeting thread panicked");
            }
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn greet(&self) {
        self.motion.stop_all();
        self.announcer.say(&self.phrase);
        if let Some(gesture) = &self.greeting.gesture {
            self.motion.play_action(gesture);
        }

        if !self.shutdown.sleep(self.greeting.dwell()) {
            info!("Greeting cut short by shutdown");
            self.state.abort_greeting();
            return;
        }

        self.state.finish_greeting(self.clock.now());
        info!("Resuming navigation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::test_support::{Call, CallLog, recording_actuator, recording_announcer};
    use std::time::Duration;

    struct Fixture {
        coordinator: Arc<InterruptCoordinator>,
        state: Arc<NavigationState>,
        clock: Arc<ManualClock>,
        shutdown: Shutdown,
        log: CallLog,
    }

    fn fixture(dwell_ms: u64) -> Fixture {
        let log = CallLog::default();
        let state = Arc::new(NavigationState::new());
        let clock = Arc::new(ManualClock::new());
        let shutdown = Shutdown::new();
        let greeting = GreetingConfig {
            cooldown_ms: 5000,
            dwell_ms,
            gesture: Some("greet_2".into()),
        };
        let coordinator = Arc::new(InterruptCoordinator::new(
            Arc::clone(&state),
            MotionExecutor::new(Arc::new(recording_actuator(&log))),
            Arc::new(recording_announcer(&log)),
            clock.clone(),
            greeting,
            "Hello!".into(),
            shutdown.clone(),
        ));
        Fixture {
            coordinator,
            state,
            clock,
            shutdown,
            log,
        }
    }

    #[test]
    fn test_greeting_sequence() {
        let f = fixture(0);
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::GreetingStarted
        );
        f.coordinator.join_active();

        assert_eq!(
            *f.log.lock().unwrap(),
            vec![
                Call::StopAll,
                Call::Say("Hello!".into()),
                Call::PlayAction("greet_2".into()),
            ]
        );
        let snapshot = f.state.snapshot();
        assert!(!snapshot.paused);
        assert_eq!(snapshot.greetings_completed, 1);
        assert_eq!(snapshot.last_greeting, Some(f.clock.now()));
    }

    #[test]
    fn test_cooldown_suppresses_second_greeting() {
        let f = fixture(0);
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::GreetingStarted
        );
        f.coordinator.join_active();

        f.clock.advance(Duration::from_secs(3));
        assert!(matches!(
            f.coordinator.handle_observation(FaceObservation::faces(2)),
            ObservationOutcome::Suppressed(GreetingRejection::CoolingDown { .. })
        ));
        assert_eq!(f.state.snapshot().greetings_completed, 1);

        f.clock.advance(Duration::from_secs(3));
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::GreetingStarted
        );
        f.coordinator.join_active();
        assert_eq!(f.state.snapshot().greetings_completed, 2);
    }

    #[test]
    fn test_failed_and_empty_observations_change_nothing() {
        let f = fixture(0);
        let before = f.state.snapshot();
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::failed()),
            ObservationOutcome::Discarded
        );
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(0)),
            ObservationOutcome::NoFaces
        );
        assert_eq!(f.state.snapshot(), before);
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_observation_while_paused_is_noop() {
        let f = fixture(60_000);
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::GreetingStarted
        );
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(3)),
            ObservationOutcome::Suppressed(GreetingRejection::AlreadyGreeting)
        );
        // Zero faces does not end the greeting early
        f.coordinator.handle_observation(FaceObservation::faces(0));
        assert!(f.state.is_paused());

        f.shutdown.trigger();
        f.coordinator.join_active();
        let snapshot = f.state.snapshot();
        assert!(!snapshot.paused);
        // Cut short, so neither counted nor stamped
        assert_eq!(snapshot.greetings_completed, 0);
        assert_eq!(snapshot.last_greeting, None);
    }

    #[test]
    fn test_faces_during_maneuver_are_ignored() {
        let f = fixture(0);
        let guard = f.state.try_begin_maneuver().unwrap();
        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::Suppressed(GreetingRejection::Maneuvering)
        );
        assert!(f.log.lock().unwrap().is_empty());
        drop(guard);

        assert_eq!(
            f.coordinator.handle_observation(FaceObservation::faces(1)),
            ObservationOutcome::GreetingStarted
        );
        f.coordinator.join_active();
        assert_eq!(f.state.snapshot().greetings_completed, 1);
    }

    #[test]
    fn test_concurrent_observations_start_one_greeting() {
        let f = fixture(60_000);
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&f.coordinator);
                thread::spawn(move || coordinator.handle_observation(FaceObservation::faces(1)))
            })
            .collect();
        let started = workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(|o| *o == ObservationOutcome::GreetingStarted)
            .count();
        assert_eq!(started, 1);

        f.shutdown.trigger();
        f.coordinator.join_active();
        let stops = f
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == Call::StopAll)
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_handler_routes_to_coordinator() {
        let f = fixture(0);
        let handler = f.coordinator.handler();
        handler(FaceObservation::faces(1));
        f.coordinator.join_active();
        assert_eq!(f.state.snapshot().greetings_completed, 1);
    }
}
