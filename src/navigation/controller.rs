//! Top-level orchestration
//!
//! Wires the walker and the interrupt coordinator to the robot gateways, runs
//! until shutdown, then tears everything down so the robot is left stopped and
//! unpaused.

use std::sync::Arc;

use log::{error, info};

use super::interrupt::InterruptCoordinator;
use super::walker::{PatternWalker, WalkStats};
use super::{MotionExecutor, NavigationState, Shutdown};
use crate::Result;
use crate::clock::{Clock, SystemClock};
use crate::config::PromoterConfig;
use crate::face::FaceEventSource;
use crate::gateway::{ActuatorGateway, Announcer, SensorGateway};

/// What a finished run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Walker counters
    pub walk: WalkStats,
    /// Legs (square) or turns (circle) completed
    pub legs_completed: u64,
    /// Greetings completed
    pub greetings: u64,
    /// Whether the final stop-all was accepted
    pub stopped_cleanly: bool,
}

/// Runs one promotion session
pub struct NavigationController {
    config: PromoterConfig,
    actuator: Arc<dyn ActuatorGateway>,
    sensor: Arc<dyn SensorGateway>,
    announcer: Arc<dyn Announcer>,
    faces: Box<dyn FaceEventSource>,
    clock: Arc<dyn Clock>,
    state: Arc<NavigationState>,
    shutdown: Shutdown,
}

impl NavigationController {
    /// Create a controller that uses the wall clock
    pub fn new(
        config: PromoterConfig,
        actuator: Arc<dyn ActuatorGateway>,
        sensor: Arc<dyn SensorGateway>,
        announcer: Arc<dyn Announcer>,
        faces: Box<dyn FaceEventSource>,
    ) -> Self {
        NavigationController {
            config,
            actuator,
            sensor,
            announcer,
            faces,
            clock: Arc::new(SystemClock),
            state: Arc::new(NavigationState::new()),
            shutdown: Shutdown::new(),
        }
    }

    /// Replace the clock used for greeting cooldowns
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token that ends [`run`](Self::run) when triggered
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Shared navigation state, for monitoring
    pub fn state(&self) -> Arc<NavigationState> {
        Arc::clone(&self.state)
    }

    /// Run until the shutdown handle is triggered.
    ///
    /// Fails only if the face source cannot be started, in which case no
    /// motion has been issued.
    pub fn run(&mut self) -> Result<RunSummary> {
        let motion = MotionExecutor::new(Arc::clone(&self.actuator));

        let coordinator = if self.config.interrupts.greets_faces() {
            let coordinator = Arc::new(InterruptCoordinator::new(
                Arc::clone(&self.state),
                motion.clone(),
                Arc::clone(&self.announcer),
                Arc::clone(&self.clock),
                self.config.greeting.clone(),
                self.config.phrases.greeting.clone(),
                self.shutdown.clone(),
            ));
            self.faces.register_handler(coordinator.handler());
            self.faces.start()?;
            Some(coordinator)
        } else {
            info!("Face interrupts disabled");
            None
        };

        info!("Starting promotion");
        self.announcer.say(&self.config.phrases.promotion);

        let mut walker = PatternWalker::new(
            &self.config,
            motion.clone(),
            Arc::clone(&self.sensor),
            Arc::clone(&self.announcer),
            Arc::clone(&self.state),
            self.shutdown.clone(),
        );
        let walk = walker.run();

        // Teardown
        info!("Shutting down");
        self.shutdown.trigger();
        if let Some(coordinator) = &coordinator {
            self.faces.stop();
            coordinator.join_active();
        }
        self.state.force_resume();
        let stopped_cleanly = motion.stop_all();
        if !stopped_cleanly {
            error!("Final stop-all failed; robot may still be moving");
        }

        let snapshot = self.state.snapshot();
        Ok(RunSummary {
            walk,
            legs_completed: snapshot.legs_completed,
            greetings: snapshot.greetings_completed,
            stopped_cleanly,
        })
    }
}
