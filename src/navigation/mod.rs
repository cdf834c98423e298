//! Navigation system
//!
//! The pattern walker, the obstacle bypass, face interrupts and the
//! controller that ties them together. All of them share one
//! [`NavigationState`] and one [`Shutdown`] token.

pub mod bypass;
pub mod controller;
pub mod interrupt;
pub mod motion;
pub mod shutdown;
pub mod state;
pub mod walker;

pub use bypass::{BypassOutcome, BypassPlan, BypassStep, ObstacleBypass};
pub use controller::{NavigationController, RunSummary};
pub use interrupt::{InterruptCoordinator, ObservationOutcome};
pub use motion::MotionExecutor;
pub use shutdown::Shutdown;
pub use state::{GreetingRejection, ManeuverGuard, Mode, NavigationSnapshot, NavigationState};
pub use walker::{PatternWalker, TickOutcome, WalkStats};
