//! Promobot - reactive promotion robot controller
//!
//! Walks a humanoid robot around a fixed square or circle while advertising,
//! steps around anything the forward distance sensor reports, and pauses to
//! greet visitors seen by the face detector.
//!
//! The robot is reached through the traits in [`gateway`] and [`face`];
//! [`sim`] provides an in-memory robot for running without hardware.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod clock;
pub mod config;
pub mod error;
pub mod face;
pub mod gateway;
pub mod navigation;
pub mod sim;

// Re-export commonly used items for easier access
pub use config::{InterruptPolicy, PatternKind, PromoterConfig, TurnDirection};
pub use error::{PromoterError, Result};
pub use face::{ChannelFaceSource, FaceEventSource, FaceObservation};
pub use navigation::{NavigationController, NavigationState, RunSummary, Shutdown};
pub use sim::SimulatedRobot;
