//! Shared navigation state
//!
//! The walker (main thread) and the interrupt coordinator (face delivery and
//! greeting threads) both go through the one mutex below; no field is ever
//! read or written outside it.
//!
//! Two flags encode interrupt priority. `maneuvering` is held by the walker
//! for a whole obstacle bypass or square corner, and a greeting cannot start
//! while it is set. `paused` is held by a greeting, and a maneuver cannot
//! start while it is set. Each flag is claimed under the lock that checks the
//! other, so the two never overlap.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info};

/// High-level mode, derived from the pause flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Walking the pattern (or bypassing an obstacle)
    Patrolling,
    /// Paused in front of a visitor
    Greeting,
    /// Running a bypass or corner turn that a greeting may not interrupt
    Maneuvering,
}

/// Why a greeting was not started
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GreetingRejection {
    /// Another greeting holds the pause flag
    AlreadyGreeting,
    /// The walker is mid-maneuver; obstacles take priority
    Maneuvering,
    /// The last greeting ended too recently
    CoolingDown {
        /// Time left until a new greeting is allowed
        remaining: Duration,
    },
}

/// Point-in-time copy of the shared state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavigationSnapshot {
    /// A greeting currently holds the pattern
    pub paused: bool,
    /// The walker is running a bypass or corner turn
    pub maneuvering: bool,
    /// End of the most recent greeting
    pub last_greeting: Option<Instant>,
    /// Progress along the current square leg
    pub steps_in_leg: u32,
    /// Legs (square) or turns (circle) completed
    pub legs_completed: u64,
    /// Greetings completed
    pub greetings_completed: u64,
}

impl NavigationSnapshot {
    /// Current mode
    pub fn mode(&self) -> Mode {
        if self.paused {
            Mode::Greeting
        } else if self.maneuvering {
            Mode::Maneuvering
        } else {
            Mode::Patrolling
        }
    }
}

#[derive(Debug, Default)]
struct NavigationInner {
    paused: bool,
    maneuvering: bool,
    last_greeting: Option<Instant>,
    steps_in_leg: u32,
    legs_completed: u64,
    greetings_completed: u64,
}

/// State shared by the walker and the interrupt coordinator
#[derive(Debug, Default)]
pub struct NavigationState {
    inner: Mutex<NavigationInner>,
}

impl NavigationState {
    /// Fresh state: patrolling, no greeting yet, at the start of a leg
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded data is plain values, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, NavigationInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of every field, taken atomically
    pub fn snapshot(&self) -> NavigationSnapshot {
        let inner = self.lock();
        NavigationSnapshot {
            paused: inner.paused,
            maneuvering: inner.maneuvering,
            last_greeting: inner.last_greeting,
            steps_in_leg: inner.steps_in_leg,
            legs_completed: inner.legs_completed,
            greetings_completed: inner.greetings_completed,
        }
    }

    /// Whether a greeting holds the pattern
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Gate checked right before a motion command is issued.
    ///
    /// Reads the pause flag under the same lock [`try_begin_greeting`] sets
    /// it with, so a step is never issued after a greeting has started.
    ///
    /// [`try_begin_greeting`]: NavigationState::try_begin_greeting
    pub fn step_permitted(&self) -> bool {
        !self.lock().paused
    }

    /// Atomically decide whether a greeting may start, and if so pause.
    pub fn try_begin_greeting(
        &self,
        now: Instant,
        cooldown: Duration,
    ) -> Result<(), GreetingRejection> {
        let mut inner = self.lock();
        if inner.paused {
            return Err(GreetingRejection::AlreadyGreeting);
        }
        if inner.maneuvering {
            return Err(GreetingRejection::Maneuvering);
        }
        if let Some(last) = inner.last_greeting {
            let elapsed = now.saturating_duration_since(last);
            if elapsed <= cooldown {
                return Err(GreetingRejection::CoolingDown {
                    remaining: cooldown - elapsed,
                });
            }
        }
        inner.paused = true;
        debug!("Pause flag set");
        Ok(())
    }

    /// End a greeting: stamp the time, then lift the pause.
    ///
    /// Both writes happen in one critical section, timestamp first, so any
    /// observer that sees `paused == false` also sees the new timestamp.
    pub fn finish_greeting(&self, now: Instant) {
        let mut inner = self.lock();
        inner.last_greeting = Some(now);
        inner.greetings_completed += 1;
        inner.paused = false;
        debug!("Pause flag cleared after greeting #{}", inner.greetings_completed);
    }

    /// End a greeting that was cut short: lift the pause without stamping
    /// the time or counting it as completed.
    pub fn abort_greeting(&self) {
        let mut inner = self.lock();
        inner.paused = false;
        debug!("Pause flag cleared, greeting aborted");
    }

    /// Claim the walker for a multi-command maneuver.
    ///
    /// Returns `None` while a greeting holds the pause flag. Greetings are
    /// refused until the returned guard is dropped.
    pub fn try_begin_maneuver(&self) -> Option<ManeuverGuard<'_>> {
        let mut inner = self.lock();
        if inner.paused {
            return None;
        }
        inner.maneuvering = true;
        Some(ManeuverGuard { state: self })
    }

    /// Clear the pause flag unconditionally (teardown). Returns whether it was set.
    pub fn force_resume(&self) -> bool {
        let mut inner = self.lock();
        let was_paused = inner.paused;
        inner.paused = false;
        if was_paused {
            info!("Pause flag forced off");
        }
        was_paused
    }

    /// Add walked steps to the current leg, returning the new total
    pub fn record_steps(&self, steps: u32) -> u32 {
        let mut inner = self.lock();
        inner.steps_in_leg = inner.steps_in_leg.saturating_add(steps);
        inner.steps_in_leg
    }

    /// Progress along the current leg
    pub fn steps_in_leg(&self) -> u32 {
        self.lock().steps_in_leg
    }

    /// Close the current leg: reset progress and count it. Returns the leg count.
    pub fn complete_leg(&self) -> u64 {
        let mut inner = self.lock();
        inner.steps_in_leg = 0;
        inner.legs_completed += 1;
        inner.legs_completed
    }
}

/// Holds the maneuvering flag; releases it on drop
#[derive(Debug)]
pub struct ManeuverGuard<'a> {
    state: &'a NavigationState,
}

impl Drop for ManeuverGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().maneuvering = false;
    }
}
