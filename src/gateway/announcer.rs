//! Fire-and-forget speech dispatch
//!
//! Each utterance runs on its own detached thread; nobody joins them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::{Announcer, GatewayError};

/// Blocking text-to-speech call on the robot
pub trait SpeechBackend: Send + Sync + 'static {
    /// Speak `text`, returning once playback finished or failed
    fn speak(&self, text: &str) -> Result<(), GatewayError>;
}

/// Announcer that runs every utterance in the background.
///
/// At most `max_in_flight` utterances run at once. When the limit is reached
/// new ones are dropped, so a stuck speech backend cannot pile up threads.
/// Utterances that finish after the controller shut down only log.
pub struct BackgroundAnnouncer<S: SpeechBackend> {
    backend: Arc<S>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

impl<S: SpeechBackend> BackgroundAnnouncer<S> {
    /// Wrap a blocking speech backend
    pub fn new(backend: S, max_in_flight: usize) -> Self {
        BackgroundAnnouncer {
            backend: Arc::new(backend),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Utterances currently playing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_reserve(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            })
            .is_ok()
    }
}

impl<S: SpeechBackend> Announcer for BackgroundAnnouncer<S> {
    fn say(&self, text: &str) {
        if !self.try_reserve() {
            warn!(
                "Dropping utterance, {} already in flight: '{}'",
                self.max_in_flight, text
            );
            return;
        }

        let backend = Arc::clone(&self.backend);
        let in_flight = Arc::clone(&self.in_flight);
        let spoken = text.to_string();
        let spawned = thread::Builder::new().name("speech".into()).spawn(move || {
            if let Err(e) = backend.speak(&spoken) {
                warn!("Speech failed for '{}': {}", spoken, e);
            }
            in_flight.fetch_sub(1, Ordering::AcqRel);
        });

        match spawned {
            Ok(_) => info!("Speaking (in background): '{}'", text),
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                warn!("Could not spawn speech thread: {}", e);
            }
        }
    }
}

/// Speech backend that only logs, for running without a robot
#[derive(Debug, Clone, Default)]
pub struct LogSpeech {
    /// Simulated playback time
    pub duration: Duration,
}

impl SpeechBackend for LogSpeech {
    fn speak(&self, text: &str) -> Result<(), GatewayError> {
        debug!("[tts] {}", text);
        thread::sleep(self.duration);
        Ok(())
    }
}
