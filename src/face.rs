//! Face event source
//!
//! The camera pipeline reports how many faces it currently sees. Those
//! observations arrive on their own thread at whatever rate the camera runs,
//! and are handed to a single registered handler.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, info, warn};
use thiserror::Error;

/// One face-count report from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceObservation {
    /// Faces currently in view
    pub face_count: u32,
    /// Whether detection ran successfully for this frame
    pub success: bool,
}

impl FaceObservation {
    /// A successful observation of `face_count` faces
    pub fn faces(face_count: u32) -> Self {
        FaceObservation {
            face_count,
            success: true,
        }
    }

    /// A failed detection
    pub fn failed() -> Self {
        FaceObservation {
            face_count: 0,
            success: false,
        }
    }
}

/// Callback invoked for every observation, on the source's thread
pub type FaceHandler = Arc<dyn Fn(FaceObservation) + Send + Sync>;

/// Face source failures
#[derive(Error, Debug)]
pub enum FaceSourceError {
    /// `start` was called before a handler was registered
    #[error("no handler registered")]
    NoHandler,

    /// `start` was called twice
    #[error("face source already running")]
    AlreadyRunning,

    /// The delivery thread could not be spawned
    #[error("failed to spawn delivery thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Asynchronous source of face observations
pub trait FaceEventSource: Send {
    /// Set the callback that receives observations
    fn register_handler(&mut self, handler: FaceHandler);

    /// Begin delivering observations
    fn start(&mut self) -> Result<(), FaceSourceError>;

    /// Stop delivering; no handler call starts after this returns
    fn stop(&mut self);
}

/// Face source fed from a channel, e.g. by a camera thread or a test.
///
/// Delivery runs on a dedicated `face-events` thread that exits when
/// [`FaceEventSource::stop`] is called or every sender is dropped.
pub struct ChannelFaceSource {
    observations: Receiver<FaceObservation>,
    handler: Option<FaceHandler>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ChannelFaceSource {
    /// Create a source reading from `observations`
    pub fn new(observations: Receiver<FaceObservation>) -> Self {
        ChannelFaceSource {
            observations,
            handler: None,
            stop_tx: None,
            worker: None,
        }
    }

    /// Create a source together with the sender that feeds it
    pub fn channel(capacity: usize) -> (Sender<FaceObservation>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(rx))
    }

    /// Whether the delivery thread is running
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl FaceEventSource for ChannelFaceSource {
    fn register_handler(&mut self, handler: FaceHandler) {
        self.handler = Some(handler);
    }

    fn start(&mut self) -> Result<(), FaceSourceError> {
        if self.worker.is_some() {
            return Err(FaceSourceError::AlreadyRunning);
        }
        let handler = self.handler.clone().ok_or(FaceSourceError::NoHandler)?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let observations = self.observations.clone();
        let worker = thread::Builder::new()
            .name("face-events".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(observations) -> msg => match msg {
                            Ok(observation) => {
                                debug!("Face observation: {:?}", observation);
                                handler(observation);
                            }
                            Err(_) => {
                                warn!("Face observation feed closed");
                                break;
                            }
                        },
                    }
                }
                debug!("Face delivery thread exiting");
            })?;

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        info!("Face detection observer started");
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects stop_rx, which wakes the select
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Face delivery thread panicked");
            }
            info!("Face detection observer stopped");
        }
    }
}

impl Drop for ChannelFaceSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn recording_handler() -> (FaceHandler, Arc<Mutex<Vec<FaceObservation>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: FaceHandler = Arc::new(move |obs| sink.lock().unwrap().push(obs));
        (handler, seen)
    }

    fn wait_for_len(seen: &Mutex<Vec<FaceObservation>>, len: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if seen.lock().unwrap().len() >= len {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_start_without_handler_fails() {
        let (_tx, mut source) = ChannelFaceSource::channel(4);
        assert!(matches!(source.start(), Err(FaceSourceError::NoHandler)));
    }

    #[test]
    fn test_delivers_in_order_on_own_thread() {
        let (tx, mut source) = ChannelFaceSource::channel(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let caller = thread::current().id();
        source.register_handler(Arc::new(move |obs| {
            assert_ne!(thread::current().id(), caller);
            sink.lock().unwrap().push(obs);
        }));
        source.start().unwrap();

        tx.send(FaceObservation::faces(2)).unwrap();
        tx.send(FaceObservation::failed()).unwrap();
        assert!(wait_for_len(&seen, 2));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![FaceObservation::faces(2), FaceObservation::failed()]
        );
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (_tx, mut source) = ChannelFaceSource::channel(4);
        let (handler, _seen) = recording_handler();
        source.register_handler(handler);
        source.start().unwrap();
        assert!(matches!(source.start(), Err(FaceSourceError::AlreadyRunning)));
        source.stop();
    }

    #[test]
    fn test_nothing_delivered_after_stop() {
        let (tx, mut source) = ChannelFaceSource::channel(4);
        let (handler, seen) = recording_handler();
        source.register_handler(handler);
        source.start().unwrap();
        source.stop();

        let _ = tx.try_send(FaceObservation::faces(1));
        thread::sleep(Duration::from_millis(20));
        assert!(seen.lock().unwrap().is_empty());
    }
}
