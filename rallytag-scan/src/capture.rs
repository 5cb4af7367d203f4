use crate::codec::{self, CodePayload};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Which camera to acquire. Scanning always asks for the rear-facing
/// one; the front camera variant exists for device APIs that need an
/// explicit answer either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Environment,
    User,
}

/// Device capture collaborator. `open_stream` failure is terminal for
/// a capture attempt and should surface as
/// [`ScanError::CameraUnavailable`]; `close_stream` is cleanup and
/// must not fail.
#[async_trait]
pub trait CameraDevice: Send {
    async fn open_stream(&mut self, facing: CameraFacing) -> Result<()>;

    /// Attempt a decode against the current frame. `Ok(None)` means no
    /// code in frame, the expected common case while scanning.
    async fn decode_frame(&mut self) -> Result<Option<String>>;

    async fn close_stream(&mut self);
}

/// How a capture run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// First valid decode. The stream is already closed when the
    /// caller sees this, so at most one decode per run can ever reach
    /// a verification call.
    Decoded(CodePayload),
    Cancelled,
}

/// Continuous camera read/decode cycle. Owns the camera for the
/// duration of one run; every exit path releases the stream.
pub struct CaptureLoop<C: CameraDevice> {
    camera: C,
    frame_interval: Duration,
}

/// Cancellation handle for a capture run. Flip the sender (or drop it)
/// to stop the loop.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

impl<C: CameraDevice> CaptureLoop<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            frame_interval: Duration::from_millis(100),
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Run until the first valid decode, cancellation, or a camera
    /// failure. The caller must only start this once its rendering
    /// surface exists; this loop begins at stream acquisition.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> Result<CaptureOutcome> {
        self.camera.open_stream(CameraFacing::Environment).await?;

        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    // A dropped sender cancels the same as an explicit flip
                    if changed.is_err() || *cancel.borrow() {
                        self.camera.close_stream().await;
                        tracing::debug!("Capture cancelled, stream released");
                        return Ok(CaptureOutcome::Cancelled);
                    }
                }
                _ = frames.tick() => {
                    match self.camera.decode_frame().await {
                        Ok(Some(raw)) => match codec::decode(&raw) {
                            Ok(payload) => {
                                // Stop the stream before the payload is
                                // handed out; a second frame must never
                                // trigger a concurrent verification for
                                // the same physical scan.
                                self.camera.close_stream().await;
                                tracing::info!(
                                    "Captured code for match {}",
                                    payload.match_id
                                );
                                return Ok(CaptureOutcome::Decoded(payload));
                            }
                            Err(err) => {
                                tracing::debug!("Ignoring unrecognized frame: {}", err);
                            }
                        },
                        // No code in frame; keep scanning silently
                        Ok(None) => {}
                        Err(err) => {
                            self.camera.close_stream().await;
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
}

/// Camera fed from a fixed frame script. Stands in for real hardware
/// in tests and in the CLI's `scan` command.
pub struct ScriptedCamera {
    frames: std::vec::IntoIter<Option<String>>,
    fail_open: bool,
    open: std::sync::Arc<std::sync::atomic::AtomicBool>,
    decode_attempts: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl ScriptedCamera {
    pub fn new(frames: Vec<Option<String>>) -> Self {
        Self {
            frames: frames.into_iter(),
            fail_open: false,
            open: Default::default(),
            decode_attempts: Default::default(),
        }
    }

    pub fn failing_to_open() -> Self {
        let mut camera = Self::new(Vec::new());
        camera.fail_open = true;
        camera
    }

    /// Shared flag tracking whether the stream is currently open.
    pub fn stream_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.open.clone()
    }

    pub fn attempts_counter(&self) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
        self.decode_attempts.clone()
    }
}

#[async_trait]
impl CameraDevice for ScriptedCamera {
    async fn open_stream(&mut self, _facing: CameraFacing) -> Result<()> {
        if self.fail_open {
            return Err(ScanError::camera("permission denied"));
        }
        self.open.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn decode_frame(&mut self) -> Result<Option<String>> {
        self.decode_attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.frames.next() {
            Some(frame) => Ok(frame),
            // Script exhausted: keep reporting empty frames
            None => Ok(None),
        }
    }

    async fn close_stream(&mut self) {
        self.open.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}
