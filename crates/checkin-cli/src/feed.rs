use checkin_hw::{Camera, CameraError, Frame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::watch;

pub type LatestFrame = Option<Arc<Frame>>;

/// Camera producer on a dedicated OS thread.
///
/// Only the most recent frame is kept: each new frame replaces the previous
/// one in the watch channel, so a slow consumer never builds a backlog.
pub struct CameraFeed {
    rx: watch::Receiver<LatestFrame>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), CameraError>>>,
}

impl CameraFeed {
    /// Open the camera and start streaming. Fails fast if the device cannot
    /// be opened, including when access is denied.
    pub fn spawn(device: &str) -> Result<Self, CameraError> {
        let camera = Camera::open(device)?;
        tracing::info!(
            device,
            width = camera.width,
            height = camera.height,
            fourcc = ?camera.fourcc,
            "camera opened"
        );

        let (tx, rx) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = std::thread::Builder::new()
            .name("checkin-camera".into())
            .spawn(move || {
                let result = camera.stream(|frame| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return false;
                    }
                    // Err means every receiver is gone.
                    tx.send(Some(Arc::new(frame))).is_ok()
                });
                if let Err(e) = &result {
                    tracing::error!(error = %e, "camera stream ended");
                }
                result
            })
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn camera thread: {e}")))?;

        Ok(Self {
            rx,
            stop,
            thread: Some(thread),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<LatestFrame> {
        self.rx.clone()
    }

    pub fn latest(&self) -> LatestFrame {
        self.rx.borrow().clone()
    }

    /// Stop streaming and wait for the camera thread. Returns the stream
    /// error if the camera failed on its own.
    pub fn shutdown(mut self) -> Result<(), CameraError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), CameraError> {
        self.stop.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(CameraError::CaptureFailed("camera thread panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
