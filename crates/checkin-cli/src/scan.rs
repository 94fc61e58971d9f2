//! Check-in flow: stream frames, detect faces, capture and upload photos.

use crate::config::Config;
use crate::feed::{CameraFeed, LatestFrame};
use crate::input::spawn_line_reader;
use anyhow::{Context, Result};
use checkin_api::{BackendClient, FaceBackend, MatchDecision, UploadCoordinator};
use checkin_core::detector::run_inference;
use checkin_core::{
    frame_to_tensor, AutoCapture, CaptureTrigger, DetectionResult, InferenceAdapter,
    OnnxFaceDetector, ThrottleGate, TransformConfig,
};
use checkin_hw::{Frame, PhotoError, PhotoWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinHandle, JoinSet};

type Coordinator = UploadCoordinator<BackendClient>;
type InferenceTask = JoinHandle<(OnnxFaceDetector, Option<DetectionResult>)>;
type CaptureTask = JoinHandle<Result<PathBuf, PhotoError>>;

struct UploadOutcome {
    path: PathBuf,
    decision: Option<MatchDecision>,
    error: Option<String>,
}

pub async fn run(config: &Config) -> Result<()> {
    let backend = BackendClient::new(&config.api_url, config.api_timeout)?;
    let coordinator = Arc::new(UploadCoordinator::new(backend, config.match_threshold));

    let mut adapter = InferenceAdapter::open(
        &config.model_dir,
        &config.model_file,
        config.model_weights.as_deref(),
    );
    if !adapter.is_enabled() {
        println!("Face detection unavailable; press Enter to capture manually.");
    }

    let feed = CameraFeed::spawn(&config.camera_device)
        .with_context(|| format!("cannot start camera {}", config.camera_device))?;
    let writer = PhotoWriter::new(&config.capture_dir);
    let transform = config.transform();
    let mut throttle = ThrottleGate::new(config.throttle_interval);
    let mut controller = AutoCapture::new(config.capture());

    let mut frames = feed.subscribe();
    let mut input = spawn_line_reader();
    let mut inference: Option<InferenceTask> = None;
    let mut capture: Option<CaptureTask> = None;
    let mut uploads: JoinSet<UploadOutcome> = JoinSet::new();

    println!("Scanning. Look at the camera, press Enter to capture manually, Ctrl-C to quit.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("scan interrupted");
                break;
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = frames.borrow_and_update().clone();
                let Some(frame) = latest else { continue };
                if !throttle.try_pass(Instant::now()) {
                    continue;
                }
                let Some(model) = adapter.checkout() else {
                    tracing::trace!(sequence = frame.sequence, "frame dropped: detector busy or disabled");
                    continue;
                };
                inference = Some(spawn_inference(model, frame, transform));
            }
            joined = join_task(&mut inference) => {
                inference = None;
                let (model, result) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        tracing::error!(error = %e, "inference task failed; detection stopped");
                        continue;
                    }
                };
                adapter.checkin(model);
                let Some(result) = result else { continue };
                if let Some(trigger) = controller.on_detection(&result, Instant::now(), upload_in_flight(&coordinator, &uploads)) {
                    capture = start_capture(&mut controller, &writer, frames.borrow().clone(), trigger);
                }
            }
            Some(line) = input.recv() => {
                if line.trim().eq_ignore_ascii_case("q") {
                    break;
                }
                match controller.request_manual(Instant::now(), upload_in_flight(&coordinator, &uploads)) {
                    Ok(trigger) => {
                        capture = start_capture(&mut controller, &writer, frames.borrow().clone(), trigger);
                    }
                    Err(rejected) => println!("Cannot capture now: {rejected}."),
                }
            }
            joined = join_task(&mut capture) => {
                capture = None;
                match joined {
                    Ok(Ok(path)) => {
                        controller.capture_succeeded(Instant::now());
                        coordinator.record_capture(&path);
                        println!("Photo captured, checking in...");
                        spawn_upload(&mut uploads, coordinator.clone(), path);
                    }
                    Ok(Err(e)) => {
                        controller.capture_failed();
                        tracing::warn!(error = %e, "photo capture failed");
                        println!("Capture failed: {e}");
                    }
                    Err(e) => {
                        controller.capture_failed();
                        tracing::error!(error = %e, "capture task failed");
                    }
                }
            }
            Some(done) = uploads.join_next() => {
                match done {
                    Ok(outcome) => report_upload(&outcome),
                    Err(e) => tracing::error!(error = %e, "upload task failed"),
                }
            }
        }
    }

    // Let in-flight uploads finish so their result is still reported.
    while let Some(done) = uploads.join_next().await {
        if let Ok(outcome) = done {
            report_upload(&outcome);
        }
    }

    let stopped = tokio::task::spawn_blocking(move || feed.shutdown()).await?;
    stopped.context("camera stream failed")?;
    Ok(())
}

/// An upload counts from the moment it is spawned until its result is
/// collected, not only while the coordinator is inside a submit.
fn upload_in_flight<B: FaceBackend, T>(coordinator: &UploadCoordinator<B>, uploads: &JoinSet<T>) -> bool {
    coordinator.is_busy() || !uploads.is_empty()
}

/// Resolves when the task finishes; pending forever if there is none.
async fn join_task<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn spawn_inference(
    mut model: OnnxFaceDetector,
    frame: Arc<Frame>,
    transform: TransformConfig,
) -> InferenceTask {
    tokio::task::spawn_blocking(move || {
        let result = prepare(&frame, &transform).and_then(|tensor| run_inference(&mut model, &tensor));
        (model, result)
    })
}

fn prepare(frame: &Frame, transform: &TransformConfig) -> Option<checkin_core::FrameTensor> {
    let rgb = frame
        .to_rgb8()
        .map_err(|e| tracing::warn!(error = %e, "frame conversion failed"))
        .ok()?;
    frame_to_tensor(&rgb, frame.width as usize, frame.height as usize, transform)
        .map_err(|e| tracing::warn!(error = %e, "frame transform failed"))
        .ok()
}

fn start_capture(
    controller: &mut AutoCapture,
    writer: &PhotoWriter,
    frame: LatestFrame,
    trigger: CaptureTrigger,
) -> Option<CaptureTask> {
    let Some(frame) = frame else {
        controller.capture_failed();
        println!("No camera frame yet; try again.");
        return None;
    };
    tracing::info!(manual = trigger.manual, score = ?trigger.score, "capturing photo");
    let writer = writer.clone();
    Some(tokio::task::spawn_blocking(move || writer.write(&frame)))
}

fn spawn_upload(uploads: &mut JoinSet<UploadOutcome>, coordinator: Arc<Coordinator>, path: PathBuf) {
    uploads.spawn(async move {
        let decision = coordinator.submit_detection_photo(&path).await;
        let error = coordinator.last_error();
        UploadOutcome {
            path,
            decision,
            error,
        }
    });
}

fn report_upload(outcome: &UploadOutcome) {
    match (&outcome.decision, &outcome.error) {
        (Some(MatchDecision::Matched { label, similarity }), _) => match similarity {
            Some(s) => println!("Welcome, {label}! (similarity {s:.2})"),
            None => println!("Welcome, {label}!"),
        },
        (Some(MatchDecision::NoMatch { .. }), _) => {
            println!("Face not recognized. Please register or try again.")
        }
        (None, Some(error)) => println!("Check-in failed: {error}"),
        (None, None) => println!("Check-in failed for {}", outcome.path.display()),
    }
}
