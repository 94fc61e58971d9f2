//! Registration flow: one photo per face direction, then a single upload.

use crate::config::Config;
use crate::feed::CameraFeed;
use crate::input::spawn_line_reader;
use anyhow::{Context, Result};
use checkin_api::{BackendClient, FaceBackend, UploadCoordinator};
use checkin_core::{CaptureSession, FaceDirection};
use checkin_hw::PhotoWriter;
use std::path::PathBuf;
use tokio::sync::mpsc;

enum Step {
    Capture,
    Retake,
    Back,
    Quit,
}

fn parse_step(line: &str) -> Option<Step> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "c" => Some(Step::Capture),
        "r" => Some(Step::Retake),
        "b" => Some(Step::Back),
        "q" => Some(Step::Quit),
        _ => None,
    }
}

pub async fn run(config: &Config, name: Option<String>) -> Result<()> {
    let backend = BackendClient::new(&config.api_url, config.api_timeout)?;
    let coordinator = UploadCoordinator::new(backend, config.match_threshold);
    let feed = CameraFeed::spawn(&config.camera_device)
        .with_context(|| format!("cannot start camera {}", config.camera_device))?;
    let writer = PhotoWriter::new(&config.capture_dir);
    let mut input = spawn_line_reader();
    let mut session = CaptureSession::new();

    println!("Registration: Enter = capture, r = retake, b = back, q = quit.");

    while !session.is_complete() {
        let direction = session.current_direction();
        print_progress(&session);
        println!("{}: {}", direction.title(), direction.instruction());

        let Some(line) = input.recv().await else {
            return Ok(());
        };
        match parse_step(&line) {
            Some(Step::Capture) => {
                let Some(frame) = feed.latest() else {
                    println!("No camera frame yet; try again.");
                    continue;
                };
                let writer = writer.clone();
                match tokio::task::spawn_blocking(move || writer.write(&frame)).await? {
                    Ok(path) => store_capture(&mut session, &coordinator, path),
                    Err(e) => {
                        tracing::warn!(error = %e, direction = direction.title(), "photo capture failed");
                        println!("Capture failed: {e}");
                    }
                }
            }
            Some(Step::Retake) => {
                if let Some(old) = session.retake() {
                    coordinator.remove_photo(&old);
                    println!("Discarded {} photo.", direction.title());
                }
            }
            Some(Step::Back) => {
                if !session.previous() {
                    println!("Already at the first step.");
                }
            }
            Some(Step::Quit) => {
                println!("Registration cancelled.");
                return Ok(());
            }
            None => println!("Unknown command {:?}.", line.trim()),
        }
    }
    print_progress(&session);

    let handles = session
        .handles()
        .context("registration photos incomplete")?
        .to_vec();

    let mut name = name;
    loop {
        let person_name = match name.take() {
            Some(n) => n,
            None => match prompt(&mut input, "Employee name: ").await {
                Some(n) => n,
                None => return Ok(()),
            },
        };

        println!("Uploading {} photos for {}...", handles.len(), person_name.trim());
        if coordinator.submit_registration_batch(&handles, &person_name).await {
            println!("Registered {}.", person_name.trim());
            break;
        }

        let error = coordinator.last_error().unwrap_or_else(|| "unknown error".into());
        println!("Registration failed: {error}");
        match prompt(&mut input, "Press Enter to retry, q to quit: ").await {
            Some(answer) if answer.trim().eq_ignore_ascii_case("q") => return Ok(()),
            Some(_) => {}
            None => return Ok(()),
        }
    }

    tokio::task::spawn_blocking(move || feed.shutdown())
        .await?
        .context("camera stream failed")?;
    Ok(())
}

/// Record `path` for the current direction, dropping any photo it replaces.
fn store_capture<B: FaceBackend>(
    session: &mut CaptureSession,
    coordinator: &UploadCoordinator<B>,
    path: PathBuf,
) {
    if let Some(replaced) = session.retake() {
        coordinator.remove_photo(&replaced);
    }
    coordinator.record_capture(&path);
    session.record(path);
}

fn print_progress(session: &CaptureSession) {
    let marks: Vec<String> = FaceDirection::ALL
        .iter()
        .zip(session.completed_steps())
        .map(|(dir, done)| format!("[{}] {}", if done { "x" } else { " " }, dir.title()))
        .collect();
    println!("{}", marks.join("  "));
}

async fn prompt(input: &mut mpsc::UnboundedReceiver<String>, text: &str) -> Option<String> {
    use std::io::Write;
    print!("{text}");
    let _ = std::io::stdout().flush();
    input.recv().await
}
