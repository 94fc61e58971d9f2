use std::io::BufRead;
use tokio::sync::mpsc;

/// Read stdin lines on a plain OS thread.
///
/// A blocked stdin read would otherwise hold up runtime shutdown; a detached
/// thread does not keep the process alive.
pub fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("checkin-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to spawn stdin reader; keyboard input disabled");
    }
    rx
}
