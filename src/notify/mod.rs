//! Best-effort desktop notifications.
//!
//! Delivery is fire-and-forget: the run never depends on it, failures are
//! swallowed, and the only bound on the call is a timeout so a slow or
//! absent notification channel cannot stall the loop.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Send a desktop notification, waiting at most `timeout_ms`.
///
/// Every failure path (missing binary, nonzero exit, timeout) degrades to
/// a debug log line and nothing else.
pub async fn send(title: &str, message: &str, timeout_ms: u64) {
    let Some(mut command) = platform_command(title, message) else {
        log::debug!("No notification channel on this platform");
        return;
    };
    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    let delivery = async {
        match command.spawn() {
            Ok(mut child) => match child.wait().await {
                Ok(status) if status.success() => {
                    log::debug!("Notification delivered: {}", title);
                }
                Ok(status) => log::debug!("Notification command exited with {}", status),
                Err(e) => log::debug!("Notification command failed: {}", e),
            },
            Err(e) => log::debug!("Failed to spawn notification command: {}", e),
        }
    };

    if tokio::time::timeout(Duration::from_millis(timeout_ms), delivery)
        .await
        .is_err()
    {
        log::debug!("Notification timed out after {}ms", timeout_ms);
    }
}

#[cfg(target_os = "linux")]
fn platform_command(title: &str, message: &str) -> Option<Command> {
    let mut command = Command::new("notify-send");
    command.arg(title).arg(message);
    Some(command)
}

#[cfg(target_os = "macos")]
fn platform_command(title: &str, message: &str) -> Option<Command> {
    let mut command = Command::new("osascript");
    command.arg("-e").arg(format!(
        "display notification \"{}\" with title \"{}\"",
        message.replace('"', "\\\""),
        title.replace('"', "\\\"")
    ));
    Some(command)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_command(_title: &str, _message: &str) -> Option<Command> {
    None
}
