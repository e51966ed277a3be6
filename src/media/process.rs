use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{BotError, Result};

/// Runs an external tool to completion, killing it if `limit` elapses first.
/// Spawn failures are returned as `Ok(Err(_))` so callers can map a missing
/// binary onto their own error kind.
pub async fn run_with_timeout(
    mut command: Command,
    operation: &'static str,
    limit: Duration,
) -> Result<std::io::Result<Output>> {
    command.kill_on_drop(true);

    match tokio::time::timeout(limit, command.output()).await {
        Ok(output) => Ok(output),
        Err(_) => {
            warn!("{} exceeded {}s, process killed", operation, limit.as_secs());
            Err(BotError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Checks that `bin` runs, logging its version line.
pub async fn probe(bin: &str, version_arg: &str) -> bool {
    match Command::new(bin).arg(version_arg).output().await {
        Ok(output) => {
            if output.status.success() {
                let version_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .to_string();
                info!("✅ {} is available: {}", bin, version_line.trim());
                true
            } else {
                warn!("❌ {} command failed", bin);
                false
            }
        }
        Err(e) => {
            warn!("❌ {} not found: {}", bin, e);
            false
        }
    }
}
