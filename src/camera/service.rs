use crate::config::ServiceConfig;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

/// Status of an out-of-process service that may hold the camera
#[async_trait]
pub trait ServiceStatus: Send + Sync {
    async fn is_active(&self) -> io::Result<bool>;

    /// Service identifier used in logs and busy errors
    fn unit(&self) -> &str;
}

/// Queries a systemd user unit with `systemctl --user is-active`
#[derive(Debug, Clone)]
pub struct SystemctlStatus {
    unit: String,
    timeout: Duration,
}

impl SystemctlStatus {
    pub fn new(unit: impl Into<String>, timeout: Duration) -> Self {
        Self {
            unit: unit.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.capture_unit.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl ServiceStatus for SystemctlStatus {
    async fn is_active(&self) -> io::Result<bool> {
        let query = Command::new("systemctl")
            .args(["--user", "is-active", &self.unit])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("systemctl did not answer within {:?}", self.timeout),
                )
            })??;

        // Non-zero exit just means "not active"; stdout carries the state
        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        trace!(unit = %self.unit, state = %state, "Service state");
        Ok(parse_state(&state))
    }

    fn unit(&self) -> &str {
        &self.unit
    }
}

fn parse_state(state: &str) -> bool {
    state == "active"
}
