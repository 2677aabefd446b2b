//! A simulated FOM driver.
//!
//! Implements the full [`FomDriver`] contract without hardware, for tests
//! and headless development. Behavior is scripted at construction time:
//! connect failures, per-command latency (to exercise the timeout path),
//! and canned reply payloads.

use super::{ActionOutcome, ActionVars, DriverError, FomDriver, RawReply};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Simulated instrument driver.
pub struct MockFomDriver {
    fail_connect: bool,
    /// Artificial latency before each reply; used with `timeout` to model
    /// an instrument that never answers.
    reply_delay: Option<Duration>,
    timeout: Duration,
    output_path: String,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
}

impl MockFomDriver {
    /// A well-behaved instrument.
    pub fn new() -> Self {
        Self {
            fail_connect: false,
            reply_delay: None,
            timeout: Duration::from_secs(5),
            output_path: "/data/fom/output_0001.csv".to_string(),
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
        }
    }

    /// An instrument that refuses the handshake.
    pub fn refusing_connections() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    /// An instrument that never replies; commands fail after `timeout`.
    pub fn unresponsive(timeout: Duration) -> Self {
        Self {
            reply_delay: Some(timeout * 10),
            timeout,
            ..Self::new()
        }
    }

    /// An instrument that answers after `delay` (still within the
    /// deadline); used to hold the busy window open in race tests.
    pub fn with_latency(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// Overrides the artifact path reported by `get_output_file`.
    pub fn with_output_path(mut self, path: &str) -> Self {
        self.output_path = path.to_string();
        self
    }

    /// Number of times `connect` has been invoked.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Whether the simulated channel is currently established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn simulate_reply(&self, detail: serde_json::Value) -> Result<RawReply, DriverError> {
        if let Some(delay) = self.reply_delay {
            tokio::time::timeout(self.timeout, sleep(delay))
                .await
                .map_err(|_| DriverError::Timeout(self.timeout))?;
        }
        Ok(RawReply {
            status: "ok".to_string(),
            detail,
        })
    }
}

impl Default for MockFomDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FomDriver for MockFomDriver {
    async fn connect(&self) -> Result<(), DriverError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(DriverError::Connection(
                "simulated instrument refused the handshake".to_string(),
            ));
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!("Connected to simulated FOM instrument");
        }
        Ok(())
    }

    async fn send_command(&self, command: &str, _args: &ActionVars) -> Result<RawReply, DriverError> {
        self.connect().await?;
        self.simulate_reply(serde_json::json!({ "echo": command }))
            .await
    }

    async fn load_protocol(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        let protocol = args
            .get("protocol")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::InvalidArgs("missing string argument 'protocol'".to_string())
            })?;
        self.connect().await?;
        self.simulate_reply(serde_json::json!({ "loaded": protocol }))
            .await?;
        Ok(ActionOutcome {
            message: format!("protocol '{protocol}' loaded"),
            log: format!("simulated load of '{protocol}'"),
        })
    }

    async fn run_protocol(&self, _args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        self.connect().await?;
        self.simulate_reply(serde_json::json!({ "run": "complete" }))
            .await?;
        Ok(ActionOutcome {
            message: "protocol run complete".to_string(),
            log: "simulated run finished".to_string(),
        })
    }

    async fn get_output_file(&self, _args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        self.connect().await?;
        self.simulate_reply(serde_json::json!({ "path": self.output_path }))
            .await?;
        Ok(ActionOutcome {
            message: self.output_path.clone(),
            log: "simulated artifact fetch".to_string(),
        })
    }
}
