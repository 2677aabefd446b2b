//! TCP line-protocol driver for FOM instruments.
//!
//! Speaks a private newline-delimited JSON protocol with the instrument
//! controller: one request object per line, one reply object per line.
//! The encoding is internal to this module; nothing outside the driver
//! depends on it.
//!
//! Every network wait is bounded by the configured deadline so a hung
//! instrument surfaces as [`DriverError::Timeout`] instead of wedging the
//! module in its busy window.

use super::{ActionOutcome, ActionVars, DriverError, FomDriver, RawReply};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default deadline for connect and command round-trips.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct WireReply {
    status: String,
    #[serde(default)]
    detail: serde_json::Value,
}

/// Production driver: owns the socket to `hostname:port`.
pub struct TcpFomDriver {
    hostname: String,
    port: u16,
    timeout: Duration,
    // Exclusively owned connection handle; None until first connect.
    stream: Mutex<Option<BufStream<TcpStream>>>,
}

impl TcpFomDriver {
    /// Creates a driver for the given instrument endpoint.
    ///
    /// Validates the configuration eagerly; an empty hostname or a zero
    /// port is a startup fault, reported before any I/O is attempted.
    pub fn new(hostname: &str, port: u16) -> Result<Self, DriverError> {
        if hostname.trim().is_empty() {
            return Err(DriverError::Connection(
                "instrument hostname must not be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(DriverError::Connection(
                "instrument port must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            hostname: hostname.to_string(),
            port,
            timeout: DEFAULT_TIMEOUT,
            stream: Mutex::new(None),
        })
    }

    /// Overrides the network deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The instrument endpoint this driver targets.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    async fn ensure_connected(
        &self,
        guard: &mut Option<BufStream<TcpStream>>,
    ) -> Result<(), DriverError> {
        if guard.is_some() {
            return Ok(());
        }
        let endpoint = self.endpoint();
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| DriverError::Timeout(self.timeout))?
            .map_err(|e| DriverError::Connection(format!("failed to reach {endpoint}: {e}")))?;
        info!("Connected to FOM instrument at {}", endpoint);
        *guard = Some(BufStream::new(stream));
        Ok(())
    }

    async fn round_trip(&self, command: &str, args: &ActionVars) -> Result<RawReply, DriverError> {
        let mut guard = self.stream.lock().await;
        self.ensure_connected(&mut guard).await?;
        let stream = guard
            .as_mut()
            .ok_or_else(|| DriverError::Connection("connection handle missing".to_string()))?;

        let request = serde_json::json!({ "command": command, "args": args });
        let mut line = request.to_string();
        line.push('\n');
        debug!("[fom] sending command: {}", command);

        let reply_line = tokio::time::timeout(self.timeout, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            let mut reply = String::new();
            let n = stream.read_line(&mut reply).await?;
            Ok::<(usize, String), std::io::Error>((n, reply))
        })
        .await
        .map_err(|_| DriverError::Timeout(self.timeout))?;

        let (bytes_read, reply) = reply_line?;
        if bytes_read == 0 {
            // Peer closed the socket; drop the handle so the next command
            // reconnects.
            *guard = None;
            return Err(DriverError::Connection(
                "instrument closed the connection".to_string(),
            ));
        }

        let wire: WireReply = serde_json::from_str(reply.trim())
            .map_err(|e| DriverError::Protocol(format!("malformed reply: {e}")))?;
        debug!("[fom] reply status: {}", wire.status);
        Ok(RawReply {
            status: wire.status,
            detail: wire.detail,
        })
    }

    fn require_str<'a>(args: &'a ActionVars, key: &str) -> Result<&'a str, DriverError> {
        args.get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::InvalidArgs(format!("missing string argument '{key}'")))
    }
}

#[async_trait]
impl FomDriver for TcpFomDriver {
    async fn connect(&self) -> Result<(), DriverError> {
        let mut guard = self.stream.lock().await;
        self.ensure_connected(&mut guard).await
    }

    async fn send_command(&self, command: &str, args: &ActionVars) -> Result<RawReply, DriverError> {
        self.round_trip(command, args).await
    }

    async fn load_protocol(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        let protocol = Self::require_str(args, "protocol")?;
        let detail = self.round_trip("LoadProtocol", args).await?.into_ok()?;
        Ok(ActionOutcome {
            message: format!("protocol '{protocol}' loaded"),
            log: detail.to_string(),
        })
    }

    async fn run_protocol(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        let detail = self.round_trip("RunProtocol", args).await?.into_ok()?;
        Ok(ActionOutcome {
            message: "protocol run complete".to_string(),
            log: detail.to_string(),
        })
    }

    async fn get_output_file(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError> {
        let detail = self.round_trip("GetOutputFile", args).await?.into_ok()?;
        let path = detail
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::Protocol("GetOutputFile reply carried no 'path'".to_string())
            })?;
        Ok(ActionOutcome {
            message: path.to_string(),
            log: detail.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(TcpFomDriver::new("", 9000).is_err());
        assert!(TcpFomDriver::new("fom.lab", 0).is_err());
        assert!(TcpFomDriver::new("fom.lab", 9000).is_ok());
    }

    async fn spawn_instrument(reply: serde_json::Value) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut reader = BufReader::new(socket);
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    break;
                }
                let mut out = reply.to_string();
                out.push('\n');
                if reader.get_mut().write_all(out.as_bytes()).await.is_err() {
                    break;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let addr = spawn_instrument(serde_json::json!({"status": "ok"})).await;
        let driver = TcpFomDriver::new("127.0.0.1", addr.port()).expect("driver");
        driver.connect().await.expect("first connect");
        driver.connect().await.expect("second connect is a no-op");
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let addr = spawn_instrument(serde_json::json!({
            "status": "ok", "detail": {"echo": true}
        }))
        .await;
        let driver = TcpFomDriver::new("127.0.0.1", addr.port()).expect("driver");
        let reply = driver
            .send_command("Ping", &ActionVars::new())
            .await
            .expect("reply");
        assert_eq!(reply.status, "ok");
        assert_eq!(reply.detail, serde_json::json!({"echo": true}));
    }

    #[tokio::test]
    async fn test_get_output_file_extracts_path() {
        let addr = spawn_instrument(serde_json::json!({
            "status": "ok", "detail": {"path": "/data/run_0042.csv"}
        }))
        .await;
        let driver = TcpFomDriver::new("127.0.0.1", addr.port()).expect("driver");
        let outcome = driver
            .get_output_file(&ActionVars::new())
            .await
            .expect("outcome");
        assert_eq!(outcome.message, "/data/run_0042.csv");
    }

    #[tokio::test]
    async fn test_unreachable_instrument_is_connection_error() {
        // Port from an immediately-dropped listener: nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let driver = TcpFomDriver::new("127.0.0.1", port)
            .expect("driver")
            .with_timeout(Duration::from_millis(500));
        let err = driver.connect().await.expect_err("must fail");
        assert!(matches!(
            err,
            DriverError::Connection(_) | DriverError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_silent_instrument_times_out() {
        // Accepts the connection but never replies.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let driver = TcpFomDriver::new("127.0.0.1", addr.port())
            .expect("driver")
            .with_timeout(Duration::from_millis(200));
        let err = driver
            .send_command("RunProtocol", &ActionVars::new())
            .await
            .expect_err("must time out");
        assert!(matches!(err, DriverError::Timeout(_)));
    }
}
