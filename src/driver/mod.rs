//! Device driver abstraction for the FOM instrument.
//!
//! The [`FomDriver`] trait is the single seam between the control plane and
//! the instrument's native wire protocol. The dispatcher only ever calls
//! the narrow operation set defined here, so the production TCP client and
//! the simulated driver are interchangeable.

pub mod mock;
pub mod tcp;

pub use mock::MockFomDriver;
pub use tcp::TcpFomDriver;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Schema-free argument payload for a driver operation.
///
/// Each operation validates and casts only the keys it needs; missing or
/// malformed keys are a per-request validation fault, not a crash.
pub type ActionVars = Map<String, Value>;

/// Errors produced by driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Instrument did not reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

/// A raw instrument reply, decoded from the wire but not yet interpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawReply {
    /// Reply status token (`"ok"` or `"err"` for the line protocol).
    pub status: String,
    /// Instrument-specific reply body.
    pub detail: Value,
}

impl RawReply {
    /// Treats an `err`-status reply as a protocol error.
    pub fn into_ok(self) -> Result<Value, DriverError> {
        if self.status == "ok" {
            Ok(self.detail)
        } else {
            Err(DriverError::Protocol(format!(
                "instrument reported failure: {}",
                self.detail
            )))
        }
    }
}

/// The outcome of a higher-level driver operation.
///
/// For the file-producing operation, `message` carries the artifact path.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    /// Short human-readable summary (or artifact path).
    pub message: String,
    /// Diagnostic detail; may be empty.
    pub log: String,
}

/// Capability interface to one FOM instrument.
///
/// Implementations own the connection handle exclusively and perform no
/// shared mutation beyond it. All network waits must be bounded by an
/// internal deadline so the module can never stay busy on a hung link.
#[async_trait]
pub trait FomDriver: Send + Sync {
    /// Establishes the channel to the instrument.
    ///
    /// Idempotent: connecting while already connected is a no-op success.
    async fn connect(&self) -> Result<(), DriverError>;

    /// Transmits a single instrument command and awaits its reply.
    async fn send_command(&self, command: &str, args: &ActionVars) -> Result<RawReply, DriverError>;

    /// Loads a protocol file onto the instrument.
    async fn load_protocol(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError>;

    /// Runs the currently loaded protocol.
    async fn run_protocol(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError>;

    /// Fetches an output artifact; the outcome message is the file path.
    async fn get_output_file(&self, args: &ActionVars) -> Result<ActionOutcome, DriverError>;
}
