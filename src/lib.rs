//! Control-plane library for the FOM REST node.
//!
//! This library contains the module state machine, the action dispatcher,
//! the status/capability reporter, and the device-driver abstraction used
//! by the `fom-rest-node` binary. The instrument is reached exclusively
//! through the [`driver::FomDriver`] trait, so a simulated driver can stand
//! in for the real hardware in tests and headless development.

pub mod action;
pub mod config;
pub mod driver;
pub mod error;
pub mod server;
pub mod state;
pub mod status;
