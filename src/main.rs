//! CLI entry point for the FOM REST node.
//!
//! Startup lifecycle:
//!
//! 1. Parse arguments and initialize tracing.
//! 2. Construct the TCP driver for the configured instrument endpoint.
//!    On success the module goes `INIT -> IDLE`; on failure it goes
//!    `INIT -> ERROR` but keeps serving status queries, rejecting every
//!    action until the process is restarted.
//! 3. Bind the REST interface and serve until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use fom_module::action::ActionDispatcher;
use fom_module::config::Args;
use fom_module::driver::{FomDriver, TcpFomDriver};
use fom_module::error::FomError;
use fom_module::server::{router, NodeContext};
use fom_module::state::StateCell;
use fom_module::status::StatusReporter;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const MODULE_NAME: &str = "fom";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = Arc::new(StateCell::new());

    let dispatcher = match TcpFomDriver::new(&args.fom_host, args.fom_port) {
        Ok(driver) => {
            info!(
                "FOM driver configured for instrument at {}",
                driver.endpoint()
            );
            state.startup_complete();
            let driver: Arc<dyn FomDriver> = Arc::new(driver);
            ActionDispatcher::new(MODULE_NAME, Arc::clone(&state), driver)
        }
        Err(err) => {
            // Startup fault: sticky ERROR, but the node keeps answering
            // status queries so callers can observe the failure.
            error!("{}", FomError::Startup(err));
            state.startup_failed();
            ActionDispatcher::without_driver(MODULE_NAME, Arc::clone(&state))
        }
    };

    let reporter = StatusReporter::new(MODULE_NAME, Arc::clone(&state), args.resources_path());
    let ctx = Arc::new(NodeContext {
        dispatcher,
        reporter,
    });

    let bind_addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind REST interface on {bind_addr}"))?;
    info!("FOM REST node listening on {}", bind_addr);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down FOM REST node");
        })
        .await
        .context("REST server terminated abnormally")?;

    Ok(())
}
