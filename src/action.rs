//! Action registry and dispatcher.
//!
//! The dispatcher is the single path from an inbound action request to the
//! driver. It enforces the one-action-at-a-time rule through the state
//! cell's busy gate, resolves the action handle against the fixed registry,
//! and converts every outcome (including parse and driver faults) into a
//! normalized [`ActionResult`]. No fault crosses this boundary uncaught.

use crate::driver::{ActionVars, FomDriver};
use crate::state::{ModuleState, StateCell};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether an action produces a plain result or a file artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Result is a message + log.
    Standard,
    /// Result message is reinterpreted as the artifact's path.
    FileProducing,
}

/// One entry in the action registry.
#[derive(Clone, Copy, Debug)]
pub struct ActionSpec {
    /// The string handle callers use to request this action.
    pub handle: &'static str,
    /// Human-readable description, surfaced through `about()`.
    pub description: &'static str,
    /// Result shape of the action.
    pub kind: ActionKind,
}

/// The fixed action registry.
///
/// Single source of truth: both the dispatcher's handle resolution and the
/// reporter's capability listing derive from this table. Extend the module
/// by adding an entry here and a matching arm in
/// [`ActionDispatcher::invoke_driver`].
pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        handle: "load_protocol",
        description: "Load a protocol file onto the instrument",
        kind: ActionKind::Standard,
    },
    ActionSpec {
        handle: "run_protocol",
        description: "Run the currently loaded protocol",
        kind: ActionKind::Standard,
    },
    ActionSpec {
        handle: "get_output_file",
        description: "Fetch the latest output artifact from the instrument",
        kind: ActionKind::FileProducing,
    },
];

/// Looks up an action handle in the registry.
pub fn find_action(handle: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|spec| spec.handle == handle)
}

/// Normalized outcome of one action request.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionResult {
    /// The action completed.
    Succeeded {
        /// Short human-readable summary.
        message: String,
        /// Diagnostic detail; may be empty.
        log: String,
    },
    /// The action completed and produced a file artifact.
    SucceededWithFile {
        /// Path of the produced artifact.
        file_path: String,
        /// Diagnostic detail; may be empty.
        log: String,
    },
    /// The action was rejected or failed.
    Failed {
        /// Short human-readable summary; may be empty.
        message: String,
        /// Failure description and diagnostic trace.
        log: String,
    },
}

impl ActionResult {
    fn failed(log: impl Into<String>) -> Self {
        ActionResult::Failed {
            message: String::new(),
            log: log.into(),
        }
    }
}

/// Serializes all instrument interaction behind the busy gate.
pub struct ActionDispatcher {
    name: String,
    state: Arc<StateCell>,
    driver: Option<Arc<dyn FomDriver>>,
}

impl ActionDispatcher {
    /// Creates a dispatcher for a ready module.
    pub fn new(name: &str, state: Arc<StateCell>, driver: Arc<dyn FomDriver>) -> Self {
        Self {
            name: name.to_string(),
            state,
            driver: Some(driver),
        }
    }

    /// Creates a dispatcher for a module whose startup failed.
    ///
    /// The state cell is expected to hold `Error`; every request is
    /// rejected before any driver access.
    pub fn without_driver(name: &str, state: Arc<StateCell>) -> Self {
        Self {
            name: name.to_string(),
            state,
            driver: None,
        }
    }

    /// Executes one action request.
    ///
    /// `action_vars` is a JSON-encoded object of arguments; its schema is
    /// interpreted only by the driver operation the handle maps to.
    pub async fn dispatch(&self, action_handle: &str, action_vars: &str) -> ActionResult {
        // Admission control: a single compare-and-swap claims the busy
        // window. Rejection mutates nothing and touches no driver.
        let guard = match self.state.begin_action() {
            Ok(guard) => guard,
            Err(ModuleState::Busy) => {
                return ActionResult::failed(format!("{} is busy", self.name));
            }
            Err(observed) => {
                return ActionResult::failed(format!(
                    "{} cannot accept actions in state {observed}",
                    self.name
                ));
            }
        };

        info!("Executing action '{}'", action_handle);
        let result = match self.run_action(action_handle, action_vars).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Action '{}' failed: {:#}", action_handle, err);
                // Flatten the whole error chain into the log.
                ActionResult::failed(format!("{err:#}"))
            }
        };

        // Guard drop releases Busy -> Idle on this and every other path.
        drop(guard);
        result
    }

    async fn run_action(&self, action_handle: &str, action_vars: &str) -> Result<ActionResult> {
        let Some(spec) = find_action(action_handle) else {
            return Ok(ActionResult::failed("Unsupported action"));
        };

        let args: ActionVars = serde_json::from_str(action_vars)
            .map_err(|e| anyhow!("malformed action_vars: {e}"))?;

        let outcome = self.invoke_driver(spec.handle, &args).await?;
        Ok(match spec.kind {
            ActionKind::Standard => ActionResult::Succeeded {
                message: outcome.message,
                log: outcome.log,
            },
            ActionKind::FileProducing => ActionResult::SucceededWithFile {
                file_path: outcome.message,
                log: outcome.log,
            },
        })
    }

    async fn invoke_driver(
        &self,
        handle: &str,
        args: &ActionVars,
    ) -> Result<crate::driver::ActionOutcome> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| anyhow!("driver not initialized"))?;
        let outcome = match handle {
            "load_protocol" => driver.load_protocol(args).await?,
            "run_protocol" => driver.run_protocol(args).await?,
            "get_output_file" => driver.get_output_file(args).await?,
            other => return Err(anyhow!("registry entry '{other}' has no driver mapping")),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockFomDriver;

    fn ready_dispatcher(driver: MockFomDriver) -> ActionDispatcher {
        let state = Arc::new(StateCell::new());
        state.startup_complete();
        ActionDispatcher::new("fom", state, Arc::new(driver))
    }

    #[tokio::test]
    async fn test_unknown_handle_is_unsupported() {
        let dispatcher = ready_dispatcher(MockFomDriver::new());
        let result = dispatcher.dispatch("frobnicate", "{}").await;
        assert_eq!(
            result,
            ActionResult::Failed {
                message: String::new(),
                log: "Unsupported action".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_vars_fail_cleanly() {
        let dispatcher = ready_dispatcher(MockFomDriver::new());
        let result = dispatcher.dispatch("run_protocol", "not json").await;
        match result {
            ActionResult::Failed { log, .. } => assert!(log.contains("malformed action_vars")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_registry_handle_has_a_driver_mapping() {
        for spec in ACTIONS {
            let dispatcher = ready_dispatcher(MockFomDriver::new());
            let vars = r#"{"protocol": "assay_v2"}"#;
            let result = dispatcher.dispatch(spec.handle, vars).await;
            match result {
                ActionResult::Failed { log, .. } => {
                    assert_ne!(log, "Unsupported action", "handle {}", spec.handle);
                    assert!(!log.contains("no driver mapping"), "handle {}", spec.handle);
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_file_action_yields_path() {
        let driver = MockFomDriver::new().with_output_path("/data/plate_7.csv");
        let dispatcher = ready_dispatcher(driver);
        let result = dispatcher.dispatch("get_output_file", "{}").await;
        match result {
            ActionResult::SucceededWithFile { file_path, .. } => {
                assert_eq!(file_path, "/data/plate_7.csv");
            }
            other => panic!("expected SucceededWithFile, got {other:?}"),
        }
    }
}
