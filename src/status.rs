//! Status and capability reporting.
//!
//! Answers introspection queries without touching the driver, so they stay
//! responsive while an action is in flight: state is a lock-free read of
//! the shared cell, `about()` is static metadata derived from the action
//! registry, and `resources()` reads the optional catalog file.

use crate::action::ACTIONS;
use crate::error::{AppResult, FomError};
use crate::state::{ModuleState, StateCell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Descriptive metadata for the module, served on `/about`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub model: String,
    pub version: String,
    /// Handle -> description, derived from the action registry.
    pub actions: BTreeMap<String, String>,
    pub repo: String,
}

/// Read-only introspection over the module.
pub struct StatusReporter {
    name: String,
    state: Arc<StateCell>,
    /// Resource catalog path; `None` means no catalog is configured.
    resources_path: Option<PathBuf>,
}

impl StatusReporter {
    /// Creates a reporter over the shared state cell.
    pub fn new(name: &str, state: Arc<StateCell>, resources_path: Option<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            state,
            resources_path,
        }
    }

    /// Current module state. Never blocks on the driver.
    pub fn state(&self) -> ModuleState {
        self.state.current()
    }

    /// Module description, including the supported action registry.
    pub fn about(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            model: "Unknown".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            actions: ACTIONS
                .iter()
                .map(|spec| (spec.handle.to_string(), spec.description.to_string()))
                .collect(),
            repo: "https://github.com/AD-SDL/fom_module.git".to_string(),
        }
    }

    /// Contents of the resource catalog, verbatim.
    ///
    /// Returns an empty string when no catalog is configured. A configured
    /// path that cannot be read is a loud error, never a silent empty
    /// result.
    pub async fn resources(&self) -> AppResult<String> {
        let Some(path) = &self.resources_path else {
            return Ok(String::new());
        };
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FomError::ResourceRead {
                path: path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::find_action;
    use std::io::Write;

    fn reporter(resources_path: Option<PathBuf>) -> StatusReporter {
        let state = Arc::new(StateCell::new());
        state.startup_complete();
        StatusReporter::new("fom", state, resources_path)
    }

    #[test]
    fn test_about_matches_dispatcher_registry() {
        let info = reporter(None).about();
        assert_eq!(info.actions.len(), ACTIONS.len());
        for handle in info.actions.keys() {
            assert!(
                find_action(handle).is_some(),
                "about() lists '{handle}' but the dispatcher does not resolve it"
            );
        }
        for spec in ACTIONS {
            assert!(
                info.actions.contains_key(spec.handle),
                "dispatcher resolves '{}' but about() does not list it",
                spec.handle
            );
        }
    }

    #[tokio::test]
    async fn test_no_catalog_is_empty_not_error() {
        let contents = reporter(None).resources().await.expect("no catalog is ok");
        assert_eq!(contents, "");
    }

    #[tokio::test]
    async fn test_catalog_contents_verbatim() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "foo").expect("write");
        let contents = reporter(Some(file.path().to_path_buf()))
            .resources()
            .await
            .expect("readable catalog");
        assert_eq!(contents, "foo");
    }

    #[tokio::test]
    async fn test_missing_catalog_is_loud() {
        let err = reporter(Some(PathBuf::from("/nonexistent/catalog.yaml")))
            .resources()
            .await
            .expect_err("unreadable configured path must error");
        assert!(matches!(err, FomError::ResourceRead { .. }));
    }
}
