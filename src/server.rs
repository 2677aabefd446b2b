//! REST control surface.
//!
//! Thin transport layer over the dispatcher and reporter; no business
//! logic lives here. Routes mirror the module's control-plane operations:
//!
//! - `GET /state` — current module state
//! - `GET /about` — module description and action registry
//! - `GET /resources` — resource catalog contents
//! - `POST /action` — execute one action (query parameters
//!   `action_handle`, `action_vars`)
//!
//! Action execution always answers with a structured step response; faults
//! never surface as bare transport errors.

use crate::action::{ActionDispatcher, ActionResult};
use crate::state::ModuleState;
use crate::status::{ModuleInfo, StatusReporter};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Shared per-request context: the dispatcher and reporter for this node.
pub struct NodeContext {
    /// Serializes all instrument access.
    pub dispatcher: ActionDispatcher,
    /// Answers introspection queries.
    pub reporter: StatusReporter,
}

/// Outcome discriminator for step responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Reply for a plain action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResponse {
    pub action_response: StepStatus,
    pub action_msg: String,
    pub action_log: String,
}

/// Reply for a file-producing action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepFileResponse {
    pub action_response: StepStatus,
    pub path: String,
    pub action_log: String,
}

#[derive(Serialize)]
struct StateReply {
    #[serde(rename = "State")]
    state: ModuleState,
}

#[derive(Serialize)]
struct ResourcesReply {
    #[serde(rename = "Resources")]
    resources: String,
}

#[derive(Deserialize)]
struct ActionParams {
    action_handle: String,
    action_vars: String,
}

/// Builds the REST router over a node context.
pub fn router(ctx: Arc<NodeContext>) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/about", get(about))
        .route("/resources", get(resources))
        .route("/action", post(do_action))
        .with_state(ctx)
}

async fn get_state(State(ctx): State<Arc<NodeContext>>) -> Json<StateReply> {
    Json(StateReply {
        state: ctx.reporter.state(),
    })
}

async fn about(State(ctx): State<Arc<NodeContext>>) -> Json<ModuleInfo> {
    Json(ctx.reporter.about())
}

async fn resources(State(ctx): State<Arc<NodeContext>>) -> Response {
    match ctx.reporter.resources().await {
        Ok(resources) => Json(ResourcesReply { resources }).into_response(),
        Err(err) => {
            error!("Resource catalog read failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn do_action(
    State(ctx): State<Arc<NodeContext>>,
    Query(params): Query<ActionParams>,
) -> Response {
    let result = ctx
        .dispatcher
        .dispatch(&params.action_handle, &params.action_vars)
        .await;
    match result {
        ActionResult::Succeeded { message, log } => Json(StepResponse {
            action_response: StepStatus::Succeeded,
            action_msg: message,
            action_log: log,
        })
        .into_response(),
        ActionResult::SucceededWithFile { file_path, log } => Json(StepFileResponse {
            action_response: StepStatus::Succeeded,
            path: file_path,
            action_log: log,
        })
        .into_response(),
        ActionResult::Failed { message, log } => Json(StepResponse {
            action_response: StepStatus::Failed,
            action_msg: message,
            action_log: log,
        })
        .into_response(),
    }
}
