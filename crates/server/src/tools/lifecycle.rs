//! install and activate tools.
//!
//! Drive the version lifecycle from the host.

use harbor_client::{Event, EventOutcome, VersionState, Worker};
use harbor_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutput {
    /// Precache store that was populated.
    pub store: String,
    /// Number of manifest entries written.
    pub entries: usize,
    pub state: VersionState,
}

/// Parameters for the activate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ActivateParams {
    /// Clients still controlled by the previous version.
    #[serde(default)]
    pub clients_on_previous: usize,
}

/// Output from the activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateOutput {
    /// False while waiting on clients of the previous version.
    pub activated: bool,
    /// Stale stores removed during activation.
    pub deleted: Vec<String>,
    pub state: VersionState,
}

pub async fn install(worker: &Worker) -> Result<InstallOutput, Error> {
    let entries = match worker.dispatch(Event::Install).await? {
        EventOutcome::Installed { entries } => entries,
        other => return Err(Error::InvalidInput(format!("unexpected install outcome: {other:?}"))),
    };
    let state = worker.state().lifecycle.state().await;
    Ok(InstallOutput { store: worker.state().stores.precache.clone(), entries, state })
}

pub async fn activate(worker: &Worker, params: ActivateParams) -> Result<ActivateOutput, Error> {
    let event = Event::Activate { clients_on_previous: params.clients_on_previous };
    let (activated, deleted) = match worker.dispatch(event).await? {
        EventOutcome::Activated { deleted } => (true, deleted),
        EventOutcome::Waiting => (false, Vec::new()),
        other => return Err(Error::InvalidInput(format!("unexpected activate outcome: {other:?}"))),
    };
    let state = worker.state().lifecycle.state().await;
    Ok(ActivateOutput { activated, deleted, state })
}

/// Implementation of the install tool.
pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&install(worker).await?)
}

/// Implementation of the activate tool.
pub async fn activate_impl(worker: &Worker, params: ActivateParams) -> Result<CallToolResult, McpError> {
    json_result(&activate(worker, params).await?)
}
