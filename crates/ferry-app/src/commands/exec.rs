//! Command execution and remote-app queries.

use ferry_exec::PendingResult;
use serde::Deserialize;
use serde_json::{json, Value};

use super::MethodError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteArgs {
    command: String,
    working_directory: Option<String>,
    #[serde(default)]
    background: bool,
}

#[derive(Debug, Deserialize)]
pub struct PermissionArgs {
    permission: String,
}

pub fn is_remote_app_installed(state: &AppState) -> Value {
    json!(state.remote.is_installed())
}

pub fn open_remote_app(state: &AppState) -> Value {
    json!(state.remote.open())
}

pub fn check_permission(state: &AppState, args: PermissionArgs) -> Value {
    json!(state.permissions.is_granted(&args.permission))
}

/// Submit a command; the result is delivered when it arrives.
pub fn execute_command(state: &AppState, args: ExecuteArgs) -> Result<PendingResult, MethodError> {
    if args.command.is_empty() {
        return Err(MethodError::InvalidArgument("Command is required".to_string()));
    }
    let pending = state.dispatcher.submit(
        &args.command,
        args.working_directory.as_deref(),
        args.background,
    )?;
    Ok(pending)
}
