//! Request routing.
//!
//! Each request names a method; the router validates its arguments, runs
//! the matching handler on the blocking pool and posts exactly one response
//! or error frame to the outbox. Command execution answers later, from its
//! own task.

pub mod exec;
pub mod session;

use std::sync::Arc;

use ferry_exec::{CommandResult, DispatchError, PendingResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::ipc::{ErrorCode, Outbound, Request};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum MethodError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("method {0} is not implemented")]
    NotImplemented(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl MethodError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MethodError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            MethodError::NotImplemented(_) => ErrorCode::NotImplemented,
            MethodError::Dispatch(DispatchError::PermissionDenied(_)) => ErrorCode::PermissionDenied,
        }
    }
}

/// What a handler produced.
pub enum Reply {
    Ready(Value),
    /// Answered once the command finishes or times out.
    Deferred(PendingResult),
}

/// Decode a method's arguments. Missing `args` counts as an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, MethodError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| MethodError::InvalidArgument(e.to_string()))
}

pub fn route(state: &AppState, method: &str, args: Value) -> Result<Reply, MethodError> {
    let ready = match method {
        "isRemoteAppInstalled" | "isTermuxInstalled" => exec::is_remote_app_installed(state),
        "openRemoteApp" | "openTermux" => exec::open_remote_app(state),
        "checkPermission" => exec::check_permission(state, parse_args(args)?),
        "executeCommand" => {
            return exec::execute_command(state, parse_args(args)?).map(Reply::Deferred)
        }

        "createSession" => session::create_session(state, parse_args(args)?),
        "initializeSession" => session::initialize_session(state, parse_args(args)?),
        "writeToSession" => session::write_to_session(state, parse_args(args)?),
        "writeCodePoint" => session::write_code_point(state, parse_args(args)?),
        "resizeSession" => session::resize_session(state, parse_args(args)?),
        "closeSession" => session::close_session(state, parse_args(args)?),
        "closeAllSessions" => session::close_all_sessions(state),
        "getSessionCwd" => session::session_cwd(state, parse_args(args)?),
        "getSessionTitle" => session::session_title(state, parse_args(args)?),
        "isSessionRunning" => session::is_session_running(state, parse_args(args)?),
        "getSessionGeometry" => session::session_geometry(state, parse_args(args)?),
        "getSessionExitStatus" => session::session_exit_status(state, parse_args(args)?),
        "getSessionTranscript" => session::session_transcript(state, parse_args(args)?),
        "getSessionCount" => session::session_count(state),
        "getActiveSessions" => session::active_sessions(state),

        other => return Err(MethodError::NotImplemented(other.to_string())),
    };
    Ok(Reply::Ready(ready))
}

/// Route one request and post its answer to the outbox.
///
/// Handlers may wait on a session lock, so they run off the async workers.
/// Awaiting each one keeps requests applied in arrival order.
pub async fn handle_request(state: &Arc<AppState>, request: Request) {
    let Request { id, method, args } = request;
    log::debug!("request {id}: {method}");

    let routed = {
        let state = Arc::clone(state);
        let method = method.clone();
        tokio::task::spawn_blocking(move || route(&state, &method, args)).await
    };
    let routed = match routed {
        Ok(routed) => routed,
        Err(e) => {
            log::error!("request {id} ({method}) aborted: {e}");
            let frame = Outbound::error(Some(id), ErrorCode::Internal, format!("{method} aborted"));
            let _ = state.outbox.send(frame).await;
            return;
        }
    };

    let frame = match routed {
        Ok(Reply::Ready(result)) => Outbound::response(id, result),
        Ok(Reply::Deferred(pending)) => {
            let outbox = state.outbox.clone();
            tokio::spawn(async move {
                let result = pending
                    .await
                    .unwrap_or_else(|_| CommandResult::failure("request was dropped"));
                let _ = outbox.send(Outbound::response(id, result)).await;
            });
            return;
        }
        Err(e) => {
            log::warn!("request {id} ({method}) failed: {e}");
            Outbound::error(Some(id), e.code(), e.to_string())
        }
    };

    if state.outbox.send(frame).await.is_err() {
        log::debug!("outbox closed, dropping answer to request {id}");
    }
}
