use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

use crate::pending::ReplyHandle;
use crate::result::RemoteReply;

/// What the remote side does with the terminal when running a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Run in a new session and switch to it.
    SwitchToNew,
    /// Run without leaving the current session.
    KeepCurrent,
}

impl SessionAction {
    pub fn for_background(background: bool) -> Self {
        if background {
            SessionAction::KeepCurrent
        } else {
            SessionAction::SwitchToNew
        }
    }

    /// Wire value understood by the remote run-command service.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::SwitchToNew => "0",
            SessionAction::KeepCurrent => "1",
        }
    }
}

/// One request to run a program through the execution facility.
#[derive(Debug)]
pub struct Invocation {
    pub executable: String,
    pub arguments: Vec<String>,
    pub working_directory: Option<String>,
    pub background: bool,
    pub session_action: SessionAction,
    pub reply: ReplyHandle,
}

/// Why an invocation could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Cannot start the remote service while the app is in the background. Retry with the app in the foreground.")]
    BackgroundRestricted,
    #[error("failed to start command: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// External process boundary that runs invocations.
///
/// `start` must return promptly. The reply, if any, arrives later through
/// the invocation's [`ReplyHandle`].
pub trait ExecutionFacility: Send + Sync {
    /// Whether the facility can be reached at all.
    fn is_available(&self) -> bool {
        true
    }

    fn start(&self, invocation: Invocation) -> Result<(), StartError>;
}

/// Runs invocations as local child processes.
///
/// Must be used from within a Tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct LocalShellFacility;

impl ExecutionFacility for LocalShellFacility {
    fn start(&self, invocation: Invocation) -> Result<(), StartError> {
        let mut cmd = Command::new(&invocation.executable);
        cmd.args(&invocation.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_directory {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;
        let reply = invocation.reply;
        log::debug!(
            "request {} running as pid {:?} (action {})",
            reply.token(),
            child.id(),
            invocation.session_action.as_str()
        );

        tokio::spawn(async move {
            let reply_msg = match child.wait_with_output().await {
                Ok(output) => RemoteReply::new(
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                ),
                Err(e) => RemoteReply {
                    stderr: Some(format!("failed to collect output: {e}")),
                    ..RemoteReply::default()
                },
            };
            reply.send(reply_msg);
        });
        Ok(())
    }
}
