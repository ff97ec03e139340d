use serde::{Deserialize, Serialize};

/// Diagnostic carried by a result synthesized on timeout.
pub const TIMEOUT_MESSAGE: &str = "timed out";

/// Normalized outcome of one submitted command.
///
/// `exit_code` is -1 when the command never ran or the result was
/// synthesized locally (timeout, start failure).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn from_exit(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A failure that never produced output.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::from_exit(-1, String::new(), stderr)
    }

    pub fn timed_out() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }
}

/// Reply as reported by the execution facility. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReply {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
}

impl RemoteReply {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
            exit_code: Some(exit_code),
        }
    }
}

impl From<RemoteReply> for CommandResult {
    fn from(reply: RemoteReply) -> Self {
        CommandResult::from_exit(
            reply.exit_code.unwrap_or(-1),
            reply.stdout.unwrap_or_default(),
            reply.stderr.unwrap_or_default(),
        )
    }
}
