//! Wire types for the JSON-lines front door.
//!
//! Requests arrive one per line on stdin. Everything sent back, whether a
//! response, an error or a session event, is an [`Outbound`] frame tagged
//! by `"type"`.

use ferry_pty::{SessionEvent, SessionEventKind, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    NotImplemented,
    PermissionDenied,
    Internal,
}

/// Push events, named the way the host listens for them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum TerminalEvent {
    #[serde(rename = "onTerminalOutput")]
    Output { output: String },
    #[serde(rename = "onTitleChanged")]
    TitleChanged { title: String },
    #[serde(rename = "onSessionFinished")]
    Finished {
        #[serde(rename = "exitCode")]
        exit_code: i32,
    },
    #[serde(rename = "onBell")]
    Bell,
    #[serde(rename = "onCopyToClipboard")]
    CopyToClipboard { text: String },
    #[serde(rename = "onPasteFromClipboard")]
    PasteFromClipboard,
}

impl From<SessionEventKind> for TerminalEvent {
    fn from(kind: SessionEventKind) -> Self {
        match kind {
            SessionEventKind::TextChanged(output) => TerminalEvent::Output { output },
            SessionEventKind::TitleChanged(title) => TerminalEvent::TitleChanged { title },
            SessionEventKind::Finished(exit_code) => TerminalEvent::Finished { exit_code },
            SessionEventKind::Bell => TerminalEvent::Bell,
            SessionEventKind::CopyToClipboard(text) => TerminalEvent::CopyToClipboard { text },
            SessionEventKind::PasteFromClipboard => TerminalEvent::PasteFromClipboard,
        }
    }
}

/// One line written to stdout.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    Response {
        id: u64,
        result: Value,
    },
    Error {
        /// `None` when the request line was too broken to carry an id.
        id: Option<u64>,
        code: ErrorCode,
        message: String,
    },
    Event {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(flatten)]
        event: TerminalEvent,
    },
}

impl Outbound {
    pub fn response(id: u64, result: impl Serialize) -> Self {
        let result = serde_json::to_value(result).unwrap_or(Value::Null);
        Outbound::Response { id, result }
    }

    pub fn error(id: Option<u64>, code: ErrorCode, message: impl Into<String>) -> Self {
        Outbound::Error {
            id,
            code,
            message: message.into(),
        }
    }
}

impl From<SessionEvent> for Outbound {
    fn from(event: SessionEvent) -> Self {
        Outbound::Event {
            session_id: event.session_id,
            event: event.kind.into(),
        }
    }
}

/// Parse one request line. A line that cannot be parsed becomes the
/// error frame to send back, keeping its id when one can be recovered.
pub fn parse_request(line: &str) -> Result<Request, Outbound> {
    serde_json::from_str(line).map_err(|e| {
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|value| value.get("id").and_then(Value::as_u64));
        Outbound::error(id, ErrorCode::InvalidArgument, format!("malformed request: {e}"))
    })
}
