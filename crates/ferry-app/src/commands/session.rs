//! Terminal session methods.
//!
//! Unknown or closed session ids are not errors: they answer `false` or
//! `null` like any other failed operation.

use ferry_pty::SessionId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArgs {
    cwd: Option<String>,
    shell_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArgs {
    session_id: SessionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryArgs {
    session_id: SessionId,
    columns: u16,
    rows: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteArgs {
    session_id: SessionId,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePointArgs {
    session_id: SessionId,
    code_point: u32,
    #[serde(default)]
    prepend_escape: bool,
}

/// Spawn a session; answers its id, or `null` if the shell failed to start.
pub fn create_session(state: &AppState, args: CreateArgs) -> Value {
    match state
        .multiplexer
        .create_session(args.cwd.as_deref(), args.shell_path.as_deref())
    {
        Ok(id) => json!(id),
        Err(e) => {
            log::error!("failed to create session: {e}");
            Value::Null
        }
    }
}

pub fn initialize_session(state: &AppState, args: GeometryArgs) -> Value {
    json!(state
        .multiplexer
        .initialize_session(&args.session_id, args.columns, args.rows))
}

pub fn write_to_session(state: &AppState, args: WriteArgs) -> Value {
    json!(state
        .multiplexer
        .write_to_session(&args.session_id, args.data.as_bytes()))
}

pub fn write_code_point(state: &AppState, args: CodePointArgs) -> Value {
    json!(state
        .multiplexer
        .write_code_point(&args.session_id, args.code_point, args.prepend_escape))
}

pub fn resize_session(state: &AppState, args: GeometryArgs) -> Value {
    json!(state
        .multiplexer
        .resize_session(&args.session_id, args.columns, args.rows))
}

pub fn close_session(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.close_session(&args.session_id))
}

pub fn close_all_sessions(state: &AppState) -> Value {
    let closed = state.multiplexer.close_all();
    log::info!("closed {closed} sessions");
    Value::Null
}

pub fn session_cwd(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.session_cwd(&args.session_id))
}

pub fn session_title(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.session_title(&args.session_id))
}

pub fn is_session_running(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.is_session_running(&args.session_id))
}

pub fn session_geometry(state: &AppState, args: SessionArgs) -> Value {
    match state.multiplexer.session_geometry(&args.session_id) {
        Some((columns, rows)) => json!({ "columns": columns, "rows": rows }),
        None => Value::Null,
    }
}

pub fn session_exit_status(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.session_exit_status(&args.session_id))
}

pub fn session_transcript(state: &AppState, args: SessionArgs) -> Value {
    json!(state.multiplexer.session_transcript(&args.session_id))
}

pub fn session_count(state: &AppState) -> Value {
    json!(state.multiplexer.session_count())
}

pub fn active_sessions(state: &AppState) -> Value {
    json!(state.multiplexer.list_sessions())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{harness, Harness};
    use super::super::{route, Reply};
    use ferry_pty::SessionEventKind;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    fn ready(h: &Harness, method: &str, args: Value) -> Value {
        match route(&h.state, method, args) {
            Ok(Reply::Ready(value)) => value,
            Ok(Reply::Deferred(_)) => panic!("{method} should answer immediately"),
            Err(e) => panic!("{method} failed: {e}"),
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let h = harness();

        let id = ready(&h, "createSession", Value::Null);
        let id = id.as_str().expect("session id").to_string();
        assert_eq!(ready(&h, "getSessionCount", Value::Null), json!(1));
        assert_eq!(ready(&h, "getActiveSessions", Value::Null), json!([id]));
        assert_eq!(ready(&h, "isSessionRunning", json!({"sessionId": id})), json!(true));
        assert_eq!(ready(&h, "getSessionGeometry", json!({"sessionId": id})), Value::Null);

        let sized = json!({"sessionId": id, "columns": 80, "rows": 24});
        assert_eq!(ready(&h, "initializeSession", sized), json!(true));
        let resized = json!({"sessionId": id, "columns": 120, "rows": 40});
        assert_eq!(ready(&h, "resizeSession", resized), json!(true));
        assert_eq!(
            ready(&h, "getSessionGeometry", json!({"sessionId": id})),
            json!({"columns": 120, "rows": 40})
        );
        assert_eq!(ready(&h, "getSessionExitStatus", json!({"sessionId": id})), Value::Null);
        assert!(ready(&h, "getSessionCwd", json!({"sessionId": id})).is_string());

        assert_eq!(ready(&h, "closeSession", json!({"sessionId": id})), json!(true));
        assert_eq!(ready(&h, "closeSession", json!({"sessionId": id})), json!(false));
        assert_eq!(ready(&h, "getSessionCount", Value::Null), json!(0));
    }

    #[test]
    fn test_unknown_session_answers() {
        let h = harness();
        let missing = json!({"sessionId": "missing"});

        assert_eq!(
            ready(&h, "writeToSession", json!({"sessionId": "missing", "data": "ls\n"})),
            json!(false)
        );
        assert_eq!(
            ready(&h, "writeCodePoint", json!({"sessionId": "missing", "codePoint": 97})),
            json!(false)
        );
        assert_eq!(ready(&h, "isSessionRunning", missing.clone()), json!(false));
        assert_eq!(ready(&h, "getSessionCwd", missing.clone()), Value::Null);
        assert_eq!(ready(&h, "getSessionTitle", missing.clone()), Value::Null);
        assert_eq!(ready(&h, "getSessionTranscript", missing.clone()), Value::Null);
        assert_eq!(ready(&h, "getSessionGeometry", missing), Value::Null);
    }

    #[test]
    fn test_create_with_missing_shell_answers_null() {
        let h = harness();
        let args = json!({"shellPath": "/nonexistent/ferry-shell"});
        assert_eq!(ready(&h, "createSession", args), Value::Null);
        assert_eq!(ready(&h, "getSessionCount", Value::Null), json!(0));
    }

    #[test]
    fn test_write_produces_output_event() {
        let mut h = harness();
        let id = ready(&h, "createSession", Value::Null);
        let id = id.as_str().unwrap().to_string();
        ready(&h, "initializeSession", json!({"sessionId": id, "columns": 80, "rows": 24}));

        let args = json!({"sessionId": id, "data": "printf 'FERRY_%s\\n' HI\n"});
        assert_eq!(ready(&h, "writeToSession", args), json!(true));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            match h.events.try_recv() {
                Ok(event) => {
                    seen = event.session_id == id
                        && matches!(&event.kind, SessionEventKind::TextChanged(text)
                            if text.contains("FERRY_HI"));
                }
                Err(_) => std::thread::sleep(Duration::from_millis(20)),
            }
        }
        assert!(seen, "expected output containing FERRY_HI");

        let transcript = ready(&h, "getSessionTranscript", json!({"sessionId": id}));
        assert!(transcript.as_str().unwrap().contains("FERRY_HI"));
    }

    #[test]
    fn test_close_all_sessions() {
        let h = harness();
        ready(&h, "createSession", Value::Null);
        ready(&h, "createSession", Value::Null);

        assert_eq!(ready(&h, "closeAllSessions", Value::Null), Value::Null);
        assert_eq!(ready(&h, "getActiveSessions", Value::Null), json!([]));
    }
}
