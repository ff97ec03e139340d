use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::event::{EventSink, SessionId};
use crate::profile::{SessionProfile, PROVISIONAL_COLS, PROVISIONAL_ROWS};
use crate::pty::{PtyError, SpawnSpec};
use crate::session::TerminalSession;

/// Owns the table of live terminal sessions.
///
/// Every session posts its events into the one [`EventSink`] given at
/// construction. Operations on unknown or closed tokens never panic: they
/// return `false` or `None`.
pub struct Multiplexer {
    sessions: Mutex<HashMap<SessionId, Arc<TerminalSession>>>,
    profile: SessionProfile,
    events: EventSink,
}

impl Multiplexer {
    /// Create a new, empty multiplexer.
    pub fn new(profile: SessionProfile, events: EventSink) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            profile,
            events,
        }
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<TerminalSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, id: &str) -> Option<Arc<TerminalSession>> {
        self.table().get(id).cloned()
    }

    /// Spawn a new session and return its token.
    ///
    /// `cwd` defaults to the profile's home and `shell` to its default shell.
    /// The session has no geometry until [`initialize_session`](Self::initialize_session).
    pub fn create_session(
        &self,
        cwd: Option<&str>,
        shell: Option<&str>,
    ) -> Result<SessionId, PtyError> {
        let id = Uuid::new_v4().to_string();
        let spec = SpawnSpec {
            shell: shell.unwrap_or(&self.profile.default_shell).to_string(),
            cwd: cwd.map(PathBuf::from).unwrap_or_else(|| self.profile.home.clone()),
            args: self.profile.args.clone(),
            env: self.profile.environment(),
        };

        log::info!(
            "creating session {id} with shell={}, cwd={}",
            spec.shell,
            spec.cwd.display()
        );

        let session = TerminalSession::spawn(
            id.clone(),
            spec,
            PROVISIONAL_COLS,
            PROVISIONAL_ROWS,
            self.profile.scrollback,
            self.events.clone(),
        )?;
        self.table().insert(id.clone(), Arc::new(session));
        Ok(id)
    }

    /// Give a session its initial size.
    pub fn initialize_session(&self, id: &str, cols: u16, rows: u16) -> bool {
        let Some(session) = self.get(id) else {
            log::error!("session {id} not found");
            return false;
        };
        match session.initialize(cols, rows) {
            Ok(()) => {
                log::info!("session {id} initialized with {cols}x{rows}");
                true
            }
            Err(e) => {
                log::error!("failed to initialize session {id}: {e}");
                false
            }
        }
    }

    /// Write raw bytes to a session's input.
    pub fn write_to_session(&self, id: &str, data: &[u8]) -> bool {
        self.get(id)
            .map(|session| report(id, "write", session.write_input(data)))
            .unwrap_or(false)
    }

    /// Write one code point, optionally prefixed with ESC.
    pub fn write_code_point(&self, id: &str, code_point: u32, prepend_escape: bool) -> bool {
        self.get(id)
            .map(|session| {
                report(id, "write code point", session.write_code_point(code_point, prepend_escape))
            })
            .unwrap_or(false)
    }

    pub fn resize_session(&self, id: &str, cols: u16, rows: u16) -> bool {
        self.get(id)
            .map(|session| report(id, "resize", session.resize(cols, rows)))
            .unwrap_or(false)
    }

    pub fn session_cwd(&self, id: &str) -> Option<String> {
        self.get(id)
            .map(|session| session.cwd().to_string_lossy().into_owned())
    }

    pub fn session_title(&self, id: &str) -> Option<String> {
        self.get(id)?.title()
    }

    pub fn is_session_running(&self, id: &str) -> bool {
        self.get(id).is_some_and(|session| session.is_running())
    }

    pub fn session_geometry(&self, id: &str) -> Option<(u16, u16)> {
        self.get(id)?.geometry()
    }

    pub fn session_exit_status(&self, id: &str) -> Option<i32> {
        self.get(id)?.exit_status()
    }

    pub fn session_transcript(&self, id: &str) -> Option<String> {
        self.get(id).map(|session| session.transcript())
    }

    /// Kill a session's process if needed and drop it from the table.
    ///
    /// Returns `false` when the token is unknown or was already closed.
    pub fn close_session(&self, id: &str) -> bool {
        let Some(session) = self.table().remove(id) else {
            return false;
        };
        session.finish_if_running();
        log::info!("session {id} closed");
        true
    }

    /// Close every live session. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(SessionId, Arc<TerminalSession>)> = self.table().drain().collect();
        for (id, session) in &drained {
            session.finish_if_running();
            log::info!("session {id} closed");
        }
        drained.len()
    }

    pub fn session_count(&self) -> usize {
        self.table().len()
    }

    /// List all live session tokens, sorted.
    pub fn list_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.table().keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn report(id: &str, op: &str, result: Result<(), PtyError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("session {id}: {op} failed: {e}");
            false
        }
    }
}
