use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ferry_vt::VtTerminal;
use tokio::sync::mpsc;

use crate::event::{EventSink, SessionId};
use crate::io_thread::{start_io_thread, start_writer_thread, InputSender};
use crate::pty::{PtyError, PtyHandle, SpawnSpec};

/// Mutable session state shared between the I/O thread and callers.
pub(crate) struct SessionCore {
    pub(crate) vt: VtTerminal,
    pub(crate) pty: PtyHandle,
    pub(crate) geometry: Option<(u16, u16)>,
    pub(crate) title: Option<String>,
    pub(crate) exit_status: Option<i32>,
}

pub(crate) type SharedCore = Arc<Mutex<SessionCore>>;

/// A terminal session that pairs a PTY process with a VT terminal emulator.
///
/// A dedicated I/O thread reads shell output, feeds it to the emulator and
/// posts events into the session's [`EventSink`]. A second thread owns the
/// PTY writer, so input is only ever queued. Every method takes `&self` so a
/// session can be shared between the caller and those threads.
pub struct TerminalSession {
    id: SessionId,
    spec: SpawnSpec,
    pid: Option<u32>,
    core: SharedCore,
    input: InputSender,
    running: Arc<AtomicBool>,
    kill_sent: AtomicBool,
}

impl TerminalSession {
    /// Spawn the shell described by `spec` and start relaying its events.
    ///
    /// `cols`/`rows` only size the PTY provisionally; the session reports no
    /// geometry until [`initialize`](Self::initialize) is called.
    pub fn spawn(
        id: SessionId,
        spec: SpawnSpec,
        cols: u16,
        rows: u16,
        scrollback: usize,
        sink: EventSink,
    ) -> Result<Self, PtyError> {
        let mut pty = PtyHandle::spawn(&spec, cols, rows)?;
        let pid = pty.process_id();

        // The I/O threads own the reader, the writer and the child so they
        // can block on any of them without holding the session lock.
        let reader = pty.take_reader();
        let writer = pty.take_writer();
        let child = pty
            .take_child()
            .ok_or_else(|| PtyError::SpawnFailed("child already taken".to_string()))?;

        let core = Arc::new(Mutex::new(SessionCore {
            vt: VtTerminal::new(cols, rows, scrollback),
            pty,
            geometry: None,
            title: None,
            exit_status: None,
        }));
        let running = Arc::new(AtomicBool::new(true));

        let (input, input_rx) = mpsc::unbounded_channel();
        start_writer_thread(&id, writer, input_rx)?;
        start_io_thread(
            id.clone(),
            Arc::clone(&core),
            reader,
            child,
            Arc::clone(&running),
            input.clone(),
            sink,
        )?;

        Ok(Self {
            id,
            spec,
            pid,
            core,
            input,
            running,
            kill_sent: AtomicBool::new(false),
        })
    }

    /// Returns the session's unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shell executable the session was started with.
    pub fn shell(&self) -> &str {
        &self.spec.shell
    }

    /// Working directory the session was started in.
    pub fn initial_cwd(&self) -> &Path {
        &self.spec.cwd
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give the terminal its first real size.
    pub fn initialize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.resize(cols, rows)?;
        log::debug!("session {} initialized with {cols}x{rows}", self.id);
        Ok(())
    }

    /// Resize both the PTY and VT terminal.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let mut core = self.lock();
        core.pty.resize(cols, rows)?;
        core.vt.resize(cols, rows);
        core.geometry = Some((cols, rows));
        Ok(())
    }

    /// Queue user input for the PTY. Never waits for the shell to read it.
    pub fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
        self.input
            .send(data.to_vec())
            .map_err(|_| PtyError::InputClosed)
    }

    /// Write one code point as UTF-8, optionally preceded by ESC.
    pub fn write_code_point(&self, code_point: u32, prepend_escape: bool) -> Result<(), PtyError> {
        let bytes = encode_code_point(code_point, prepend_escape)?;
        self.write_input(&bytes)
    }

    /// Current geometry, or `None` until the session has been initialized.
    pub fn geometry(&self) -> Option<(u16, u16)> {
        self.lock().geometry
    }

    /// Get the current session title (set by shell via OSC escape sequences).
    pub fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }

    /// Full transcript text: scrollback plus the visible screen.
    pub fn transcript(&self) -> String {
        self.lock().vt.transcript_text()
    }

    /// Returns `false` once the shell process has exited.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Exit status, once the process has finished.
    pub fn exit_status(&self) -> Option<i32> {
        self.lock().exit_status
    }

    /// Working directory of the shell right now.
    ///
    /// Read from the process on Linux; elsewhere, or once the process is
    /// gone, the initial working directory is reported.
    pub fn cwd(&self) -> PathBuf {
        if self.is_running() {
            if let Some(path) = live_cwd(self.pid) {
                return path;
            }
        }
        self.spec.cwd.clone()
    }

    /// Terminate the shell if it is still running.
    ///
    /// At most one kill is ever sent. Returns `true` if this call sent it.
    /// The I/O thread observes the exit and emits the finished event.
    pub fn finish_if_running(&self) -> bool {
        if !self.is_running() || self.kill_sent.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.lock().pty.kill() {
            log::warn!("session {}: failed to kill process: {e}", self.id);
        }
        true
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.finish_if_running();
    }
}

/// Encode a code point for the PTY, optionally preceded by ESC (0x1b).
pub fn encode_code_point(code_point: u32, prepend_escape: bool) -> Result<Vec<u8>, PtyError> {
    let c = char::from_u32(code_point).ok_or(PtyError::InvalidCodePoint(code_point))?;
    let mut bytes = Vec::with_capacity(5);
    if prepend_escape {
        bytes.push(0x1b);
    }
    let mut utf8 = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    Ok(bytes)
}

#[cfg(target_os = "linux")]
fn live_cwd(pid: Option<u32>) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/{}/cwd", pid?)).ok()
}

#[cfg(not(target_os = "linux"))]
fn live_cwd(_pid: Option<u32>) -> Option<PathBuf> {
    None
}
