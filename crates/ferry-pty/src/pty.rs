use std::io::{Read, Write};
use std::path::PathBuf;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

/// Errors from PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("PTY spawn failed: {0}")]
    SpawnFailed(String),
    #[error("PTY I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),
    #[error("invalid code point: {0:#x}")]
    InvalidCodePoint(u32),
    #[error("session input is closed")]
    InputClosed,
}

/// Everything needed to start a shell inside a new PTY.
///
/// The environment is replaced wholesale: the child sees only `env`.
#[derive(Clone, Debug)]
pub struct SpawnSpec {
    pub shell: String,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Owns a portable-pty child process, master pair, reader, and writer.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    child: Option<Box<dyn Child + Send + Sync>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
}

impl PtyHandle {
    /// Spawn `spec.shell` in a new PTY with the given dimensions.
    pub fn spawn(spec: &SpawnSpec, cols: u16, rows: u16) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&spec.shell);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);
        cmd.env_clear();
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn {}: {e}", spec.shell)))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        let killer = child.clone_killer();
        let pid = child.process_id();

        Ok(Self {
            master: pair.master,
            reader,
            writer,
            child: Some(child),
            killer,
            pid,
        })
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    /// Write bytes to the PTY master (user input -> shell).
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Blocking read from the PTY master (shell output -> us).
    ///
    /// Callers should invoke this from a dedicated I/O thread.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, PtyError> {
        let n = self.reader.read(buf)?;
        Ok(n)
    }

    /// Get the child process exit status if it has exited.
    ///
    /// Returns `None` while it runs, or once the child was handed off with
    /// [`take_child`](Self::take_child).
    pub fn try_wait(&mut self) -> Option<u32> {
        match self.child.as_mut()?.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            _ => None,
        }
    }

    /// Ask the child process to terminate.
    pub fn kill(&mut self) -> Result<(), PtyError> {
        self.killer.kill()?;
        Ok(())
    }

    /// OS process id of the child, when the platform exposes one.
    pub fn process_id(&self) -> Option<u32> {
        self.pid
    }

    /// Extract the PTY reader for use in a dedicated I/O thread.
    ///
    /// After calling this, [`read`](Self::read) always reports EOF.
    pub fn take_reader(&mut self) -> Box<dyn Read + Send> {
        std::mem::replace(&mut self.reader, Box::new(std::io::empty()))
    }

    /// Extract the PTY writer for use in a dedicated writer thread.
    ///
    /// After calling this, [`write`](Self::write) discards its input.
    pub fn take_writer(&mut self) -> Box<dyn Write + Send> {
        std::mem::replace(&mut self.writer, Box::new(std::io::sink()))
    }

    /// Extract the child so another thread can block on its exit.
    ///
    /// [`kill`](Self::kill) keeps working after the hand-off.
    pub fn take_child(&mut self) -> Option<Box<dyn Child + Send + Sync>> {
        self.child.take()
    }
}

#[cfg(test)]
pub(crate) fn test_spec() -> SpawnSpec {
    SpawnSpec {
        shell: "/bin/sh".to_string(),
        cwd: std::env::temp_dir(),
        args: Vec::new(),
        env: vec![
            ("TERM".to_string(), "xterm-256color".to_string()),
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
        ],
    }
}
