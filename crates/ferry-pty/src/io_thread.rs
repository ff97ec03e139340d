//! Per-session I/O threads.
//!
//! Each terminal session gets two dedicated OS threads because PTY reads and
//! writes both block. The reader and the writer are owned by their threads
//! directly (not behind the session mutex), so neither ever stalls resizes or
//! queries. Input reaches the writer thread through an unbounded channel,
//! which keeps callers from waiting on a shell that is not reading.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portable_pty::Child;
use tokio::sync::mpsc;

use crate::event::{EventSink, SessionEvent, SessionEventKind, SessionId};
use crate::session::SharedCore;

/// Bytes queued for a session's PTY input.
pub(crate) type InputSender = mpsc::UnboundedSender<Vec<u8>>;

fn short_id(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}

/// Start the write loop for a session on a dedicated OS thread.
///
/// The thread exits once every [`InputSender`] is dropped or the PTY
/// refuses a write.
pub(crate) fn start_writer_thread(
    session_id: &str,
    mut writer: Box<dyn Write + Send>,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
) -> std::io::Result<()> {
    let name = format!("pty-in-{}", short_id(session_id));
    let session_id = session_id.to_string();
    std::thread::Builder::new().name(name).spawn(move || {
        while let Some(data) = input.blocking_recv() {
            if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                log::warn!("session {session_id}: PTY write failed: {e}");
                return;
            }
        }
    })?;
    Ok(())
}

/// Start the read loop for a session on a dedicated OS thread.
///
/// The thread exits at EOF, waits for the child, records its exit status and
/// emits a final [`SessionEventKind::Finished`].
pub(crate) fn start_io_thread(
    session_id: SessionId,
    core: SharedCore,
    reader: Box<dyn Read + Send>,
    child: Box<dyn Child + Send + Sync>,
    running: Arc<AtomicBool>,
    input: InputSender,
    sink: EventSink,
) -> std::io::Result<()> {
    let name = format!("pty-io-{}", short_id(&session_id));
    std::thread::Builder::new().name(name).spawn(move || {
        let mut relay = Relay { session_id, sink, open: true };
        io_loop(&core, reader, &input, &mut relay);
        drop(input);

        let code = wait_for_exit(child);
        running.store(false, Ordering::SeqCst);
        core.lock().unwrap_or_else(|e| e.into_inner()).exit_status = Some(code);

        log::debug!("session {} finished with exit code {code}", relay.session_id);
        relay.send(SessionEventKind::Finished(code));
    })?;
    Ok(())
}

/// Forwards events into the shared sink. A blocking send gives backpressure:
/// while the consumer lags, the PTY is not read and the shell is throttled.
struct Relay {
    session_id: SessionId,
    sink: EventSink,
    open: bool,
}

impl Relay {
    fn send(&mut self, kind: SessionEventKind) {
        if !self.open {
            return;
        }
        let event = SessionEvent {
            session_id: self.session_id.clone(),
            kind,
        };
        if self.sink.blocking_send(event).is_err() {
            // Receiver gone: keep draining the PTY so the child never blocks.
            self.open = false;
        }
    }
}

fn io_loop(
    core: &SharedCore,
    mut reader: Box<dyn Read + Send>,
    input: &InputSender,
    relay: &mut Relay,
) {
    let mut buf = [0u8; 65536];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return, // EOF: PTY closed
            Ok(n) => n,
            Err(_) => return, // read error, PTY likely closed
        };

        // Lock the session briefly to feed bytes into VT. Write-backs are
        // queued behind user input, never written under the lock.
        let events = {
            let mut state = core.lock().unwrap_or_else(|e| e.into_inner());
            state.vt.write(&buf[..n]);
            for data in state.vt.take_pty_writes() {
                if input.send(data.into_bytes()).is_err() {
                    log::warn!("session {}: write-back dropped, input closed", relay.session_id);
                }
            }
            state.title = state.vt.title();

            let mut events: Vec<SessionEventKind> = state
                .vt
                .take_events()
                .into_iter()
                .map(SessionEventKind::from)
                .collect();
            events.push(SessionEventKind::TextChanged(state.vt.transcript_text()));
            events
        };
        // Lock released before sending so a slow consumer never blocks commands.

        for kind in events {
            relay.send(kind);
        }
    }
}

fn wait_for_exit(mut child: Box<dyn Child + Send + Sync>) -> i32 {
    match child.wait() {
        Ok(status) => status.exit_code() as i32,
        Err(e) => {
            log::warn!("failed to wait for session process: {e}");
            -1
        }
    }
}
