//! ferry-pty: PTY sessions and the session multiplexer for Ferry.
//!
//! This crate sits between the PTY (real shell process) and the VT terminal
//! (screen state). It reads shell output, feeds it into `VtTerminal`, and
//! posts tagged events for every session into one shared channel.
//!
//! # Architecture
//!
//! - [`PtyHandle`]: low-level PTY process management (spawn, read, write, resize).
//! - [`TerminalSession`]: pairs a `PtyHandle` with a `VtTerminal` and a
//!   dedicated I/O thread.
//! - [`Multiplexer`]: the token-keyed table of live sessions.
//! - [`SessionProfile`]: shell, directories and environment every session gets.

pub mod event;
mod io_thread;
pub mod multiplexer;
pub mod profile;
pub mod pty;
pub mod session;

pub use event::{EventSink, SessionEvent, SessionEventKind, SessionId};
pub use multiplexer::Multiplexer;
pub use profile::SessionProfile;
pub use pty::{PtyError, PtyHandle, SpawnSpec};
pub use session::TerminalSession;
