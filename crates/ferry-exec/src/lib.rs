//! ferry-exec: one-shot command dispatch with reply correlation.
//!
//! A [`Dispatcher`] hands each command to an [`ExecutionFacility`] as
//! `<shell> -c <command>`, tracks it in a [`PendingTable`] under a fresh
//! token, and resolves the caller's [`PendingResult`] exactly once with the
//! reply, a start failure, or a timeout.

pub mod dispatcher;
pub mod facility;
pub mod pending;
pub mod permission;
pub mod result;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherSettings, DEFAULT_TIMEOUT, RUN_COMMAND_PERMISSION};
pub use facility::{ExecutionFacility, Invocation, LocalShellFacility, SessionAction, StartError};
pub use pending::{PendingResult, PendingTable, ReplyHandle};
pub use permission::{PermissionGate, StaticPermissions};
pub use result::{CommandResult, RemoteReply};
