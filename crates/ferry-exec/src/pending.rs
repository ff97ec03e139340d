use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::oneshot;

use crate::result::{CommandResult, RemoteReply};

/// Receiver side of a submission. Resolves exactly once.
pub type PendingResult = oneshot::Receiver<CommandResult>;

struct PendingRequest {
    caller: oneshot::Sender<CommandResult>,
    submitted_at: Instant,
}

/// In-flight submissions keyed by request token.
///
/// Removal is atomic, so whichever of reply, timeout or start failure
/// reaches a token first is the only one that delivers.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a token and return the receiver its result will arrive on.
    pub(crate) fn register(&self, token: &str) -> PendingResult {
        let (caller, receiver) = oneshot::channel();
        let request = PendingRequest {
            caller,
            submitted_at: Instant::now(),
        };
        if self.lock().insert(token.to_string(), request).is_some() {
            log::warn!("request token {token} was already pending");
        }
        receiver
    }

    /// Remove `token` and hand `result` to its caller.
    ///
    /// Returns `false` when the token is unknown or was already completed.
    pub fn complete(&self, token: &str, result: CommandResult) -> bool {
        let Some(request) = self.lock().remove(token) else {
            return false;
        };
        log::debug!(
            "request {token} completed after {:?} with exit code {}",
            request.submitted_at.elapsed(),
            result.exit_code
        );
        if request.caller.send(result).is_err() {
            log::debug!("caller for request {token} went away");
        }
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Single-use capability for answering one submission.
///
/// Consumed on use, so a facility can redeem it at most once.
#[derive(Debug)]
pub struct ReplyHandle {
    token: String,
    pending: Arc<PendingTable>,
}

impl ReplyHandle {
    pub(crate) fn new(token: String, pending: Arc<PendingTable>) -> Self {
        Self { token, pending }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Deliver the reply. Returns `false` if the request already timed out.
    pub fn send(self, reply: RemoteReply) -> bool {
        let delivered = self.pending.complete(&self.token, reply.into());
        if !delivered {
            log::info!("dropping reply for unknown request {}", self.token);
        }
        delivered
    }
}

impl std::fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTable")
            .field("len", &self.len())
            .finish()
    }
}
