use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Platform permission check and prompt.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self, name: &str) -> bool;

    /// Ask for `name` to be granted. Does not wait for the answer.
    fn request(&self, name: &str);
}

/// A fixed set of granted permissions. Requests are only recorded.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    granted: HashSet<String>,
    requested: Mutex<Vec<String>>,
}

impl StaticPermissions {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Names passed to [`PermissionGate::request`] so far, oldest first.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PermissionGate for StaticPermissions {
    fn is_granted(&self, name: &str) -> bool {
        self.granted.contains(name)
    }

    fn request(&self, name: &str) {
        log::info!("permission {name} requested");
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
    }
}
