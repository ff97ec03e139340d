//! Application state shared by the request handlers.

use std::sync::Arc;

use ferry_exec::{Dispatcher, PermissionGate, StaticPermissions};
use ferry_pty::{EventSink, Multiplexer};

use crate::config::FerryConfig;
use crate::delivery::Outbox;
use crate::remote::{LocalRemoteApp, RemoteApp, RemoteShellFacility};

pub struct AppState {
    pub multiplexer: Multiplexer,
    pub dispatcher: Dispatcher,
    pub permissions: Arc<dyn PermissionGate>,
    pub remote: Arc<dyn RemoteApp>,
    /// The single delivery context every response and event goes through.
    pub outbox: Outbox,
}

impl AppState {
    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &FerryConfig, events: EventSink, outbox: Outbox) -> Self {
        let remote: Arc<dyn RemoteApp> =
            Arc::new(LocalRemoteApp::new(&config.prefix, config.launcher.clone()));
        let permissions: Arc<dyn PermissionGate> =
            Arc::new(StaticPermissions::new(config.granted_permissions.iter().cloned()));
        let dispatcher = Dispatcher::new(
            config.dispatcher_settings(),
            Arc::new(RemoteShellFacility::new(Arc::clone(&remote))),
            Arc::clone(&permissions),
        );

        Self {
            multiplexer: Multiplexer::new(config.session_profile(), events),
            dispatcher,
            permissions,
            remote,
            outbox,
        }
    }
}
