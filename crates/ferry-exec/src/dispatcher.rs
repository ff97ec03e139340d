use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::facility::{ExecutionFacility, Invocation, SessionAction};
use crate::pending::{PendingResult, PendingTable, ReplyHandle};
use crate::permission::PermissionGate;
use crate::result::{CommandResult, RemoteReply};

/// How long a submission waits for its reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Capability the remote run-command service requires.
pub const RUN_COMMAND_PERMISSION: &str = "com.termux.permission.RUN_COMMAND";

const DEFAULT_PREFIX: &str = "/data/data/com.termux/files/usr";

const REMOTE_MISSING_MESSAGE: &str = "Remote app is not installed";

#[derive(Clone, Debug)]
pub struct DispatcherSettings {
    /// Shell every command is run through, as `<shell> -c <command>`.
    pub shell_path: String,
    pub timeout: Duration,
    /// Permission checked before each submission.
    pub permission: String,
}

impl DispatcherSettings {
    pub fn with_prefix(prefix: impl AsRef<Path>) -> Self {
        Self {
            shell_path: prefix.as_ref().join("bin/sh").to_string_lossy().into_owned(),
            timeout: DEFAULT_TIMEOUT,
            permission: RUN_COMMAND_PERMISSION.to_string(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Permission {0} not granted. Allow it and retry.")]
    PermissionDenied(String),
}

/// Sends commands to the execution facility and routes each reply, or a
/// timeout, back to the submitter exactly once.
pub struct Dispatcher {
    settings: DispatcherSettings,
    pending: Arc<PendingTable>,
    facility: Arc<dyn ExecutionFacility>,
    permissions: Arc<dyn PermissionGate>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatcherSettings,
        facility: Arc<dyn ExecutionFacility>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        Self {
            settings,
            pending: Arc::new(PendingTable::new()),
            facility,
            permissions,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Submit `command` for execution through the configured shell.
    ///
    /// The returned receiver resolves exactly once: with the facility's
    /// reply, a start failure, or a timeout result. Must be called from
    /// within a Tokio runtime.
    pub fn submit(
        &self,
        command: &str,
        working_directory: Option<&str>,
        background: bool,
    ) -> Result<PendingResult, DispatchError> {
        let permission = &self.settings.permission;
        if !self.permissions.is_granted(permission) {
            log::warn!("permission {permission} not granted, requesting it");
            self.permissions.request(permission);
            return Err(DispatchError::PermissionDenied(permission.clone()));
        }

        if !self.facility.is_available() {
            log::warn!("execution facility unavailable");
            return Ok(resolved(CommandResult::failure(REMOTE_MISSING_MESSAGE)));
        }

        let token = Uuid::new_v4().to_string();
        let receiver = self.pending.register(&token);
        let invocation = Invocation {
            executable: self.settings.shell_path.clone(),
            arguments: vec!["-c".to_string(), command.to_string()],
            working_directory: working_directory.map(str::to_string),
            background,
            session_action: SessionAction::for_background(background),
            reply: ReplyHandle::new(token.clone(), Arc::clone(&self.pending)),
        };

        log::info!("submitting request {token} (background={background})");
        if let Err(e) = self.facility.start(invocation) {
            log::error!("failed to start request {token}: {e}");
            self.pending.complete(&token, CommandResult::failure(e.to_string()));
            return Ok(receiver);
        }

        if self.pending.contains(&token) {
            self.arm_timeout(token);
        }
        Ok(receiver)
    }

    fn arm_timeout(&self, token: String) {
        let pending = Arc::clone(&self.pending);
        let timeout = self.settings.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if pending.complete(&token, CommandResult::timed_out()) {
                log::warn!("request {token} timed out after {timeout:?}");
            }
        });
    }

    /// Route a reply that arrived by token rather than through its handle.
    ///
    /// Replies for unknown tokens are dropped.
    pub fn deliver_reply(&self, token: &str, reply: RemoteReply) -> bool {
        let delivered = self.pending.complete(token, reply.into());
        if !delivered {
            log::info!("dropping reply for unknown request {token}");
        }
        delivered
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn resolved(result: CommandResult) -> PendingResult {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{LocalShellFacility, StartError};
    use crate::permission::StaticPermissions;
    use crate::result::TIMEOUT_MESSAGE;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records what it was asked to run. Replies only when told to.
    #[derive(Default)]
    struct ScriptedFacility {
        invocations: Mutex<Vec<(String, Vec<String>, Option<String>, bool, SessionAction)>>,
        handles: Mutex<Vec<ReplyHandle>>,
        fail_with: Mutex<Option<StartError>>,
        unavailable: bool,
    }

    impl ScriptedFacility {
        fn take_handle(&self, index: usize) -> ReplyHandle {
            self.handles.lock().unwrap().remove(index)
        }
    }

    impl ExecutionFacility for ScriptedFacility {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn start(&self, invocation: Invocation) -> Result<(), StartError> {
            if let Some(err) = self.fail_with.lock().unwrap().take() {
                return Err(err);
            }
            self.invocations.lock().unwrap().push((
                invocation.executable,
                invocation.arguments,
                invocation.working_directory,
                invocation.background,
                invocation.session_action,
            ));
            self.handles.lock().unwrap().push(invocation.reply);
            Ok(())
        }
    }

    fn settings() -> DispatcherSettings {
        DispatcherSettings {
            shell_path: "/bin/sh".to_string(),
            ..DispatcherSettings::default()
        }
    }

    fn granted() -> Arc<StaticPermissions> {
        Arc::new(StaticPermissions::new([RUN_COMMAND_PERMISSION]))
    }

    fn scripted(facility: &Arc<ScriptedFacility>) -> Dispatcher {
        Dispatcher::new(settings(), facility.clone(), granted())
    }

    #[test]
    fn test_default_settings() {
        let settings = DispatcherSettings::default();
        assert_eq!(settings.shell_path, "/data/data/com.termux/files/usr/bin/sh");
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert_eq!(settings.permission, "com.termux.permission.RUN_COMMAND");
    }

    #[tokio::test]
    async fn test_invocation_uses_shell_indirection() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);

        let _fg = dispatcher.submit("echo a | wc -l", None, false).unwrap();
        let _bg = dispatcher
            .submit("ls  -la 'my dir'", Some("/tmp/work"), true)
            .unwrap();

        let invocations = facility.invocations.lock().unwrap();
        assert_eq!(invocations.len(), 2);

        let (exe, args, wd, background, action) = &invocations[0];
        assert_eq!(exe, "/bin/sh");
        assert_eq!(args, &vec!["-c".to_string(), "echo a | wc -l".to_string()]);
        assert_eq!(wd, &None);
        assert!(!background);
        assert_eq!(action.as_str(), "0");

        let (_, args, wd, background, action) = &invocations[1];
        assert_eq!(args[1], "ls  -la 'my dir'");
        assert_eq!(wd.as_deref(), Some("/tmp/work"));
        assert!(background);
        assert_eq!(action.as_str(), "1");
        assert_eq!(dispatcher.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_out_of_order_replies() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);

        let first = dispatcher.submit("echo first", None, false).unwrap();
        let second = dispatcher.submit("echo second", None, false).unwrap();

        let second_handle = facility.take_handle(1);
        let first_handle = facility.take_handle(0);
        assert_ne!(first_handle.token(), second_handle.token());

        assert!(second_handle.send(RemoteReply::new(0, "second\n", "")));
        assert!(first_handle.send(RemoteReply::new(1, "first\n", "")));

        assert_eq!(first.await.unwrap(), CommandResult::from_exit(1, "first\n", ""));
        assert_eq!(second.await.unwrap(), CommandResult::from_exit(0, "second\n", ""));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_at_deadline() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);
        let started = Instant::now();

        let mut rx = dispatcher.submit("sleep 30", None, false).unwrap();
        let early = tokio::time::timeout(Duration::from_secs(14), &mut rx).await;
        assert!(early.is_err(), "no result before the deadline");

        let result = rx.await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, TIMEOUT_MESSAGE);
        assert_eq!(dispatcher.pending_count(), 0);

        // The reply that shows up after the timeout is dropped.
        let late = facility.take_handle(0);
        assert!(!late.send(RemoteReply::new(0, "done", "")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_beats_timeout() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);

        let rx = dispatcher.submit("true", None, true).unwrap();
        facility.take_handle(0).send(RemoteReply::new(0, "", ""));
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(rx.await.unwrap(), CommandResult::from_exit(0, "", ""));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_uses_same_timeout() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);
        let started = Instant::now();

        let result = dispatcher.submit("sleep 30", None, true).unwrap().await.unwrap();
        assert_eq!(result, CommandResult::timed_out());
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_deliver_reply_by_token() {
        let facility = Arc::new(ScriptedFacility::default());
        let dispatcher = scripted(&facility);

        let rx = dispatcher.submit("date", None, false).unwrap();
        let token = facility.take_handle(0).token().to_string();

        assert!(!dispatcher.deliver_reply("no-such-token", RemoteReply::default()));
        let partial = RemoteReply {
            stdout: Some("now\n".to_string()),
            ..RemoteReply::default()
        };
        assert!(dispatcher.deliver_reply(&token, partial));
        assert!(!dispatcher.deliver_reply(&token, RemoteReply::new(0, "", "")));

        assert_eq!(rx.await.unwrap(), CommandResult::from_exit(-1, "now\n", ""));
    }

    #[tokio::test]
    async fn test_start_failure_leaves_nothing_pending() {
        let facility = Arc::new(ScriptedFacility::default());
        *facility.fail_with.lock().unwrap() = Some(StartError::Other("service refused".to_string()));
        let dispatcher = scripted(&facility);

        let result = dispatcher.submit("ls", None, false).unwrap().await.unwrap();
        assert_eq!(result, CommandResult::failure("service refused"));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_background_restriction_message() {
        let facility = Arc::new(ScriptedFacility::default());
        *facility.fail_with.lock().unwrap() = Some(StartError::BackgroundRestricted);
        let dispatcher = scripted(&facility);

        let result = dispatcher.submit("ls", None, true).unwrap().await.unwrap();
        assert!(!result.success);
        assert!(result.stderr.contains("foreground"));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let facility = Arc::new(ScriptedFacility::default());
        let gate = Arc::new(StaticPermissions::default());
        let dispatcher = Dispatcher::new(settings(), facility.clone(), gate.clone());

        let err = dispatcher.submit("ls", None, false).unwrap_err();
        assert!(matches!(err, DispatchError::PermissionDenied(ref p) if p == RUN_COMMAND_PERMISSION));
        assert_eq!(gate.requested(), vec![RUN_COMMAND_PERMISSION.to_string()]);
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(facility.invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capability_missing() {
        let facility = Arc::new(ScriptedFacility {
            unavailable: true,
            ..ScriptedFacility::default()
        });
        let dispatcher = scripted(&facility);

        let result = dispatcher.submit("ls", None, false).unwrap().await.unwrap();
        assert_eq!(result, CommandResult::failure(REMOTE_MISSING_MESSAGE));
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(facility.invocations.lock().unwrap().is_empty());
    }

    fn local() -> Dispatcher {
        Dispatcher::new(settings(), Arc::new(LocalShellFacility), granted())
    }

    #[tokio::test]
    async fn test_local_pipeline() {
        let result = local().submit("echo a | wc -l", None, false).unwrap().await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "1");
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn test_local_nonzero_exit() {
        let result = local()
            .submit("echo oops >&2; exit 3", None, false)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(result, CommandResult::from_exit(3, "", "oops\n"));
    }

    #[tokio::test]
    async fn test_local_working_directory() {
        let dir = std::env::temp_dir();
        let result = local()
            .submit("pwd", dir.to_str(), false)
            .unwrap()
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            Path::new(result.stdout.trim()).canonicalize().unwrap(),
            dir.canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_local_missing_directory_fails_to_start() {
        let dispatcher = local();
        let result = dispatcher
            .submit("pwd", Some("/nonexistent/ferry-dir"), false)
            .unwrap()
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert!(!result.stderr.is_empty());
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
