//! The remote terminal app as seen from the bridge.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use ferry_exec::{ExecutionFacility, Invocation, LocalShellFacility, StartError};

/// Installation check and launcher for the remote app.
pub trait RemoteApp: Send + Sync {
    fn is_installed(&self) -> bool;

    /// Bring the remote app to the foreground. `false` if it could not be opened.
    fn open(&self) -> bool;
}

/// A remote environment installed under a local prefix.
pub struct LocalRemoteApp {
    prefix: PathBuf,
    launcher: Option<Vec<String>>,
}

impl LocalRemoteApp {
    pub fn new(prefix: impl Into<PathBuf>, launcher: Option<Vec<String>>) -> Self {
        Self {
            prefix: prefix.into(),
            launcher,
        }
    }
}

impl RemoteApp for LocalRemoteApp {
    fn is_installed(&self) -> bool {
        self.prefix.join("bin/sh").exists()
    }

    fn open(&self) -> bool {
        let Some((program, args)) = self.launcher.as_deref().and_then(|argv| argv.split_first())
        else {
            log::warn!("no launcher configured for the remote app");
            return false;
        };

        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                // Reap in the background.
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
                true
            }
            Err(e) => {
                log::error!("failed to launch {program}: {e}");
                false
            }
        }
    }
}

/// Runs commands locally, but only while the remote app is installed.
pub struct RemoteShellFacility {
    remote: Arc<dyn RemoteApp>,
    shell: LocalShellFacility,
}

impl RemoteShellFacility {
    pub fn new(remote: Arc<dyn RemoteApp>) -> Self {
        Self {
            remote,
            shell: LocalShellFacility,
        }
    }
}

impl ExecutionFacility for RemoteShellFacility {
    fn is_available(&self) -> bool {
        self.remote.is_installed()
    }

    fn start(&self, invocation: Invocation) -> Result<(), StartError> {
        self.shell.start(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_installed_checks_prefix_shell() {
        let dir = tempfile::tempdir().unwrap();
        let remote = LocalRemoteApp::new(dir.path(), None);
        assert!(!remote.is_installed());

        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/sh"), "").unwrap();
        assert!(remote.is_installed());
    }

    #[test]
    fn test_open_without_launcher() {
        let remote = LocalRemoteApp::new("/nonexistent", None);
        assert!(!remote.open());
    }

    #[test]
    fn test_open_runs_launcher() {
        let ok = LocalRemoteApp::new("/nonexistent", Some(vec!["true".to_string()]));
        assert!(ok.open());

        let missing = LocalRemoteApp::new(
            "/nonexistent",
            Some(vec!["/nonexistent/ferry-launcher".to_string()]),
        );
        assert!(!missing.open());
    }

    #[test]
    fn test_facility_availability_follows_install() {
        let facility = RemoteShellFacility::new(Arc::new(LocalRemoteApp::new("/nonexistent", None)));
        assert!(!facility.is_available());

        let facility = RemoteShellFacility::new(Arc::new(LocalRemoteApp::new("/usr", None)));
        assert_eq!(facility.is_available(), std::path::Path::new("/usr/bin/sh").exists());
    }
}
