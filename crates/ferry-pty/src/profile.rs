use std::path::PathBuf;

use ferry_vt::DEFAULT_SCROLLBACK;

/// Install prefix of the stock Termux environment.
pub const TERMUX_PREFIX: &str = "/data/data/com.termux/files/usr";

/// Home directory of the stock Termux environment.
pub const TERMUX_HOME: &str = "/data/data/com.termux/files/home";

/// Version string advertised to shells through `TERMUX_VERSION`.
pub const TERMUX_VERSION: &str = "0.118.0";

/// Provisional PTY size used between spawn and initialization.
pub const PROVISIONAL_COLS: u16 = 80;
pub const PROVISIONAL_ROWS: u16 = 24;

/// Defaults applied to every session the multiplexer creates.
#[derive(Clone, Debug)]
pub struct SessionProfile {
    /// Install prefix of the remote environment (`$PREFIX`).
    pub prefix: PathBuf,
    /// Home directory, also the default working directory.
    pub home: PathBuf,
    /// Shell used when the caller does not pick one.
    pub default_shell: String,
    /// Arguments passed to every shell.
    pub args: Vec<String>,
    /// Scrollback lines kept per session.
    pub scrollback: usize,
    /// Extra variables appended after the fixed ones.
    pub extra_env: Vec<(String, String)>,
}

impl SessionProfile {
    /// Profile for an environment installed under `prefix`.
    pub fn with_prefix(prefix: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let default_shell = prefix.join("bin/bash").to_string_lossy().into_owned();
        Self {
            prefix,
            home: home.into(),
            default_shell,
            args: Vec::new(),
            scrollback: DEFAULT_SCROLLBACK,
            extra_env: Vec::new(),
        }
    }

    /// The complete environment handed to a session's shell.
    pub fn environment(&self) -> Vec<(String, String)> {
        let prefix = self.prefix.to_string_lossy();
        let mut env = vec![
            ("TERM".to_string(), "xterm-256color".to_string()),
            ("HOME".to_string(), self.home.to_string_lossy().into_owned()),
            ("PREFIX".to_string(), prefix.to_string()),
            ("PATH".to_string(), format!("{prefix}/bin:{prefix}/bin/applets")),
            ("LD_LIBRARY_PATH".to_string(), format!("{prefix}/lib")),
            ("LANG".to_string(), "en_US.UTF-8".to_string()),
            ("COLORTERM".to_string(), "truecolor".to_string()),
            ("TERMUX_VERSION".to_string(), TERMUX_VERSION.to_string()),
            ("TMPDIR".to_string(), format!("{prefix}/tmp")),
        ];
        env.extend(self.extra_env.iter().cloned());
        env
    }
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self::with_prefix(TERMUX_PREFIX, TERMUX_HOME)
    }
}
