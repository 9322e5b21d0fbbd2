use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Verbosity level controlling tracing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (info level)
    Normal,
    /// Verbose output (debug level)
    Verbose,
    /// Maximum output (trace level)
    Trace,
}

impl From<(bool, u8)> for Verbosity {
    /// Convert from (quiet_flag, verbose_count) to Verbosity.
    ///
    /// - quiet=true -> Quiet (regardless of verbose count)
    /// - verbose=0  -> Normal
    /// - verbose=1  -> Verbose
    /// - verbose=2+ -> Trace
    fn from((quiet, verbose_count): (bool, u8)) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            match verbose_count {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

impl Verbosity {
    /// Return the tracing filter string for this verbosity level.
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Verbosity::Quiet)
    }
}

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:7878";
pub const DEFAULT_ENGINE: &str = "docker";
pub const DEFAULT_PROJECT_LABEL: &str =
    "com.docker.compose.project=docker_volumes-backup-extension-desktop-extension";
pub const DEFAULT_REFRESH_LABEL: &str = "com.volumes-backup-extension.trigger-ui-refresh=true";

/// `[backend]`: where the backend service listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// `[events]`: the container engine CLI and the labels its workers carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub engine: String,
    pub project_label: String,
    pub refresh_label: String,
    /// Restart a closed event stream with backoff.
    pub reconnect: bool,
    pub reconnect_max_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            engine: DEFAULT_ENGINE.to_string(),
            project_label: DEFAULT_PROJECT_LABEL.to_string(),
            refresh_label: DEFAULT_REFRESH_LABEL.to_string(),
            reconnect: true,
            reconnect_max_secs: 30,
        }
    }
}

impl EventsConfig {
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs.max(1))
    }
}

/// `[poll]`: periodic progress polling, 0 to disable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 15 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolkeeperConfig {
    pub backend: BackendConfig,
    pub events: EventsConfig,
    pub poll: PollConfig,
}
