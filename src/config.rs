//! Sync configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::filter::HostFilter;

/// Default input and output hosts file.
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// Address written for entries that carry none.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Namespace queried when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Poll interval used in watch mode.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Output target value meaning "standard output".
pub const STDOUT_SENTINEL: &str = "-";

/// Where the merged hosts file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Overwrite this file.
    File(PathBuf),
    /// Print to standard output.
    Stdout,
}

impl OutputTarget {
    /// Returns the file path, or `None` for [`OutputTarget::Stdout`].
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(p) => Some(p),
            Self::Stdout => None,
        }
    }
}

impl FromStr for OutputTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s == STDOUT_SENTINEL {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(s))
        })
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Stdout => f.write_str("<stdout>"),
        }
    }
}

/// What the watch loop does when a pass fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the loop and return the error.
    #[default]
    Abort,
    /// Log the error and try again on the next tick.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown failure policy {other:?}, expected \"abort\" or \"continue\""
            ))),
        }
    }
}

/// Configuration for reconciliation passes.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use kube_hosts_sync::{OutputTarget, SyncConfig};
///
/// let config = SyncConfig::new(r"\.local$")
///     .with_namespace("apps")
///     .with_output(OutputTarget::Stdout);
///
/// assert_eq!(config.namespace, "apps");
/// assert_eq!(config.default_address, "127.0.0.1");
/// assert_eq!(config.poll_interval, Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Regular expression selecting which hosts to publish.
    pub host_pattern: String,

    /// Hosts file read at the start of each pass.
    pub input: PathBuf,

    /// Where the merged file is written.
    pub output: OutputTarget,

    /// Address used for entries without one (ingress hosts).
    pub default_address: String,

    /// Namespace to query.
    pub namespace: String,

    /// Keep running passes until cancelled.
    pub watch: bool,

    /// Delay between passes in watch mode.
    pub poll_interval: Duration,

    /// Loop behaviour on a failed pass.
    pub on_failure: FailurePolicy,
}

impl SyncConfig {
    /// Creates a config for `host_pattern` with defaults for everything else.
    #[must_use]
    pub fn new(host_pattern: impl Into<String>) -> Self {
        Self {
            host_pattern: host_pattern.into(),
            input: PathBuf::from(DEFAULT_HOSTS_FILE),
            output: OutputTarget::File(PathBuf::from(DEFAULT_HOSTS_FILE)),
            default_address: DEFAULT_ADDRESS.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            watch: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_failure: FailurePolicy::Abort,
        }
    }

    /// Overrides the input file.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }

    /// Overrides the output target.
    #[must_use]
    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Reads from and writes to the same file.
    #[must_use]
    pub fn with_hosts_file(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.with_input(path.clone())
            .with_output(OutputTarget::File(path))
    }

    /// Overrides the default address.
    #[must_use]
    pub fn with_default_address(mut self, address: impl Into<String>) -> Self {
        self.default_address = address.into();
        self
    }

    /// Overrides the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enables watch mode with the given poll interval.
    #[must_use]
    pub const fn with_watch(mut self, poll_interval: Duration) -> Self {
        self.watch = true;
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Checks the configuration and compiles the host pattern.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] if the pattern does not compile,
    /// or [`SyncError::InvalidConfig`] for empty fields and contradictory
    /// flags (watch mode with standard output, zero poll interval).
    pub fn validate(&self) -> Result<HostFilter> {
        let filter = HostFilter::new(&self.host_pattern)?;

        if self.default_address.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "default address must not be empty".into(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(SyncError::InvalidConfig("namespace must not be empty".into()));
        }
        if self.watch {
            if self.output == OutputTarget::Stdout {
                return Err(SyncError::InvalidConfig(
                    "watch mode cannot write to standard output".into(),
                ));
            }
            if self.poll_interval.is_zero() {
                return Err(SyncError::InvalidConfig(
                    "poll interval must be greater than zero".into(),
                ));
            }
        }

        Ok(filter)
    }

    /// Returns `true` if the output file is the input file, so an unchanged
    /// merge result does not need to be written back.
    #[must_use]
    pub fn writes_in_place(&self) -> bool {
        self.output.path() == Some(self.input.as_path())
    }
}
