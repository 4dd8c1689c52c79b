//! Host name filtering.

use regex::Regex;

use crate::entry::HostEntry;
use crate::error::{Result, SyncError};
use crate::hosts_file::Marker;

/// Selects entries whose host matches a regular expression.
///
/// Matching is an unanchored search: the pattern may match anywhere in the
/// host name. Use `^`/`$` in the pattern to anchor it.
///
/// ```
/// use kube_hosts_sync::HostFilter;
///
/// let filter = HostFilter::new("^svc-").unwrap();
/// assert!(filter.matches("svc-a"));
/// assert!(!filter.matches("my-svc-a"));
/// ```
#[derive(Debug, Clone)]
pub struct HostFilter {
    regex: Regex,
}

impl HostFilter {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] if the pattern is not a valid
    /// regular expression.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| SyncError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Returns the pattern text exactly as given.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns `true` if `host` contains a match.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        self.regex.is_match(host)
    }

    /// Keeps the matching entries, in their original order.
    #[must_use]
    pub fn apply(&self, entries: impl IntoIterator<Item = HostEntry>) -> Vec<HostEntry> {
        entries
            .into_iter()
            .filter(|e| {
                let keep = self.matches(&e.host);
                if !keep {
                    tracing::trace!(host = %e.host, pattern = %self.pattern(), "Host filtered out");
                }
                keep
            })
            .collect()
    }

    /// Returns the ownership marker for this pattern.
    #[must_use]
    pub fn marker(&self) -> Marker {
        Marker::for_pattern(self.pattern())
    }
}
