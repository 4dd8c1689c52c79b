//! Hosts file reconciliation.
//!
//! Every line written by this module ends with a marker comment naming the
//! host pattern that produced it. On each pass the lines carrying the
//! current pattern's marker are dropped and rewritten from the fresh entry
//! list; every other line is copied through untouched. Instances filtering
//! on different patterns therefore share one file without clobbering each
//! other.
//!
//! Lines tagged `# microk8s ingress host sync: '<pattern>'` (the pattern in
//! Python `repr` quoting) were written by the older Python release of this
//! tool. They count as owned by the same pattern, so the first pass after an
//! upgrade replaces them instead of leaving a stale duplicate ahead of the
//! new line. Only the current tag is ever written.
//!
//! The whole file is recomputed in memory before anything is written. No
//! lock is taken: an external edit to the same file while a pass is running
//! can be lost.

use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::config::OutputTarget;
use crate::entry::HostEntry;
use crate::error::{Result, SyncError};

/// Tag embedded in every managed line.
pub const MANAGED_BY_TAG: &str = "# kube-hosts-sync";

/// Tag written by the Python release; still recognised, never written.
pub const LEGACY_TAG: &str = "# microk8s ingress host sync";

/// Separator between the address, host and marker fields.
const FIELD_SEPARATOR: char = ' ';

/// Per-pattern ownership marker.
///
/// Rendered as `# kube-hosts-sync: "<pattern>"`. A line is owned by a
/// pattern iff it contains that exact text, or the legacy form
/// `# microk8s ingress host sync: '<pattern>'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    current: String,
    legacy: String,
}

impl Marker {
    /// Builds the marker for `pattern`.
    #[must_use]
    pub fn for_pattern(pattern: &str) -> Self {
        Self {
            current: format!("{MANAGED_BY_TAG}: {pattern:?}"),
            legacy: format!("{LEGACY_TAG}: {}", python_repr(pattern)),
        }
    }

    /// Returns the marker text written on new lines.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.current
    }

    /// Returns `true` if `line` was written under this marker, by this
    /// release or the Python one.
    #[must_use]
    pub fn owns(&self, line: &str) -> bool {
        line.contains(&self.current) || line.contains(&self.legacy)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.current)
    }
}

/// Quotes `s` the way Python's `repr(str)` does.
///
/// Single quotes unless the text contains a single quote and no double
/// quote. Backslashes, the chosen quote and control characters are escaped.
fn python_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii_control() => {
                out.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Summary of a single merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Owned lines dropped from the old text.
    pub removed: usize,
    /// Lines written for the new entries.
    pub added: usize,
    /// Whether the output differs from the input text.
    pub changed: bool,
}

/// Computes the new hosts file text.
///
/// Lines of `old` containing `marker` are replaced by one line per entry,
/// `<address> <host> <marker>`, appended after the retained lines. Entries
/// without an address get `default_address`. The result always ends with
/// exactly one newline.
///
/// ```
/// use kube_hosts_sync::{HostEntry, Marker, merge};
///
/// let marker = Marker::for_pattern("^svc-");
/// let entries = [HostEntry::with_address("svc-a", "10.0.0.5")];
/// let text = merge("127.0.0.1 localhost\n", &entries, &marker, "127.0.0.1");
///
/// assert_eq!(
///     text,
///     "127.0.0.1 localhost\n10.0.0.5 svc-a # kube-hosts-sync: \"^svc-\"\n"
/// );
/// assert_eq!(merge(&text, &entries, &marker, "127.0.0.1"), text);
/// ```
#[must_use]
pub fn merge(old: &str, entries: &[HostEntry], marker: &Marker, default_address: &str) -> String {
    merge_with_report(old, entries, marker, default_address).0
}

/// Like [`merge`], also reporting what changed.
#[must_use]
pub fn merge_with_report(
    old: &str,
    entries: &[HostEntry],
    marker: &Marker,
    default_address: &str,
) -> (String, MergeReport) {
    let mut report = MergeReport::default();
    let mut lines: Vec<String> = Vec::new();

    for line in old.lines() {
        if marker.owns(line) {
            tracing::debug!(line, "Removing managed line");
            report.removed += 1;
        } else {
            lines.push(line.to_string());
        }
    }

    for entry in entries {
        let line = format_line(entry, marker, default_address);
        tracing::debug!(line = %line, "Adding managed line");
        lines.push(line);
        report.added += 1;
    }

    let mut text = lines.join("\n");
    text.push('\n');
    report.changed = text != old;
    (text, report)
}

/// Lists the lines of `text` currently owned by `marker`.
#[must_use]
pub fn owned_lines<'a>(text: &'a str, marker: &Marker) -> Vec<&'a str> {
    text.lines().filter(|l| marker.owns(l)).collect()
}

/// Reads the whole hosts file.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be read.
pub fn read_hosts_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SyncError::io("read", path, e))
}

/// Writes the merged text to `target` in one call.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file (or standard output) cannot be
/// written.
pub fn write_output(target: &OutputTarget, text: &str) -> Result<()> {
    match target {
        OutputTarget::File(path) => {
            std::fs::write(path, text).map_err(|e| SyncError::io("write", path, e))?;
            tracing::debug!(path = %path.display(), bytes = text.len(), "Wrote hosts file");
        }
        OutputTarget::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(text.as_bytes())
                .map_err(|e| SyncError::io("write", "<stdout>", e))?;
            out.flush()
                .map_err(|e| SyncError::io("write", "<stdout>", e))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Line helpers
// ---------------------------------------------------------------------------

/// Formats one managed line.
///
/// ```text
/// 10.0.0.5 svc-a # kube-hosts-sync: "^svc-"
/// ```
fn format_line(entry: &HostEntry, marker: &Marker, default_address: &str) -> String {
    let address = entry.address_or(default_address);
    format!(
        "{address}{FIELD_SEPARATOR}{host}{FIELD_SEPARATOR}{marker}",
        host = entry.host
    )
}
