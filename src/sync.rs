//! Reconciliation passes and the watch loop.

use std::future::Future;

use crate::config::{FailurePolicy, SyncConfig};
use crate::error::Result;
use crate::filter::HostFilter;
use crate::hosts_file::{Marker, MergeReport, merge_with_report, read_hosts_file, write_output};
use crate::source::{ClusterApi, fetch_hosts};

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Entries returned by the cluster.
    pub discovered: usize,
    /// Entries that matched the host pattern.
    pub published: usize,
    /// What the merge did to the file text.
    pub merge: MergeReport,
    /// Whether the output was written.
    pub written: bool,
}

/// Runs fetch → filter → merge → write passes for one configuration.
///
/// # Lifecycle
///
/// 1. [`new`](Self::new) validates the configuration up front.
/// 2. [`run`](Self::run) performs one pass immediately and, in watch mode,
///    one more after every poll interval until `shutdown` resolves.
///
/// Passes never overlap. A pass that has started always runs to completion;
/// shutdown only interrupts the sleep between passes.
#[derive(Debug)]
pub struct Syncer<A> {
    config: SyncConfig,
    filter: HostFilter,
    marker: Marker,
    api: A,
}

impl<A: ClusterApi> Syncer<A> {
    /// Creates a syncer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if [`SyncConfig::validate`] fails.
    pub fn new(config: SyncConfig, api: A) -> Result<Self> {
        let filter = config.validate()?;
        let marker = filter.marker();
        Ok(Self {
            config,
            filter,
            marker,
            api,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the marker owned by this syncer.
    #[must_use]
    pub const fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Runs a single pass.
    ///
    /// The cluster is queried before the hosts file is read, and the new text
    /// is computed in full before it is written, so a failed query leaves the
    /// file untouched. When writing back to the input file and nothing
    /// changed, the write is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`](crate::SyncError::SourceUnavailable)
    /// if the cluster query fails, or [`SyncError::Io`](crate::SyncError::Io)
    /// if the input cannot be read or the output cannot be written.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let discovered = fetch_hosts(&self.api, &self.config.namespace).await?;
        let discovered_count = discovered.len();
        let entries = self.filter.apply(discovered);

        let old = read_hosts_file(&self.config.input)?;
        let (text, merge) =
            merge_with_report(&old, &entries, &self.marker, &self.config.default_address);

        let written = if !merge.changed && self.config.writes_in_place() {
            tracing::debug!(path = %self.config.input.display(), "Hosts file unchanged");
            false
        } else {
            write_output(&self.config.output, &text)?;
            true
        };

        let report = PassReport {
            discovered: discovered_count,
            published: entries.len(),
            merge,
            written,
        };
        tracing::info!(
            namespace = %self.config.namespace,
            pattern = %self.filter.pattern(),
            output = %self.config.output,
            discovered = report.discovered,
            published = report.published,
            removed = merge.removed,
            added = merge.added,
            written,
            "Sync pass complete"
        );
        Ok(report)
    }

    /// Runs the first pass, then keeps going in watch mode until `shutdown`
    /// resolves.
    ///
    /// Without watch mode this returns after the first pass. With
    /// [`FailurePolicy::Continue`], a failed pass is logged and retried on the
    /// next tick; with [`FailurePolicy::Abort`] the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing pass when the loop aborts.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match self.run_pass().await {
                Ok(_) => {}
                Err(e) if self.config.watch && self.config.on_failure == FailurePolicy::Continue => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = self.config.poll_interval.as_secs_f64(),
                        "Sync pass failed, retrying on next tick"
                    );
                }
                Err(e) => return Err(e),
            }

            if !self.config.watch {
                return Ok(());
            }

            tracing::debug!(
                seconds = self.config.poll_interval.as_secs_f64(),
                "Waiting for next pass"
            );
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping sync loop");
                    return Ok(());
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}
