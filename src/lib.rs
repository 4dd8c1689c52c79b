//! # kube-hosts-sync
//!
//! Keep a hosts file in sync with the names a Kubernetes namespace exposes.
//!
//! Each pass lists the namespace's ingresses and services, keeps the hosts
//! matching a regular expression, and rewrites the lines of the hosts file
//! that were written earlier under the same expression. Ingress hosts point
//! at a configurable default address; services point at their cluster IP.
//! Everything else in the file (including lines written by instances using
//! a different expression) is left as it was.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use kube_hosts_sync::{KubeClusterApi, SyncConfig, Syncer};
//!
//! let api = KubeClusterApi::try_default().await?;
//! let config = SyncConfig::new(r"\.apps\.local$").with_namespace("apps");
//! let syncer = Syncer::new(config, api)?;
//!
//! // One pass, then return.
//! syncer.run(std::future::pending()).await?;
//! ```
//!
//! ## File format
//!
//! Managed lines carry a marker naming the pattern that wrote them:
//!
//! ```text
//! 127.0.0.1 web.apps.local # kube-hosts-sync: "\\.apps\\.local$"
//! 10.152.183.12 api # kube-hosts-sync: "\\.apps\\.local$|^api$"
//! ```
//!
//! ## Permissions
//!
//! Writing `/etc/hosts` requires root. Run against a copy (or print to
//! standard output) when testing.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod hosts_file;
pub mod source;
pub mod sync;

pub use config::{FailurePolicy, OutputTarget, SyncConfig};
pub use entry::HostEntry;
pub use error::{Result, SyncError};
pub use filter::HostFilter;
pub use hosts_file::{Marker, MergeReport, merge, merge_with_report, owned_lines};
pub use source::{ClusterApi, KubeClusterApi, fetch_hosts};
pub use sync::{PassReport, Syncer};
