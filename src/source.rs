//! Host discovery from the Kubernetes API.
//!
//! Ingress rule hosts are published without an address (they resolve to the
//! configured default). Services are published under their own name with
//! their cluster IP, but only once a cluster IP has been allocated: services
//! with no `clusterIP` yet, or headless services (`clusterIP: None`), are
//! skipped. The service `type` is not consulted.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::entry::HostEntry;
use crate::error::{Result, SyncError};

/// `clusterIP` value marking a headless service.
const HEADLESS_CLUSTER_IP: &str = "None";

/// Read access to the cluster objects hosts are discovered from.
///
/// Implemented by [`KubeClusterApi`]; tests substitute their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Lists ingresses in `namespace`.
    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>>;

    /// Lists services in `namespace`.
    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>>;
}

/// [`ClusterApi`] backed by a `kube` client.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Wraps an already configured client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects using in-cluster configuration, falling back to the local
    /// kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] if no usable configuration
    /// is found.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| SyncError::source_unavailable("client config", "-", e))?;
        Ok(Self::new(client))
    }
}

impl std::fmt::Debug for KubeClusterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterApi")
            .field("default_namespace", &self.client.default_namespace())
            .finish()
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| SyncError::source_unavailable("ingresses", namespace, e))?;
        Ok(list.items)
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| SyncError::source_unavailable("services", namespace, e))?;
        Ok(list.items)
    }
}

/// Shares one API between several syncers.
#[async_trait]
impl<T: ClusterApi + ?Sized> ClusterApi for Arc<T> {
    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>> {
        (**self).list_ingresses(namespace).await
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>> {
        (**self).list_services(namespace).await
    }
}

/// Discovers all candidate entries in `namespace`.
///
/// Ingress hosts come first, in listing order, followed by services.
///
/// # Errors
///
/// Propagates the first [`SyncError::SourceUnavailable`] from `api`.
pub async fn fetch_hosts<A>(api: &A, namespace: &str) -> Result<Vec<HostEntry>>
where
    A: ClusterApi + ?Sized,
{
    tracing::debug!(namespace = %namespace, "Fetching hosts");

    let mut entries = Vec::new();

    for ingress in api.list_ingresses(namespace).await? {
        for host in ingress_hosts(&ingress) {
            tracing::debug!(host = %host, "Found ingress host");
            entries.push(HostEntry::new(host));
        }
    }

    for service in api.list_services(namespace).await? {
        if let Some(entry) = service_entry(&service) {
            tracing::debug!(
                host = %entry.host,
                ip = entry.ip_address.as_deref().unwrap_or_default(),
                "Found service"
            );
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Returns the non-empty rule hosts of an ingress.
#[must_use]
pub fn ingress_hosts(ingress: &Ingress) -> Vec<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns an entry for a service with an allocated cluster IP.
#[must_use]
pub fn service_entry(service: &Service) -> Option<HostEntry> {
    let name = service.metadata.name.as_deref().filter(|n| !n.is_empty())?;
    let cluster_ip = service
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != HEADLESS_CLUSTER_IP)?;
    Some(HostEntry::with_address(name, cluster_ip))
}
