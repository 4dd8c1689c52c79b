//! Discovered host entries.

/// A name-to-address candidate discovered in the cluster.
///
/// `ip_address` is set when the source knows a concrete address (a service's
/// cluster IP). Ingress hosts carry no address and resolve to the configured
/// default when written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Name to publish. Never empty.
    pub host: String,

    /// Concrete address, if the source supplied one.
    pub ip_address: Option<String>,
}

impl HostEntry {
    /// Creates an entry without an address.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ip_address: None,
        }
    }

    /// Creates an entry with a concrete address.
    #[must_use]
    pub fn with_address(host: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ip_address: Some(ip_address.into()),
        }
    }

    /// Returns the entry's own address, or `default` when it has none or it
    /// is empty.
    #[must_use]
    pub fn address_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.ip_address.as_deref() {
            Some(ip) if !ip.is_empty() => ip,
            _ => default,
        }
    }
}
