// # Link Resolver Trait
//
// Defines the interface for looking up local network interfaces and their
// IPv4 addresses.
//
// ## Implementations
//
// - Netlink-based (Linux): `route-switcher-netlink` crate
//
// ## Usage
//
// ```rust,ignore
// use route_switcher_core::LinkResolver;
//
// let link = resolver.lookup_interface("eth0").await?;
// let addresses = resolver.addresses_of(&link).await?;
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

/// A resolved local interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceHandle {
    /// Kernel interface index
    pub index: u32,
    /// Interface name
    pub name: String,
}

impl InterfaceHandle {
    /// Create a new interface handle
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ifindex {})", self.name, self.index)
    }
}

/// Trait for link resolver implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Allowed Capabilities
/// - ✅ Query the platform's interface and address tables
///
/// ## Forbidden Capabilities
/// - ❌ Modify interfaces, addresses or routes
/// - ❌ Cache results across calls (addresses may change at runtime)
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Look up an interface by name
    ///
    /// # Returns
    ///
    /// - `Ok(InterfaceHandle)`: The resolved interface
    /// - `Err(Error::LinkNotFound)`: No interface with this name exists
    async fn lookup_interface(&self, name: &str) -> Result<InterfaceHandle, crate::Error>;

    /// List the IPv4 addresses configured on an interface
    ///
    /// Returns an empty list if the interface has no IPv4 address.
    async fn addresses_of(&self, link: &InterfaceHandle) -> Result<Vec<Ipv4Addr>, crate::Error>;
}
