//! Path registry
//!
//! The registry is built once at startup from validated configuration and
//! never changes afterwards. Registration order is preference order: the
//! controller evaluates paths in this order and, in `single` mode, routes
//! through the first usable one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use route_switcher_core::registry::PathRegistry;
//!
//! let registry = PathRegistry::resolve(&config.paths, &resolver).await?;
//! for entry in registry.iter() {
//!     println!("{} -> {:?}", entry.path(), entry.statistic().health());
//! }
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::info;

use crate::config::PathConfig;
use crate::error::{Error, Result};
use crate::stats::PathStatistic;
use crate::traits::{InterfaceHandle, LinkResolver};

/// A monitored path (immutable after construction)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    link: InterfaceHandle,
    gateway: Ipv4Addr,
    name: String,
}

impl Path {
    /// Create a path over a resolved interface
    pub fn new(link: InterfaceHandle, gateway: Ipv4Addr) -> Self {
        let name = format!("{}-{}", link.name, gateway);
        Self {
            link,
            gateway,
            name,
        }
    }

    /// Display name, `interface-gateway`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved interface
    pub fn link(&self) -> &InterfaceHandle {
        &self.link
    }

    /// Interface name
    pub fn interface(&self) -> &str {
        &self.link.name
    }

    /// Kernel interface index
    pub fn interface_index(&self) -> u32 {
        self.link.index
    }

    /// Gateway address
    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A registered path together with its shared statistics record
#[derive(Debug, Clone)]
pub struct PathEntry {
    path: Arc<Path>,
    statistic: Arc<PathStatistic>,
}

impl PathEntry {
    /// The path
    pub fn path(&self) -> &Arc<Path> {
        &self.path
    }

    /// Its statistics record
    pub fn statistic(&self) -> &Arc<PathStatistic> {
        &self.statistic
    }
}

/// Ordered, immutable list of monitored paths
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    entries: Arc<[PathEntry]>,
}

impl PathRegistry {
    /// Build a registry from already-resolved paths, keeping their order
    pub fn from_paths(paths: impl IntoIterator<Item = Path>) -> Self {
        let entries: Vec<PathEntry> = paths
            .into_iter()
            .map(|path| PathEntry {
                path: Arc::new(path),
                statistic: Arc::new(PathStatistic::new()),
            })
            .collect();

        Self {
            entries: entries.into(),
        }
    }

    /// Resolve every configured interface and build the registry
    ///
    /// # Errors
    ///
    /// - `Error::LinkNotFound` if an interface does not exist
    /// - `Error::Config` if two paths resolve to the same interface and gateway
    pub async fn resolve(configs: &[PathConfig], resolver: &dyn LinkResolver) -> Result<Self> {
        let mut paths: Vec<Path> = Vec::with_capacity(configs.len());

        for config in configs {
            let link = resolver.lookup_interface(&config.interface).await?;
            let path = Path::new(link, config.gateway);

            if paths
                .iter()
                .any(|p| p.interface_index() == path.interface_index() && p.gateway() == path.gateway())
            {
                return Err(Error::config(format!("Duplicate path: {}", path)));
            }

            info!(
                path = %path,
                ifindex = path.interface_index(),
                "Registered path"
            );
            paths.push(path);
        }

        Ok(Self::from_paths(paths))
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter()
    }

    /// Entry at a registration position
    pub fn get(&self, position: usize) -> Option<&PathEntry> {
        self.entries.get(position)
    }

    /// Number of registered paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no path is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
