// # Memory Route Installer
//
// In-memory implementation of RouteInstaller.
//
// ## Purpose
//
// Keeps the "kernel" routing table in a HashMap instead of touching the host.
// Backs the daemon's dry-run mode and is handy when embedding the controller
// in tests.
//
// ## Semantics
//
// - `install` replaces whatever default route the table held
// - `remove` fails if the table holds a different route (or none), the same
//   way the kernel rejects deleting a route that does not exist

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::route::CandidateRoute;
use crate::traits::RouteInstaller;

/// One call made against the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerCall {
    /// `install(route)`
    Install(CandidateRoute),
    /// `remove(route)`
    Remove(CandidateRoute),
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<u32, CandidateRoute>,
    calls: Vec<InstallerCall>,
}

/// In-memory route installer
///
/// # Example
///
/// ```rust,no_run
/// use route_switcher_core::installer::MemoryRouteInstaller;
/// use route_switcher_core::route::CandidateRoute;
/// use route_switcher_core::traits::RouteInstaller;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let installer = MemoryRouteInstaller::new();
///     let route = CandidateRoute::default_route(254, Vec::new());
///
///     installer.install(&route).await?;
///     assert_eq!(installer.installed(254).await, Some(route));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRouteInstaller {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRouteInstaller {
    /// Create an empty installer
    pub fn new() -> Self {
        Self::default()
    }

    /// Route currently held for `table`
    pub async fn installed(&self, table: u32) -> Option<CandidateRoute> {
        self.inner.read().await.tables.get(&table).cloned()
    }

    /// Every call made so far, in order
    pub async fn calls(&self) -> Vec<InstallerCall> {
        self.inner.read().await.calls.clone()
    }
}

#[async_trait]
impl RouteInstaller for MemoryRouteInstaller {
    async fn install(&self, route: &CandidateRoute) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(InstallerCall::Install(route.clone()));
        inner.tables.insert(route.table, route.clone());
        info!(route = %route, "[dry-run] route installed");
        Ok(())
    }

    async fn remove(&self, route: &CandidateRoute) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(InstallerCall::Remove(route.clone()));

        match inner.tables.get(&route.table) {
            Some(current) if current == route => {
                inner.tables.remove(&route.table);
                info!(route = %route, "[dry-run] route removed");
                Ok(())
            }
            _ => Err(Error::route(format!("no such route: {}", route))),
        }
    }

    fn installer_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{EQUAL_COST_HOPS, NextHop};
    use std::net::Ipv4Addr;

    fn route(gw: [u8; 4]) -> CandidateRoute {
        CandidateRoute::default_route(
            254,
            vec![NextHop {
                interface_index: 2,
                interface: "eth0".to_string(),
                gateway: Ipv4Addr::from(gw),
                hops: EQUAL_COST_HOPS,
            }],
        )
    }

    #[tokio::test]
    async fn test_install_replaces_table_entry() {
        let installer = MemoryRouteInstaller::new();
        installer.install(&route([10, 0, 0, 1])).await.unwrap();
        installer.install(&route([10, 0, 0, 2])).await.unwrap();

        assert_eq!(installer.installed(254).await, Some(route([10, 0, 0, 2])));
        assert_eq!(installer.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_requires_matching_route() {
        let installer = MemoryRouteInstaller::new();
        assert!(installer.remove(&route([10, 0, 0, 1])).await.is_err());

        installer.install(&route([10, 0, 0, 1])).await.unwrap();
        assert!(installer.remove(&route([10, 0, 0, 2])).await.is_err());
        assert!(installer.remove(&route([10, 0, 0, 1])).await.is_ok());
        assert_eq!(installer.installed(254).await, None);
    }
}
