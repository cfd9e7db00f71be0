// # Route Installer Trait
//
// Defines the boundary around the host routing table.
//
// ## Implementations
//
// - Netlink-based (Linux): `route-switcher-netlink` crate
// - In-memory (dry run, tests): `route_switcher_core::installer::MemoryRouteInstaller`

use async_trait::async_trait;

use crate::route::CandidateRoute;

/// Trait for route installer implementations
///
/// Only the controller calls into the installer, one reconciliation at a time.
///
/// ## Error Handling
///
/// Errors are reported to the controller, which logs them and carries on.
/// Implementations must not retry on their own.
#[async_trait]
pub trait RouteInstaller: Send + Sync {
    /// Install `route`, replacing any route with the same destination and table
    async fn install(&self, route: &CandidateRoute) -> Result<(), crate::Error>;

    /// Remove `route`
    async fn remove(&self, route: &CandidateRoute) -> Result<(), crate::Error>;

    /// Whether two routes describe the same kernel entry
    fn equal(&self, a: &CandidateRoute, b: &CandidateRoute) -> bool {
        a == b
    }

    /// Installer name, for logging
    fn installer_name(&self) -> &'static str;
}
