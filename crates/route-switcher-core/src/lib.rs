// # route-switcher-core
//
// Core library for the route switcher: a host-resident failover controller
// that steers the default route towards the external paths that currently
// answer reachability probes.
//
// ## Architecture Overview
//
// - **PathRegistry**: Ordered, immutable list of monitored paths
// - **HealthMonitor**: One per path; probes targets and accumulates counters
// - **RouteController**: Periodic task; hysteresis, path selection, reconciliation
// - **RouteInstaller**: Trait around the host routing table
// - **LinkResolver** / **ProberFactory**: Traits around interface lookup and probing
// - **RouteSwitcher**: Startup and task orchestration
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from platform bindings
// 2. **Single Writer**: Only the controller touches the routing table or health state
// 3. **Anti-flapping**: Paths are excluded only after several bad windows
// 4. **Availability first**: Kernel errors are logged, never fatal
// 5. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod controller;
pub mod error;
pub mod installer;
pub mod monitor;
pub mod registry;
pub mod route;
pub mod stats;
pub mod switcher;
pub mod traits;

// Re-export core types for convenience
pub use config::{NoUsablePathPolicy, PathConfig, RoutePreference, SwitcherConfig};
pub use controller::{ControllerEvent, ReconcileAction, RouteController, TickOutcome};
pub use error::{Error, Result};
pub use installer::MemoryRouteInstaller;
pub use monitor::HealthMonitor;
pub use registry::{Path, PathRegistry};
pub use route::{CandidateRoute, NextHop};
pub use stats::{HealthState, PathHealth, PathStatistic, ProbeWindow};
pub use switcher::RouteSwitcher;
pub use traits::{LinkResolver, Prober, ProberFactory, RouteInstaller};
