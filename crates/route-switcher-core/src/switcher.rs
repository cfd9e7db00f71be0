//! Route switcher orchestration
//!
//! [`RouteSwitcher`] owns the startup sequence and the task set:
//!
//! 1. Validate the configuration
//! 2. Resolve every interface into the [`PathRegistry`] (fatal on failure)
//! 3. On [`run`](RouteSwitcher::run): spawn one [`HealthMonitor`] per path and
//!    the [`RouteController`], then wait until every task has stopped
//!
//! All tasks share one [`CancellationToken`]. A monitor that fails (for
//! example an interface without an address) is logged and forgotten; the
//! other paths and the controller keep running.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SwitcherConfig;
use crate::controller::{ControllerEvent, RouteController};
use crate::error::{Error, Result};
use crate::monitor::HealthMonitor;
use crate::registry::PathRegistry;
use crate::traits::{LinkResolver, ProberFactory, RouteInstaller};

/// The assembled route switcher
pub struct RouteSwitcher {
    config: SwitcherConfig,
    registry: PathRegistry,
    resolver: Arc<dyn LinkResolver>,
    prober_factory: Arc<dyn ProberFactory>,
    controller: RouteController,
}

impl fmt::Debug for RouteSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSwitcher")
            .field("paths", &self.registry.len())
            .field("targets", &self.config.targets)
            .field("table", &self.config.table)
            .field("route_preference", &self.config.route_preference)
            .finish_non_exhaustive()
    }
}

impl RouteSwitcher {
    /// Validate `config`, resolve its interfaces and assemble the switcher
    ///
    /// # Returns
    ///
    /// A tuple of (switcher, event_receiver) where event_receiver yields controller events
    ///
    /// # Errors
    ///
    /// Configuration errors and unresolvable interfaces; nothing has touched
    /// the network when this fails.
    pub async fn new(
        config: SwitcherConfig,
        resolver: Arc<dyn LinkResolver>,
        prober_factory: Arc<dyn ProberFactory>,
        installer: Box<dyn RouteInstaller>,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.validate()?;

        let registry = PathRegistry::resolve(&config.paths, resolver.as_ref()).await?;
        let (controller, event_rx) = RouteController::new(registry.clone(), installer, &config)?;

        let switcher = Self {
            config,
            registry,
            resolver,
            prober_factory,
            controller,
        };

        Ok((switcher, event_rx))
    }

    /// The resolved paths
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    /// Run every task until `shutdown` is cancelled and all of them stopped
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The controller failed; the remaining tasks were
    ///   cancelled and drained first
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let targets: Arc<[Ipv4Addr]> = self.config.targets.clone().into();
        let mut monitors = JoinSet::new();

        for entry in self.registry.iter() {
            let name = entry.path().name().to_string();
            let monitor = HealthMonitor::new(
                entry.clone(),
                Arc::clone(&self.resolver),
                Arc::clone(&self.prober_factory),
                Arc::clone(&targets),
                self.config.probe.clone(),
            );
            let token = shutdown.clone();
            monitors.spawn(async move { (name, monitor.run(token).await) });
        }

        let mut controller = tokio::spawn(self.controller.run(shutdown.clone()));
        let mut controller_result: Option<Result<()>> = None;

        loop {
            tokio::select! {
                joined = &mut controller, if controller_result.is_none() => {
                    let result = match joined {
                        Ok(result) => result,
                        Err(e) => Err(Error::Other(format!("controller task failed: {}", e))),
                    };
                    if let Err(e) = &result {
                        error!("Route controller stopped unexpectedly: {}", e);
                        shutdown.cancel();
                    }
                    controller_result = Some(result);
                }

                Some(joined) = monitors.join_next() => {
                    match joined {
                        Ok((path, Ok(()))) => debug!(path = %path, "Path monitor stopped"),
                        Ok((path, Err(e))) => {
                            error!(path = %path, "Path monitor failed, path stays excluded: {}", e);
                        }
                        Err(e) => error!("Path monitor task failed: {}", e),
                    }
                }

                else => break,
            }
        }

        info!("All tasks stopped");
        controller_result.unwrap_or(Ok(()))
    }
}
