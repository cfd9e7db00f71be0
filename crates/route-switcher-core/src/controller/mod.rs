//! Route switching controller
//!
//! The controller is responsible for:
//! - Draining every path's probe window once per tick
//! - Folding the window into the path's hysteresis
//! - Selecting the usable paths and building the candidate default route
//! - Reconciling the candidate against the last installed route
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  record_round  ┌───────────────┐
//! │ HealthMonitor │ ─────────────▶ │ PathStatistic │ ◀─┐
//! └───────────────┘   (per path)   └───────────────┘   │ take_window
//!                                                      │ (every tick)
//!                                            ┌─────────────────┐
//!                                            │ RouteController │
//!                                            └─────────────────┘
//!                                                      │
//!                                     remove / install │ only on change
//!                                                      ▼
//!                                            ┌─────────────────┐
//!                                            │ RouteInstaller  │
//!                                            └─────────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. For every path, in registration order: take the window, classify it,
//!    update the bad-window counter
//! 2. Select usable paths (`single`: first one, `multi`: all of them)
//! 3. Build the candidate default route
//! 4. If it differs from the last installed route: remove the old one,
//!    install the new one, remember the new one whatever the kernel said

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{NoUsablePathPolicy, RoutePreference, SwitcherConfig};
use crate::error::Result;
use crate::registry::{Path, PathRegistry};
use crate::route::{CandidateRoute, NextHop};
use crate::stats::{HealthThresholds, ProbeWindow, WindowVerdict};
use crate::traits::RouteInstaller;

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A path's window was drained and classified
    WindowEvaluated {
        path: String,
        window: ProbeWindow,
        verdict: WindowVerdict,
        bad_windows: u32,
        usable: bool,
    },

    /// A path exceeded the bad-window tolerance
    PathExcluded { path: String, bad_windows: u32 },

    /// An excluded path had a GOOD window
    PathRestored { path: String },

    /// A route was installed
    RouteInstalled { route: CandidateRoute },

    /// The kernel rejected an install
    RouteInstallFailed { route: CandidateRoute, error: String },

    /// A superseded route was removed
    RouteRemoved { route: CandidateRoute },

    /// The kernel rejected a remove
    RouteRemoveFailed { route: CandidateRoute, error: String },

    /// The candidate equals the installed route
    RouteUnchanged { route: CandidateRoute },

    /// No path is usable and the last route stays in place
    RouteRetained { route: Option<CandidateRoute> },

    /// No path is usable and the last route was withdrawn
    RouteWithdrawn { route: CandidateRoute },

    /// Controller stopped
    Stopped { reason: String },
}

/// What reconciliation did during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing was installed before; the candidate was installed
    Installed,
    /// The previous route was removed and the candidate installed
    Replaced,
    /// The previous install of the same route failed and was attempted again
    ///
    /// Also used when no path is usable and the kept route never reached the
    /// kernel.
    RetriedInstall,
    /// The candidate equals the installed route; no kernel interaction
    Unchanged,
    /// No usable path; the last route was left in place
    KeptLast,
    /// No usable path; the last route was removed
    Withdrawn,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Route computed from this tick's usable paths
    pub candidate: CandidateRoute,
    /// What reconciliation did with it
    pub action: ReconcileAction,
}

/// Pick next-hops from the usable paths (in registration order)
pub fn select_next_hops(usable: &[Arc<Path>], preference: RoutePreference) -> Vec<NextHop> {
    match preference {
        RoutePreference::Single => usable.iter().take(1).map(|p| NextHop::via(p)).collect(),
        RoutePreference::Multi => usable.iter().map(|p| NextHop::via(p)).collect(),
    }
}

/// Route switching controller
///
/// Ticks are strictly sequential; the controller is the only writer of the
/// routing table and of every path's health classification.
pub struct RouteController {
    /// Paths, in preference order
    registry: PathRegistry,

    /// Routing table boundary
    installer: Box<dyn RouteInstaller>,

    /// Hysteresis thresholds
    thresholds: HealthThresholds,

    /// Routing table id
    table: u32,

    /// Single or multipath
    preference: RoutePreference,

    /// Behaviour with zero usable paths
    no_usable_path: NoUsablePathPolicy,

    /// Tick period
    tick_interval: Duration,

    /// Route recorded by the last reconciliation
    last_installed: Option<CandidateRoute>,

    /// Whether installing `last_installed` failed
    install_pending: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ControllerEvent>,
}

impl RouteController {
    /// Create a new controller
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields controller events
    pub fn new(
        registry: PathRegistry,
        installer: Box<dyn RouteInstaller>,
        config: &SwitcherConfig,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.controller.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let controller = Self {
            registry,
            installer,
            thresholds: HealthThresholds::from(&config.controller),
            table: config.table,
            preference: config.route_preference,
            no_usable_path: config.no_usable_path,
            tick_interval: config.controller.tick_interval(),
            last_installed: None,
            install_pending: false,
            event_tx: tx,
        };

        Ok((controller, rx))
    }

    /// Route recorded by the last reconciliation
    pub fn last_installed(&self) -> Option<&CandidateRoute> {
        self.last_installed.as_ref()
    }

    /// Run ticks until `shutdown` is cancelled
    ///
    /// The first tick happens one full period after start, so it sees a
    /// complete window. The installed route is left in place on shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            paths = self.registry.len(),
            table = self.table,
            preference = %self.preference,
            tick = ?self.tick_interval,
            installer = self.installer.installer_name(),
            "Running route switcher"
        );

        let mut interval =
            tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutting down route switcher");
                    self.emit_event(ControllerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    self.tick().await;
                }
            }
        }

        Ok(())
    }

    /// Evaluate one window and reconcile the route
    pub async fn tick(&mut self) -> TickOutcome {
        let usable = self.evaluate_paths();
        let candidate =
            CandidateRoute::default_route(self.table, select_next_hops(&usable, self.preference));
        let action = self.reconcile(&candidate).await;

        TickOutcome { candidate, action }
    }

    /// Drain and classify every path; returns the usable ones in order
    fn evaluate_paths(&self) -> Vec<Arc<Path>> {
        let mut usable = Vec::with_capacity(self.registry.len());

        for entry in self.registry.iter() {
            let path = entry.path();
            let window = entry.statistic().take_window();
            let verdict = self.thresholds.classify(window);
            let (previous, current) = entry.statistic().apply(verdict, &self.thresholds);

            info!(
                path = %path,
                received = window.received,
                sent = window.sent,
                verdict = ?verdict,
                bad_windows = current.bad_windows,
                "Window statistics"
            );

            self.emit_event(ControllerEvent::WindowEvaluated {
                path: path.name().to_string(),
                window,
                verdict,
                bad_windows: current.bad_windows,
                usable: current.is_usable(),
            });

            if previous.is_usable() && !current.is_usable() {
                warn!(path = %path, bad_windows = current.bad_windows, "Path excluded");
                self.emit_event(ControllerEvent::PathExcluded {
                    path: path.name().to_string(),
                    bad_windows: current.bad_windows,
                });
            } else if !previous.is_usable() && current.is_usable() {
                info!(path = %path, "Path restored");
                self.emit_event(ControllerEvent::PathRestored {
                    path: path.name().to_string(),
                });
            }

            if current.is_usable() {
                usable.push(Arc::clone(path));
            }
        }

        usable
    }

    /// Converge the kernel towards `candidate`
    async fn reconcile(&mut self, candidate: &CandidateRoute) -> ReconcileAction {
        if candidate.is_empty() {
            match self.no_usable_path {
                NoUsablePathPolicy::KeepLast => {
                    warn!("No healthy path available, keeping last installed route");
                    self.emit_event(ControllerEvent::RouteRetained {
                        route: self.last_installed.clone(),
                    });
                    // The kept route only exists if its install went through
                    if self.install_pending
                        && let Some(last) = self.last_installed.clone()
                    {
                        info!(route = %last, "Retrying failed install of kept route");
                        self.install_route(&last).await;
                        return ReconcileAction::RetriedInstall;
                    }
                    return ReconcileAction::KeptLast;
                }
                NoUsablePathPolicy::Withdraw => {
                    let Some(last) = self.last_installed.take() else {
                        debug!("No healthy path available, nothing to withdraw");
                        return ReconcileAction::Unchanged;
                    };
                    warn!(route = %last, "No healthy path available, withdrawing route");
                    if self.install_pending {
                        debug!(route = %last, "Route never reached the kernel, skipping remove");
                    } else {
                        self.remove_route(&last).await;
                    }
                    self.install_pending = false;
                    self.emit_event(ControllerEvent::RouteWithdrawn { route: last });
                    return ReconcileAction::Withdrawn;
                }
                NoUsablePathPolicy::InstallEmpty => {
                    warn!("No healthy path available, installing route without next-hops");
                }
            }
        }

        let action = match self.last_installed.take() {
            Some(last) if self.installer.equal(&last, candidate) => {
                if self.install_pending {
                    info!(route = %candidate, "Retrying failed route install");
                    self.install_route(candidate).await;
                    ReconcileAction::RetriedInstall
                } else {
                    debug!(route = %candidate, "Route unchanged");
                    self.emit_event(ControllerEvent::RouteUnchanged {
                        route: candidate.clone(),
                    });
                    ReconcileAction::Unchanged
                }
            }
            Some(last) => {
                info!(from = %last, to = %candidate, "Switching route");
                self.remove_route(&last).await;
                self.install_route(candidate).await;
                ReconcileAction::Replaced
            }
            None => {
                info!(route = %candidate, "Installing route");
                self.install_route(candidate).await;
                ReconcileAction::Installed
            }
        };

        self.last_installed = Some(candidate.clone());
        action
    }

    async fn install_route(&mut self, route: &CandidateRoute) {
        match self.installer.install(route).await {
            Ok(()) => {
                self.install_pending = false;
                self.emit_event(ControllerEvent::RouteInstalled {
                    route: route.clone(),
                });
            }
            Err(e) => {
                error!(route = %route, "[Route Add] {}", e);
                self.install_pending = true;
                self.emit_event(ControllerEvent::RouteInstallFailed {
                    route: route.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn remove_route(&self, route: &CandidateRoute) {
        match self.installer.remove(route).await {
            Ok(()) => {
                self.emit_event(ControllerEvent::RouteRemoved {
                    route: route.clone(),
                });
            }
            Err(e) => {
                error!(route = %route, "[Route Delete] {}", e);
                self.emit_event(ControllerEvent::RouteRemoveFailed {
                    route: route.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit a controller event
    fn emit_event(&self, event: ControllerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            // Nobody is listening; events are optional.
            Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
        }
    }
}
