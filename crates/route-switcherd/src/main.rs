// # route-switcherd - Route Switcher Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add health evaluation, selection or reconciliation logic here
// - All switching logic lives in route-switcher-core
// - Configuration is via environment variables (optionally seeded from a JSON file)
//
// The route-switcherd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the netlink and ICMP bindings into the core
// 4. Running the switcher until SIGINT/SIGTERM
//
// ## Configuration
//
// ### Paths and probing
// - `ROUTE_SWITCHER_EXTERNAL_INTERFACES`: Comma-separated `interface-gateway`
//   pairs in preference order (e.g. `eth0-10.21.0.254,eth1-192.168.1.1`)
// - `ROUTE_SWITCHER_PING_TARGETS`: Comma-separated IPv4 probe targets
// - `ROUTE_SWITCHER_PROBE_TIMEOUT_MS`: Round-trip timeout per echo (default 1000)
// - `ROUTE_SWITCHER_PROBE_INTERVAL_MS`: Period between probe rounds (default 1000)
//
// ### Routing
// - `ROUTE_SWITCHER_TABLE`: Target routing table (default 254)
// - `ROUTE_SWITCHER_ROUTE_PREFERENCE`: `single` or `multi` (default single)
// - `ROUTE_SWITCHER_NO_USABLE_PATH`: `keep-last`, `install-empty` or `withdraw`
//   (default keep-last)
//
// ### Health evaluation
// - `ROUTE_SWITCHER_TICK_SECS`: Evaluation window length (default 10)
// - `ROUTE_SWITCHER_GOOD_RATIO`: Reply ratio a window must exceed (default 0.9)
// - `ROUTE_SWITCHER_MAX_BAD_WINDOWS`: Bad windows tolerated (default 3)
//
// ### Daemon
// - `ROUTE_SWITCHER_CONFIG`: JSON configuration file; the variables above override it
// - `ROUTE_SWITCHER_DRY_RUN`: Keep routes in memory instead of the kernel
// - `ROUTE_SWITCHER_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export ROUTE_SWITCHER_EXTERNAL_INTERFACES=eth0-10.21.0.254,eth1-192.168.1.1
// export ROUTE_SWITCHER_PING_TARGETS=8.8.8.8,1.1.1.1
// export ROUTE_SWITCHER_ROUTE_PREFERENCE=multi
//
// route-switcherd
// ```

use anyhow::{Context, Result};
use route_switcher_core::config::{parse_paths, parse_targets};
use route_switcher_core::traits::{LinkResolver, ProberFactory, RouteInstaller};
use route_switcher_core::{MemoryRouteInstaller, RouteSwitcher, SwitcherConfig};
use route_switcher_icmp::IcmpProberFactory;
use route_switcher_netlink::{NetlinkLinkResolver, NetlinkRouteInstaller};
use std::env;
use std::fmt::Display;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long running tasks get to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    switcher: SwitcherConfig,
    dry_run: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` (an environment accessor)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut switcher = match lookup("ROUTE_SWITCHER_CONFIG") {
            Some(path) => SwitcherConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load ROUTE_SWITCHER_CONFIG file {}", path))?,
            None => SwitcherConfig::new(Vec::new(), Vec::new()),
        };

        if let Some(list) = lookup("ROUTE_SWITCHER_EXTERNAL_INTERFACES") {
            switcher.paths =
                parse_paths(&list).context("Invalid ROUTE_SWITCHER_EXTERNAL_INTERFACES")?;
        }
        if let Some(list) = lookup("ROUTE_SWITCHER_PING_TARGETS") {
            switcher.targets = parse_targets(&list).context("Invalid ROUTE_SWITCHER_PING_TARGETS")?;
        }
        if let Some(table) = parse_var(&lookup, "ROUTE_SWITCHER_TABLE")? {
            switcher.table = table;
        }
        if let Some(preference) = parse_var(&lookup, "ROUTE_SWITCHER_ROUTE_PREFERENCE")? {
            switcher.route_preference = preference;
        }
        if let Some(policy) = parse_var(&lookup, "ROUTE_SWITCHER_NO_USABLE_PATH")? {
            switcher.no_usable_path = policy;
        }
        if let Some(secs) = parse_var(&lookup, "ROUTE_SWITCHER_TICK_SECS")? {
            switcher.controller.tick_interval_secs = secs;
        }
        if let Some(ratio) = parse_var(&lookup, "ROUTE_SWITCHER_GOOD_RATIO")? {
            switcher.controller.good_ratio = ratio;
        }
        if let Some(windows) = parse_var(&lookup, "ROUTE_SWITCHER_MAX_BAD_WINDOWS")? {
            switcher.controller.max_bad_windows = windows;
        }
        if let Some(ms) = parse_var(&lookup, "ROUTE_SWITCHER_PROBE_TIMEOUT_MS")? {
            switcher.probe.max_rtt_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "ROUTE_SWITCHER_PROBE_INTERVAL_MS")? {
            switcher.probe.round_interval_ms = ms;
        }

        let dry_run = lookup("ROUTE_SWITCHER_DRY_RUN")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            switcher,
            dry_run,
            log_level: lookup("ROUTE_SWITCHER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.switcher.paths.is_empty() {
            anyhow::bail!(
                "ROUTE_SWITCHER_EXTERNAL_INTERFACES is required. \
                Set it via: export ROUTE_SWITCHER_EXTERNAL_INTERFACES=eth0-10.21.0.254,eth1-192.168.1.1"
            );
        }

        if self.switcher.targets.is_empty() {
            anyhow::bail!(
                "ROUTE_SWITCHER_PING_TARGETS is required. \
                Set it via: export ROUTE_SWITCHER_PING_TARGETS=8.8.8.8,1.1.1.1"
            );
        }

        self.switcher.validate()?;

        if log_level(&self.log_level).is_none() {
            anyhow::bail!(
                "ROUTE_SWITCHER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }
}

/// Parse an optional variable, failing on malformed values
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", name, raw, e))
        })
        .transpose()
}

fn log_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.log_level).unwrap_or(Level::INFO))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting route-switcherd");
    info!(
        "Configuration loaded: {} path(s), {} target(s)",
        config.switcher.paths.len(),
        config.switcher.targets.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> DaemonExitCode {
    let resolver: Arc<dyn LinkResolver> = Arc::new(NetlinkLinkResolver::new());
    let prober_factory: Arc<dyn ProberFactory> = Arc::new(IcmpProberFactory::new());

    let installer: Box<dyn RouteInstaller> = if config.dry_run {
        warn!("Dry run: routes are kept in memory, the kernel is not touched");
        Box::new(MemoryRouteInstaller::new())
    } else {
        Box::new(NetlinkRouteInstaller::new())
    };

    // Nobody consumes controller events here; dropping the receiver turns them off.
    let (switcher, _) =
        match RouteSwitcher::new(config.switcher, resolver, prober_factory, installer).await {
            Ok(started) => started,
            Err(e) => {
                error!("Startup failed: {}", e);
                return DaemonExitCode::ConfigError;
            }
        };

    for entry in switcher.registry().iter() {
        info!("Managing path: {}", entry.path());
    }

    let shutdown = CancellationToken::new();
    let mut task = tokio::spawn(switcher.run(shutdown.clone()));

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown error: {}", e),
            }
            shutdown.cancel();
            info!("Shutting down daemon");

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(()))) => DaemonExitCode::CleanShutdown,
                Ok(Ok(Err(e))) => {
                    error!("Daemon error: {}", e);
                    DaemonExitCode::RuntimeError
                }
                Ok(Err(e)) => {
                    error!("Switcher task failed: {}", e);
                    DaemonExitCode::RuntimeError
                }
                Err(_) => {
                    error!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
                    DaemonExitCode::RuntimeError
                }
            }
        }

        joined = &mut task => {
            match joined {
                Ok(Ok(())) => error!("Switcher stopped without a shutdown signal"),
                Ok(Err(e)) => error!("Daemon error: {}", e),
                Err(e) => error!("Switcher task failed: {}", e),
            }
            DaemonExitCode::RuntimeError
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received, or an error if the handlers
/// could not be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
