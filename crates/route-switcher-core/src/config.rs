//! Configuration types for the route switcher
//!
//! This module defines all configuration structures used throughout the crate,
//! together with the thresholds that govern health evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path as FsPath;
use std::str::FromStr;
use std::time::Duration;

/// Default routing table (`main`)
pub const DEFAULT_TABLE: u32 = 254;

/// Default controller tick period
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// A window is GOOD when `received / sent` is strictly above this ratio
pub const DEFAULT_GOOD_RATIO: f64 = 0.9;

/// A path stays usable while its consecutive bad windows are at most this
pub const DEFAULT_MAX_BAD_WINDOWS: u32 = 3;

/// Replies arriving later than this are ignored
pub const DEFAULT_PROBE_MAX_RTT_MS: u64 = 1000;

/// Period between the starts of two probe rounds
pub const DEFAULT_PROBE_ROUND_INTERVAL_MS: u64 = 1000;

/// Longest accepted controller tick period (one day)
pub const MAX_TICK_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted probe round period (one hour)
pub const MAX_PROBE_ROUND_INTERVAL_MS: u64 = 3_600_000;

/// Minimum number of monitored paths
pub const MIN_PATHS: usize = 2;

/// Main route switcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitcherConfig {
    /// Monitored paths, in preference order
    pub paths: Vec<PathConfig>,

    /// Addresses probed over every path
    pub targets: Vec<Ipv4Addr>,

    /// Routing table the default route is written to
    #[serde(default = "default_table")]
    pub table: u32,

    /// Single fallback route or equal-cost multipath
    #[serde(default)]
    pub route_preference: RoutePreference,

    /// What to do when every path is excluded
    #[serde(default)]
    pub no_usable_path: NoUsablePathPolicy,

    /// Controller settings
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Capacity of the controller event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SwitcherConfig {
    /// Create a configuration with default settings
    pub fn new(paths: Vec<PathConfig>, targets: Vec<Ipv4Addr>) -> Self {
        Self {
            paths,
            targets,
            table: default_table(),
            route_preference: RoutePreference::default(),
            no_usable_path: NoUsablePathPolicy::default(),
            controller: ControllerConfig::default(),
            probe: ProbeConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<FsPath>) -> Result<Self, crate::Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.paths.len() < MIN_PATHS {
            return Err(crate::Error::config(format!(
                "Require at least {} external interfaces, got {}",
                MIN_PATHS,
                self.paths.len()
            )));
        }

        for (i, path) in self.paths.iter().enumerate() {
            path.validate()?;
            if self.paths[..i].contains(path) {
                return Err(crate::Error::config(format!("Duplicate path: {}", path)));
            }
        }

        if self.targets.is_empty() {
            return Err(crate::Error::config("Require at least one ping target"));
        }

        if self.table == 0 {
            return Err(crate::Error::config("Routing table id must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.controller.validate()?;
        self.probe.validate()?;

        Ok(())
    }
}

/// One monitored path: a local interface and the gateway reached through it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathConfig {
    /// Interface name (e.g., "eth0")
    pub interface: String,
    /// Gateway address on that interface
    pub gateway: Ipv4Addr,
}

impl PathConfig {
    /// Create a new path configuration
    pub fn new(interface: impl Into<String>, gateway: Ipv4Addr) -> Self {
        Self {
            interface: interface.into(),
            gateway,
        }
    }

    /// Validate the path configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interface.is_empty() {
            return Err(crate::Error::config("Interface name cannot be empty"));
        }
        if self.gateway.is_unspecified() || self.gateway.is_broadcast() {
            return Err(crate::Error::config(format!(
                "Invalid gateway ip: {}",
                self.gateway
            )));
        }
        Ok(())
    }
}

impl FromStr for PathConfig {
    type Err = crate::Error;

    /// Parse `interface-gateway`, e.g. `eth0-10.21.0.254`
    ///
    /// Splits at the last `-` so interface names like `wan-1` parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (interface, gateway) = s.rsplit_once('-').ok_or_else(|| {
            crate::Error::config(format!(
                "External interface '{}' doesn't have 2 parts, e.g. eth0-10.21.0.254",
                s
            ))
        })?;

        let gateway = gateway
            .parse::<Ipv4Addr>()
            .map_err(|_| crate::Error::config(format!("Invalid gateway ip: {}", gateway)))?;

        let path = Self::new(interface, gateway);
        path.validate()?;
        Ok(path)
    }
}

impl fmt::Display for PathConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.interface, self.gateway)
    }
}

/// Parse a comma-separated list of `interface-gateway` pairs
pub fn parse_paths(list: &str) -> Result<Vec<PathConfig>, crate::Error> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Parse a comma-separated list of IPv4 probe targets
pub fn parse_targets(list: &str) -> Result<Vec<Ipv4Addr>, crate::Error> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Ipv4Addr>()
                .map_err(|_| crate::Error::config(format!("IP {} is invalid", s)))
        })
        .collect()
}

/// How usable paths become next-hops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePreference {
    /// Only the first usable path, in configured order
    #[default]
    Single,
    /// Every usable path as an equal-cost next-hop
    Multi,
}

impl FromStr for RoutePreference {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            other => Err(crate::Error::config(format!(
                "Route preference '{}' is not supported (single|multi)",
                other
            ))),
        }
    }
}

impl fmt::Display for RoutePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Multi => f.write_str("multi"),
        }
    }
}

/// Behaviour when no path is usable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoUsablePathPolicy {
    /// Leave the last installed route in the kernel untouched
    #[default]
    KeepLast,
    /// Reconcile towards a route with zero next-hops
    InstallEmpty,
    /// Delete the last installed route and install nothing
    Withdraw,
}

impl FromStr for NoUsablePathPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep-last" => Ok(Self::KeepLast),
            "install-empty" => Ok(Self::InstallEmpty),
            "withdraw" => Ok(Self::Withdraw),
            other => Err(crate::Error::config(format!(
                "No-usable-path policy '{}' is not supported (keep-last|install-empty|withdraw)",
                other
            ))),
        }
    }
}

impl fmt::Display for NoUsablePathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepLast => f.write_str("keep-last"),
            Self::InstallEmpty => f.write_str("install-empty"),
            Self::Withdraw => f.write_str("withdraw"),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Evaluation window length (in seconds)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Windows with a reply ratio strictly above this are GOOD
    #[serde(default = "default_good_ratio")]
    pub good_ratio: f64,

    /// Consecutive BAD windows tolerated before a path is excluded
    #[serde(default = "default_max_bad_windows")]
    pub max_bad_windows: u32,
}

impl ControllerConfig {
    /// Evaluation window length
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Validate the controller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_secs == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        if self.tick_interval_secs > MAX_TICK_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Tick interval must be at most {}s, got {}s",
                MAX_TICK_INTERVAL_SECS, self.tick_interval_secs
            )));
        }
        if !(0.0..1.0).contains(&self.good_ratio) {
            return Err(crate::Error::config(format!(
                "Good ratio must be in [0, 1), got {}",
                self.good_ratio
            )));
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            good_ratio: default_good_ratio(),
            max_bad_windows: default_max_bad_windows(),
        }
    }
}

/// Probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Round-trip timeout for a single echo (in milliseconds)
    #[serde(default = "default_probe_max_rtt_ms")]
    pub max_rtt_ms: u64,

    /// Period between the starts of two rounds (in milliseconds)
    #[serde(default = "default_probe_round_interval_ms")]
    pub round_interval_ms: u64,
}

impl ProbeConfig {
    /// Round-trip timeout
    pub fn max_rtt(&self) -> Duration {
        Duration::from_millis(self.max_rtt_ms)
    }

    /// Round period
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }

    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_rtt_ms == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        // The timeout is bounded through the interval below
        if self.round_interval_ms > MAX_PROBE_ROUND_INTERVAL_MS {
            return Err(crate::Error::config(format!(
                "Probe interval must be at most {}ms, got {}ms",
                MAX_PROBE_ROUND_INTERVAL_MS, self.round_interval_ms
            )));
        }
        if self.round_interval_ms < self.max_rtt_ms {
            return Err(crate::Error::config(format!(
                "Probe interval ({}ms) must not be shorter than the probe timeout ({}ms)",
                self.round_interval_ms, self.max_rtt_ms
            )));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_rtt_ms: default_probe_max_rtt_ms(),
            round_interval_ms: default_probe_round_interval_ms(),
        }
    }
}

fn default_table() -> u32 {
    DEFAULT_TABLE
}

fn default_tick_interval_secs() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_good_ratio() -> f64 {
    DEFAULT_GOOD_RATIO
}

fn default_max_bad_windows() -> u32 {
    DEFAULT_MAX_BAD_WINDOWS
}

fn default_probe_max_rtt_ms() -> u64 {
    DEFAULT_PROBE_MAX_RTT_MS
}

fn default_probe_round_interval_ms() -> u64 {
    DEFAULT_PROBE_ROUND_INTERVAL_MS
}

fn default_event_channel_capacity() -> usize {
    1000
}
