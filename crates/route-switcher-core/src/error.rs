//! Error types for the route switcher
//!
//! Configuration errors are fatal at startup. Everything else is reported by
//! the task that hit it and never crosses into another path or the controller.

use thiserror::Error;

/// Result type alias for route switcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the route switcher
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing/invalid paths, targets or settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named interface does not exist on this host
    #[error("Link not found: {0}")]
    LinkNotFound(String),

    /// The interface exists but has no usable IPv4 address to probe from
    #[error("No usable address on interface {0}")]
    NoAddress(String),

    /// Probe socket errors
    #[error("Probe error: {0}")]
    Probe(String),

    /// Kernel routing table errors (add/delete rejected)
    #[error("Route error: {0}")]
    Route(String),

    /// Netlink transport errors
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "link not found" error
    pub fn link_not_found(name: impl Into<String>) -> Self {
        Self::LinkNotFound(name.into())
    }

    /// Create a "no address" error
    pub fn no_address(name: impl Into<String>) -> Self {
        Self::NoAddress(name.into())
    }

    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a route error
    pub fn route(msg: impl Into<String>) -> Self {
        Self::Route(msg.into())
    }

    /// Create a netlink error
    pub fn netlink(msg: impl Into<String>) -> Self {
        Self::Netlink(msg.into())
    }
}
