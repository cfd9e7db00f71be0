//! Route installer implementations that live in the core
//!
//! Platform installers live in their own crates.

pub mod memory;

pub use memory::{InstallerCall, MemoryRouteInstaller};
