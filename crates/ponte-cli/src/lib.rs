//! Ponte CLI library
//!
//! Host-side plumbing behind the `ponte` binary: the `ponte.toml` host
//! configuration and the command implementations.

pub mod commands;
pub mod config;

pub use config::{ConfigError, HostConfig, LibraryConfig, ProxyConfig};
