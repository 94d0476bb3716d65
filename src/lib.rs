//! Proxy Probe - transparent proxy checker
//!
//! Checks whether `ip:port` candidates forward TLS traffic to a reference
//! edge endpoint, and records the egress country and network operator of
//! the ones that do.

pub mod logging;
pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
