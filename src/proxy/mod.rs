//! Proxy module for probing candidate proxies
//!
//! This module provides functionality for:
//! - Parsing `ip:port` candidates from proxy lists
//! - Fetching the reference endpoint's metadata directly and through a candidate
//! - Deciding LIVE/DEAD from the two fetches
//! - Running probes on a bounded worker pool and collecting the live ones

pub mod checker;
pub mod client;
pub mod models;
pub mod parser;
pub mod shutdown;
pub mod sink;
pub mod verdict;

pub use checker::{CheckerConfig, ProxyChecker, RunReport, RunStats};
pub use client::{EdgeEndpoint, FetchTimeouts, MetaFetcher, ProbeError, Route, TlsMetaFetcher};
pub use models::{Candidate, DeadReason, EdgeMetadata, LiveProxy, Verdict};
pub use parser::{LineRejection, ParsedList, ProxyParser};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use sink::{ResultSet, ResultSink};
pub use verdict::judge;
