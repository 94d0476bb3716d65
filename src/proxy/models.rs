//! Proxy data models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A validated `ip:port` pair queued for probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Candidate {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Transport address the proxied fetch connects to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Metadata document returned by the reference endpoint.
///
/// Only `clientIp`, `country` and `asOrganization` are read; every other
/// field is kept opaque in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    #[serde(rename = "clientIp", default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "asOrganization", default)]
    pub as_organization: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeMetadata {
    /// True when the document carried nothing readable, e.g. `{}`
    pub fn is_empty(&self) -> bool {
        self.client_ip.is_none()
            && self.country.is_none()
            && self.as_organization.is_none()
            && self.extra.is_empty()
    }

    /// Country code with surrounding whitespace removed, empty if absent
    pub fn country_code(&self) -> &str {
        self.country.as_deref().unwrap_or_default().trim()
    }

    /// Network operator label with surrounding whitespace removed, empty if absent
    pub fn organization(&self) -> &str {
        self.as_organization.as_deref().unwrap_or_default().trim()
    }
}

/// A candidate confirmed to be a working proxy, in its exported shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveProxy {
    pub ip: Ipv4Addr,
    pub port: u16,
    #[serde(rename = "code")]
    pub country_code: String,
    #[serde(rename = "asn")]
    pub organization: String,
}

impl LiveProxy {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.ip, self.port)
    }
}

/// Why a candidate was classified as dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadReason {
    /// The direct fetch produced no metadata
    DirectUnavailable,
    /// The fetch through the candidate produced no metadata
    ProxyUnavailable,
    /// Both fetches saw the same client address
    NotSubstituted,
    /// Address was substituted but country or operator was blank
    MissingAttribution,
    /// The candidate exceeded its overall deadline
    TimedOut,
    /// The run was cancelled before the probe finished
    Cancelled,
    /// The worker task running the probe failed
    WorkerFailed,
}

impl fmt::Display for DeadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeadReason::DirectUnavailable => "direct fetch failed",
            DeadReason::ProxyUnavailable => "proxied fetch failed",
            DeadReason::NotSubstituted => "client address not substituted",
            DeadReason::MissingAttribution => "missing country or operator",
            DeadReason::TimedOut => "timed out",
            DeadReason::Cancelled => "cancelled",
            DeadReason::WorkerFailed => "worker failed",
        };
        f.write_str(text)
    }
}

/// Outcome of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Live(LiveProxy),
    Dead(DeadReason),
}

impl Verdict {
    pub fn is_live(&self) -> bool {
        matches!(self, Verdict::Live(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_display_and_addr() {
        let candidate = Candidate::new(Ipv4Addr::new(192, 168, 1, 1), 8080);
        assert_eq!(candidate.to_string(), "192.168.1.1:8080");
        assert_eq!(candidate.socket_addr().to_string(), "192.168.1.1:8080");
    }

    #[test]
    fn test_edge_metadata_keeps_extra_fields() {
        let meta: EdgeMetadata = serde_json::from_str(
            r#"{"clientIp":"5.5.5.5","country":"DE","asOrganization":"Hetzner","colo":"FRA","asn":24940}"#,
        )
        .unwrap();
        assert_eq!(meta.client_ip.as_deref(), Some("5.5.5.5"));
        assert_eq!(meta.country_code(), "DE");
        assert_eq!(meta.organization(), "Hetzner");
        assert_eq!(meta.extra.get("colo"), Some(&Value::from("FRA")));
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_edge_metadata_missing_and_null_fields() {
        let meta: EdgeMetadata = serde_json::from_str(r#"{"clientIp":null}"#).unwrap();
        assert!(meta.client_ip.is_none());
        assert_eq!(meta.country_code(), "");
        assert_eq!(meta.organization(), "");

        let empty: EdgeMetadata = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_edge_metadata_trims_attribution() {
        let meta: EdgeMetadata =
            serde_json::from_str(r#"{"country":"  US ","asOrganization":"\tACME\n"}"#).unwrap();
        assert_eq!(meta.country_code(), "US");
        assert_eq!(meta.organization(), "ACME");
    }

    #[test]
    fn test_live_proxy_exported_shape() {
        let live = LiveProxy {
            ip: Ipv4Addr::new(1, 2, 3, 4),
            port: 443,
            country_code: "SG".to_string(),
            organization: "Example Net".to_string(),
        };
        let value = serde_json::to_value(&live).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ip": "1.2.3.4", "port": 443, "code": "SG", "asn": "Example Net"})
        );
        assert_eq!(live.candidate(), Candidate::new(Ipv4Addr::new(1, 2, 3, 4), 443));
    }

    #[test]
    fn test_verdict_is_live() {
        assert!(!Verdict::Dead(DeadReason::TimedOut).is_live());
        assert_eq!(DeadReason::NotSubstituted.to_string(), "client address not substituted");
    }
}
