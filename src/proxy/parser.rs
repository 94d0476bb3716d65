//! Proxy parser module for turning `ip:port` lines into candidates

use crate::proxy::models::Candidate;
use crate::Result;
use anyhow::Context;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Reason a non-empty input line was not accepted as a candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineRejection {
    #[error("missing ':' separator")]
    MissingSeparator,
    #[error("more than one ':' separator")]
    MultipleSeparators,
    #[error("port {0:?} is not a number")]
    InvalidPort(String),
    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(String),
    #[error("{0:?} is not an IPv4 address")]
    InvalidIp(String),
    #[error("line is not valid UTF-8")]
    InvalidEncoding,
}

/// Candidates read from a list, plus the lines that were turned away
#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub candidates: Vec<Candidate>,
    pub rejected: Vec<(String, LineRejection)>,
}

/// Proxy parser for `ip:port` proxy lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Blank lines and `#` comments yield `Ok(None)`. Anything else must be
    /// exactly `IPv4:PORT`.
    pub fn parse_line(line: &str) -> std::result::Result<Option<Candidate>, LineRejection> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (ip_part, port_part) = line
            .rsplit_once(':')
            .ok_or(LineRejection::MissingSeparator)?;
        if ip_part.contains(':') {
            return Err(LineRejection::MultipleSeparators);
        }

        let port = Self::parse_port(port_part)?;
        let ip: Ipv4Addr = ip_part
            .parse()
            .map_err(|_| LineRejection::InvalidIp(ip_part.to_string()))?;

        Ok(Some(Candidate::new(ip, port)))
    }

    fn parse_port(raw: &str) -> std::result::Result<u16, LineRejection> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LineRejection::InvalidPort(raw.to_string()));
        }
        // All digits, so a parse failure can only be overflow.
        match raw.parse::<u32>() {
            Ok(port @ 1..=65535) => Ok(port as u16),
            _ => Err(LineRejection::PortOutOfRange(raw.to_string())),
        }
    }

    /// Parse proxies from a string (multiple lines)
    pub fn parse_string(content: &str) -> ParsedList {
        Self::parse_bytes(content.as_bytes())
    }

    /// Parse proxies from raw bytes. Lines that are not UTF-8 are rejected
    /// one by one instead of failing the whole list.
    pub fn parse_bytes(content: &[u8]) -> ParsedList {
        let mut parsed = ParsedList::default();
        for raw in content.split(|&b| b == b'\n') {
            let outcome = match std::str::from_utf8(raw) {
                Ok(line) => Self::parse_line(line),
                Err(_) => Err(LineRejection::InvalidEncoding),
            };
            match outcome {
                Ok(Some(candidate)) => parsed.candidates.push(candidate),
                Ok(None) => {}
                Err(reason) => {
                    let line = String::from_utf8_lossy(raw).trim().to_string();
                    warn!(line = %line, %reason, "Invalid proxy line");
                    parsed.rejected.push((line, reason));
                }
            }
        }
        parsed
    }

    /// Parse proxies from a file. Only a missing or unreadable file is an error.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedList> {
        let path = path.as_ref();
        let content = fs::read(path)
            .with_context(|| format!("failed to read proxy list {}", path.display()))?;
        Ok(Self::parse_bytes(&content))
    }
}
