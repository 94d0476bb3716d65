//! Probe client fetching the reference endpoint's metadata document
//!
//! Each fetch opens its own TCP connection, either straight to the reference
//! host or to a candidate proxy. In both cases TLS server name validation and
//! the HTTP `Host` header stay addressed to the reference host, so the
//! candidate only acts as the transport-level next hop.

use crate::proxy::models::EdgeMetadata;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Default reference host
pub const DEFAULT_EDGE_HOST: &str = "speed.cloudflare.com";

/// Default path of the metadata document
pub const DEFAULT_EDGE_PATH: &str = "/meta";

/// Default HTTPS port of the reference host
pub const DEFAULT_EDGE_PORT: u16 = 443;

/// Default timeout for each fetch phase in seconds
pub const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 5;

/// Responses larger than this are cut off and will fail to parse
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/42.0.2311.135 Safari/537.36 Edge/12.10240";

/// Identity of the reference endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for EdgeEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_EDGE_HOST.to_string(),
            port: DEFAULT_EDGE_PORT,
            path: DEFAULT_EDGE_PATH.to_string(),
        }
    }
}

impl EdgeEndpoint {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Timeouts applied to the phases of a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub connect: Duration,
    pub handshake: Duration,
    pub read: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        let phase = Duration::from_secs(DEFAULT_PHASE_TIMEOUT_SECS);
        Self {
            connect: phase,
            handshake: phase,
            read: phase,
        }
    }
}

impl FetchTimeouts {
    /// Upper bound for one fetch
    pub fn total(&self) -> Duration {
        self.connect + self.handshake + self.read
    }
}

/// Where the TCP connection of a fetch goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the reference host
    Direct,
    /// To a candidate proxy
    Via(SocketAddr),
}

/// Failure of a single fetch. Never leaves the probe client; it is logged
/// and turned into an empty result.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("response has no header/body boundary")]
    MissingBody,
    #[error("body is not a metadata document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata document is empty")]
    EmptyDocument,
}

/// Source of metadata documents. `None` means the fetch produced nothing
/// usable, whatever the cause.
#[async_trait]
pub trait MetaFetcher: Send + Sync {
    async fn fetch(&self, route: Route) -> Option<EdgeMetadata>;
}

/// Fetches the metadata document over TLS on raw sockets
#[derive(Clone)]
pub struct TlsMetaFetcher {
    endpoint: EdgeEndpoint,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    timeouts: FetchTimeouts,
    request: Arc<[u8]>,
}

impl TlsMetaFetcher {
    /// Build a fetcher trusting the bundled web PKI roots
    pub fn new(endpoint: EdgeEndpoint, timeouts: FetchTimeouts) -> crate::Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self::with_tls_config(endpoint, timeouts, Arc::new(config))
    }

    /// Build a fetcher with its own TLS client configuration
    pub(crate) fn with_tls_config(
        endpoint: EdgeEndpoint,
        timeouts: FetchTimeouts,
        config: Arc<ClientConfig>,
    ) -> crate::Result<Self> {
        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|e| anyhow::anyhow!("invalid reference host {:?}: {}", endpoint.host, e))?;

        let request: Arc<[u8]> = build_request(&endpoint).into_bytes().into();
        Ok(Self {
            endpoint,
            server_name,
            connector: TlsConnector::from(config),
            timeouts,
            request,
        })
    }

    pub fn endpoint(&self) -> &EdgeEndpoint {
        &self.endpoint
    }

    async fn connect(&self, route: Route) -> Result<TcpStream, ProbeError> {
        let connecting = async {
            match route {
                Route::Direct => {
                    TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)).await
                }
                Route::Via(addr) => TcpStream::connect(addr).await,
            }
        };
        timeout(self.timeouts.connect, connecting)
            .await
            .map_err(|_| ProbeError::Timeout("connect"))?
            .map_err(ProbeError::Connect)
    }

    async fn try_fetch(&self, route: Route) -> Result<EdgeMetadata, ProbeError> {
        let tcp = self.connect(route).await?;
        tcp.set_nodelay(true)?;

        let mut tls = timeout(
            self.timeouts.handshake,
            self.connector.connect(self.server_name.clone(), tcp),
        )
        .await
        .map_err(|_| ProbeError::Timeout("TLS handshake"))?
        .map_err(ProbeError::Handshake)?;

        let mut raw = Vec::with_capacity(4096);
        let exchange = async {
            tls.write_all(&self.request).await?;
            tls.flush().await?;
            read_until_close(&mut tls, &mut raw).await
        };
        timeout(self.timeouts.read, exchange)
            .await
            .map_err(|_| ProbeError::Timeout("read"))??;

        parse_response(&raw)
    }
}

#[async_trait]
impl MetaFetcher for TlsMetaFetcher {
    async fn fetch(&self, route: Route) -> Option<EdgeMetadata> {
        match self.try_fetch(route).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!(?route, error = %e, "Fetch produced no metadata");
                None
            }
        }
    }
}

/// Build the minimal HTTP/1.1 request for the metadata document
pub fn build_request(endpoint: &EdgeEndpoint) -> String {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
        endpoint.path, endpoint.host, USER_AGENT
    )
}

/// Read until the peer closes the connection or the size cap is reached.
///
/// A peer that drops TLS without `close_notify` after sending data is taken
/// as having closed normally.
async fn read_until_close<R>(reader: R, buf: &mut Vec<u8>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.take(MAX_RESPONSE_BYTES).read_to_end(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !buf.is_empty() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Extract the metadata document from a raw HTTP response
pub fn parse_response(raw: &[u8]) -> Result<EdgeMetadata, ProbeError> {
    let text = String::from_utf8_lossy(raw);
    let (_, body) = text.split_once("\r\n\r\n").ok_or(ProbeError::MissingBody)?;
    let meta: EdgeMetadata = serde_json::from_str(body)?;
    if meta.is_empty() {
        return Err(ProbeError::EmptyDocument);
    }
    Ok(meta)
}
