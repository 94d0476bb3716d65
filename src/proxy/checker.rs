//! Proxy checker module running probes on a bounded worker pool

use crate::proxy::client::{EdgeEndpoint, FetchTimeouts, MetaFetcher, Route, TlsMetaFetcher};
use crate::proxy::models::{Candidate, DeadReason, Verdict};
use crate::proxy::shutdown::Shutdown;
use crate::proxy::sink::{ResultSet, ResultSink};
use crate::proxy::verdict::judge;
use crate::Result;
use anyhow::bail;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Default number of candidates probed at once
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Number of candidates in flight at once
    pub concurrency: usize,
    /// Timeouts for every fetch
    pub timeouts: FetchTimeouts,
    /// Reference endpoint both fetches go to
    pub endpoint: EdgeEndpoint,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeouts: FetchTimeouts::default(),
            endpoint: EdgeEndpoint::default(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Use the same timeout for connect, handshake and read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = FetchTimeouts {
            connect: timeout,
            handshake: timeout,
            read: timeout,
        };
        self
    }

    pub fn with_timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_endpoint(mut self, endpoint: EdgeEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Hard limit for one candidate: both fetches at their worst, twice over
    pub fn candidate_deadline(&self) -> Duration {
        self.timeouts.total() * 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        let FetchTimeouts {
            connect,
            handshake,
            read,
        } = self.timeouts;
        if connect.is_zero() || handshake.is_zero() || read.is_zero() {
            bail!("timeouts must be greater than zero");
        }
        if self.endpoint.host.trim().is_empty() {
            bail!("reference host must not be empty");
        }
        if !self.endpoint.path.starts_with('/') {
            bail!("reference path {:?} must start with '/'", self.endpoint.path);
        }
        Ok(())
    }
}

/// Counters for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub live: usize,
    pub dead: usize,
    pub cancelled: usize,
}

impl RunStats {
    fn record(&mut self, verdict: &Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Live(_) => self.live += 1,
            Verdict::Dead(DeadReason::Cancelled) => {
                self.dead += 1;
                self.cancelled += 1;
            }
            Verdict::Dead(_) => self.dead += 1,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    pub results: ResultSet,
    /// At least one candidate was cancelled by the shutdown signal
    pub interrupted: bool,
}

/// Proxy checker for validating candidates
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    fetcher: Arc<dyn MetaFetcher>,
}

impl ProxyChecker {
    /// Create a checker that probes over TLS
    pub fn new(config: CheckerConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = TlsMetaFetcher::new(config.endpoint.clone(), config.timeouts)?;
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
        })
    }

    /// Create a checker with a custom metadata source
    pub fn with_fetcher(config: CheckerConfig, fetcher: Arc<dyn MetaFetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single candidate. Both fetches always run to completion or
    /// time out before the verdict is made.
    pub async fn check_candidate(&self, candidate: &Candidate) -> Verdict {
        let probe = async {
            let (direct, proxied) = tokio::join!(
                self.fetcher.fetch(Route::Direct),
                self.fetcher.fetch(Route::Via(candidate.socket_addr())),
            );
            judge(candidate, direct.as_ref(), proxied.as_ref())
        };

        tokio::time::timeout(self.config.candidate_deadline(), probe)
            .await
            .unwrap_or(Verdict::Dead(DeadReason::TimedOut))
    }

    /// Check every candidate with at most `concurrency` in flight, then
    /// freeze the live ones into an ordered set.
    pub async fn run(&self, candidates: Vec<Candidate>, shutdown: Shutdown) -> RunReport {
        let sink = Arc::new(ResultSink::new());

        let stats = stream::iter(candidates)
            .map(|candidate| {
                let checker = self.clone();
                let sink = Arc::clone(&sink);
                let mut shutdown = shutdown.clone();
                let task = tokio::spawn(async move {
                    let verdict = tokio::select! {
                        verdict = checker.check_candidate(&candidate) => verdict,
                        _ = shutdown.wait() => Verdict::Dead(DeadReason::Cancelled),
                    };
                    if let Verdict::Live(live) = &verdict {
                        sink.push(live.clone()).await;
                    }
                    verdict
                });
                async move {
                    let verdict = task.await.unwrap_or_else(|e| {
                        error!(%candidate, error = %e, "Probe task failed");
                        Verdict::Dead(DeadReason::WorkerFailed)
                    });
                    (candidate, verdict)
                }
            })
            .buffer_unordered(self.config.concurrency)
            .fold(RunStats::default(), |mut stats, (candidate, verdict)| async move {
                log_verdict(&candidate, &verdict);
                stats.record(&verdict);
                stats
            })
            .await;

        RunReport {
            stats,
            results: sink.freeze().await,
            interrupted: stats.cancelled > 0,
        }
    }
}

fn log_verdict(candidate: &Candidate, verdict: &Verdict) {
    match verdict {
        Verdict::Live(live) => info!(
            %candidate,
            code = %live.country_code,
            asn = %live.organization,
            "LIVE"
        ),
        Verdict::Dead(reason) => info!(%candidate, %reason, "DEAD"),
    }
}
