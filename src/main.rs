use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use proxy_probe::{
    logging,
    proxy::{CheckerConfig, EdgeEndpoint, ProxyChecker, ProxyParser, Shutdown},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// A transparent proxy checker with a bounded worker pool
#[derive(Parser)]
#[command(name = "proxy-probe")]
#[command(about = "Checks ip:port candidates as transparent proxies toward a reference edge endpoint")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'L', long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every candidate and save the live ones as JSON
    Check {
        /// Input file with one ip:port per line
        #[arg(default_value = "proxyip/data.txt")]
        input: PathBuf,
        /// Output file for live proxies
        #[arg(short, long, default_value = "proxyip/data.json")]
        output: PathBuf,
        /// Number of candidates probed at once
        #[arg(short = 'n', long, default_value = "20")]
        concurrency: usize,
        /// Timeout in seconds for each connect, handshake and read
        #[arg(long, default_value = "5")]
        timeout: u64,
        /// Reference host queried directly and through each candidate
        #[arg(long, default_value = proxy_probe::proxy::client::DEFAULT_EDGE_HOST)]
        host: String,
        /// Path of the metadata document on the reference host
        #[arg(long, default_value = proxy_probe::proxy::client::DEFAULT_EDGE_PATH)]
        path: String,
    },
    /// Validate a proxy list and print the accepted candidates
    Parse {
        /// Input file with one ip:port per line
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Check {
            input,
            output,
            concurrency,
            timeout,
            host,
            path,
        } => {
            let config = CheckerConfig::new()
                .with_concurrency(concurrency)
                .with_timeout(Duration::from_secs(timeout))
                .with_endpoint(EdgeEndpoint::new(host, path));
            let checker = ProxyChecker::new(config)?;

            let parsed = ProxyParser::parse_file(&input)?;
            info!(
                input = %input.display(),
                candidates = parsed.candidates.len(),
                rejected = parsed.rejected.len(),
                concurrency,
                "Loaded proxy list"
            );

            let (trigger, shutdown) = Shutdown::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling in-flight probes");
                    trigger.trigger();
                }
            });

            let report = checker.run(parsed.candidates, shutdown).await;
            if report.interrupted {
                bail!(
                    "run interrupted after {} of {} candidates settled; nothing written",
                    report.stats.total - report.stats.cancelled,
                    report.stats.total
                );
            }

            report.results.save_to_file(&output)?;
            println!(
                "Done: {} live, {} dead, {} rejected lines. Saved {} proxies to {:?}",
                report.stats.live,
                report.stats.dead,
                parsed.rejected.len(),
                report.results.len(),
                output
            );
        }
        Commands::Parse { input } => {
            let parsed = ProxyParser::parse_file(&input)?;
            for candidate in &parsed.candidates {
                println!("{}", candidate);
            }
            println!(
                "Parsed {} candidates from {:?}, rejected {} lines",
                parsed.candidates.len(),
                input,
                parsed.rejected.len()
            );
        }
    }

    Ok(())
}
