use async_trait::async_trait;
use proxy_probe::proxy::{
    CheckerConfig, EdgeMetadata, MetaFetcher, ProxyChecker, ProxyParser, ResultSet, Route,
    Shutdown,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Answers like the edge endpoint would: the direct client address is fixed,
/// proxies are looked up by transport address.
struct ScriptedEdge {
    proxies: HashMap<SocketAddr, EdgeMetadata>,
}

#[async_trait]
impl MetaFetcher for ScriptedEdge {
    async fn fetch(&self, route: Route) -> Option<EdgeMetadata> {
        match route {
            Route::Direct => serde_json::from_str(r#"{"clientIp":"203.0.113.7","colo":"AMS"}"#).ok(),
            Route::Via(addr) => self.proxies.get(&addr).cloned(),
        }
    }
}

fn edge_meta(json: &str) -> EdgeMetadata {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn test_list_to_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.txt");
    let output = dir.path().join("data.json");
    std::fs::write(
        &input,
        "# scraped list\n\
         198.51.100.20:443\n\
         198.51.100.3:8443\n\
         \n\
         198.51.100.9:80\n\
         198.51.100.4:2053\n\
         999.1.1.1:80\n\
         198.51.100.5:70000\n\
         garbage\n",
    )
    .unwrap();

    let parsed = ProxyParser::parse_file(&input).unwrap();
    assert_eq!(parsed.candidates.len(), 4);
    assert_eq!(parsed.rejected.len(), 3);

    let addr = |s: &str| s.parse::<SocketAddr>().unwrap();
    let proxies = HashMap::from([
        (
            addr("198.51.100.20:443"),
            edge_meta(r#"{"clientIp":"198.51.100.20","country":"SG","asOrganization":"Example SG"}"#),
        ),
        (
            addr("198.51.100.3:8443"),
            edge_meta(r#"{"clientIp":"192.0.2.1","country":"DE","asOrganization":" Hetzner "}"#),
        ),
        // Routes nowhere new: same address as the direct fetch.
        (
            addr("198.51.100.9:80"),
            edge_meta(r#"{"clientIp":"203.0.113.7","country":"NL","asOrganization":"Leaseweb"}"#),
        ),
        // Substitutes but cannot be attributed.
        (
            addr("198.51.100.4:2053"),
            edge_meta(r#"{"clientIp":"192.0.2.2","country":"","asOrganization":"Unknown"}"#),
        ),
    ]);

    let config = CheckerConfig::new()
        .with_concurrency(2)
        .with_timeout(Duration::from_secs(1));
    let checker = ProxyChecker::with_fetcher(config, Arc::new(ScriptedEdge { proxies })).unwrap();
    let report = checker.run(parsed.candidates, Shutdown::never()).await;

    assert!(!report.interrupted);
    assert_eq!(report.stats.total, 4);
    assert_eq!(report.stats.live, 2);
    assert_eq!(report.stats.dead, 2);

    report.results.save_to_file(&output).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        written,
        serde_json::json!([
            {"ip": "198.51.100.3", "port": 8443, "code": "DE", "asn": "Hetzner"},
            {"ip": "198.51.100.20", "port": 443, "code": "SG", "asn": "Example SG"}
        ])
    );

    let reloaded = ResultSet::load_from_file(&output).unwrap();
    assert_eq!(reloaded, report.results);
}

#[tokio::test]
async fn test_all_dead_list_writes_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.txt");
    let output = dir.path().join("data.json");
    std::fs::write(&input, "10.0.0.1:80\n10.0.0.2:80\n").unwrap();

    let parsed = ProxyParser::parse_file(&input).unwrap();
    let checker = ProxyChecker::with_fetcher(
        CheckerConfig::new(),
        Arc::new(ScriptedEdge {
            proxies: HashMap::new(),
        }),
    )
    .unwrap();
    let report = checker.run(parsed.candidates, Shutdown::never()).await;
    assert_eq!(report.stats.dead, 2);

    report.results.save_to_file(&output).unwrap();
    assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "[]");
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ProxyParser::parse_file(dir.path().join("nope.txt")).is_err());
}
