//! Result sink collecting live proxies from concurrent workers

use crate::proxy::models::LiveProxy;
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tokio::sync::Mutex;

/// Thread-safe accumulation point for live verdicts
#[derive(Debug, Default)]
pub struct ResultSink {
    entries: Mutex<Vec<LiveProxy>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, proxy: LiveProxy) {
        self.entries.lock().await.push(proxy);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Take everything collected so far, ordered by ip then port
    pub async fn freeze(&self) -> ResultSet {
        let entries = std::mem::take(&mut *self.entries.lock().await);
        ResultSet::new(entries)
    }
}

/// Frozen, ordered set of live proxies ready for export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<LiveProxy>,
}

impl ResultSet {
    pub fn new(mut entries: Vec<LiveProxy>) -> Self {
        entries.sort_by_key(|p| (p.ip, p.port));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveProxy> {
        self.entries.iter()
    }

    /// Pretty-printed JSON array of `{ip, port, code, asn}` objects
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Write the set to `path`, creating parent directories as needed
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut content = self.to_json()?;
        content.push('\n');
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Read a previously saved set back
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<LiveProxy> = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a proxy list", path.display()))?;
        Ok(Self::new(entries))
    }
}

impl IntoIterator for ResultSet {
    type Item = LiveProxy;
    type IntoIter = std::vec::IntoIter<LiveProxy>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
