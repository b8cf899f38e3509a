use crate::prelude::{Arc, Duration, HashMap};
use crate::{Result, ZoomError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Shared async HTTP client for tile fetching
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("deepzoom/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to default http client: {}", err);
            reqwest::Client::new()
        })
});

/// Anything that can turn a tile url into bytes
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    timeout: Duration,
}

impl HttpTileSource {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpTileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = HTTP_CLIENT.get(url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(ZoomError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Serves tiles from memory, for tests and pre-baked exhibits
#[derive(Debug, Clone, Default)]
pub struct MemoryTileSource {
    tiles: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    latency: Option<Duration>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch, to keep requests in flight
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut tiles) = self.tiles.write() {
            tiles.insert(url.into(), bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TileSource for MemoryTileSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let tiles = self
            .tiles
            .read()
            .map_err(|_| ZoomError::Worker("tile store poisoned".into()))?;
        tiles.get(url).cloned().ok_or_else(|| ZoomError::Fetch {
            url: url.to_string(),
            reason: "not found".into(),
        })
    }
}
