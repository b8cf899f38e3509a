use super::source::TileSource;
use super::worker::{WorkerLoader, WorkerResponse};
use super::{TileKey, TileRequest, TileTexture};
use crate::core::config::{FetchMode, TileLoadingConfig};
use crate::prelude::{Arc, HashMap, HashSet, VecDeque};
use crate::runtime::{self, AsyncHandle};
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// What became of a scheduled tile
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded(TileTexture),
    Failed {
        key: TileKey,
        url: String,
        reason: String,
    },
    /// Dropped by `cancel` before it was started
    Cancelled { key: TileKey, url: String },
}

impl FetchOutcome {
    pub fn key(&self) -> TileKey {
        match self {
            FetchOutcome::Loaded(texture) => texture.key,
            FetchOutcome::Failed { key, .. } | FetchOutcome::Cancelled { key, .. } => *key,
        }
    }
}

/// A way of getting tile bytes off the main context
///
/// Implementations never block: `load` hands requests over, `poll` drains
/// whatever has completed since the last call.
pub trait TileTransport: Send {
    fn load(&mut self, requests: Vec<TileRequest>) -> Result<()>;

    fn poll(&mut self) -> Vec<WorkerResponse>;

    /// Drop requests that have not started; started ones still complete.
    fn abort(&mut self) -> Result<()>;

    /// Take back the requests not yet started for which `keep` is false.
    /// Withdrawn requests never produce a response.
    fn withdraw(&mut self, keep: &mut dyn FnMut(&TileRequest) -> bool) -> Vec<TileRequest> {
        let _ = keep;
        Vec::new()
    }

    fn terminate(&mut self);
}

/// In-process strategy issuing fixed-size batches
///
/// The next batch is started only once every request of the current one
/// has resolved, which bounds the number of open connections.
pub struct BatchedLoader {
    source: Arc<dyn TileSource>,
    batch_size: usize,
    backlog: VecDeque<TileRequest>,
    batch: Option<Box<dyn AsyncHandle>>,
    tx: Sender<WorkerResponse>,
    rx: Receiver<WorkerResponse>,
    aborted: Vec<WorkerResponse>,
}

impl BatchedLoader {
    pub fn new(source: Arc<dyn TileSource>, batch_size: usize) -> Self {
        let (tx, rx) = unbounded();
        Self {
            source,
            batch_size: batch_size.max(1),
            backlog: VecDeque::new(),
            batch: None,
            tx,
            rx,
            aborted: Vec::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn is_busy(&self) -> bool {
        self.batch.as_ref().is_some_and(|batch| !batch.is_finished())
    }

    fn pump(&mut self) -> Result<()> {
        if self.is_busy() || self.backlog.is_empty() {
            return Ok(());
        }
        let take = self.batch_size.min(self.backlog.len());
        let batch: Vec<TileRequest> = self.backlog.drain(..take).collect();
        log::debug!(
            "starting batch of {} tiles, {} waiting",
            batch.len(),
            self.backlog.len()
        );

        let source = self.source.clone();
        let tx = self.tx.clone();
        self.batch = Some(runtime::spawn(async move {
            let fetches = batch.into_iter().map(|request| {
                let source = source.clone();
                async move {
                    let result = source.fetch(&request.url).await;
                    WorkerResponse::from_fetch(request.key.col, request.key.row, request.url, result)
                }
            });
            for response in futures::future::join_all(fetches).await {
                let _ = tx.send(response);
            }
        })?);
        Ok(())
    }
}

impl TileTransport for BatchedLoader {
    fn load(&mut self, requests: Vec<TileRequest>) -> Result<()> {
        self.backlog.extend(requests);
        self.pump()
    }

    fn poll(&mut self) -> Vec<WorkerResponse> {
        let mut out = std::mem::take(&mut self.aborted);
        out.extend(self.rx.try_iter());
        if let Err(err) = self.pump() {
            log::error!("failed to start tile batch: {}", err);
        }
        out
    }

    fn abort(&mut self) -> Result<()> {
        let dropped = self
            .backlog
            .drain(..)
            .map(|r| WorkerResponse::aborted(r.key.col, r.key.row, r.url));
        self.aborted.extend(dropped);
        Ok(())
    }

    fn withdraw(&mut self, keep: &mut dyn FnMut(&TileRequest) -> bool) -> Vec<TileRequest> {
        let mut withdrawn = Vec::new();
        self.backlog.retain(|request| {
            let stays = keep(request);
            if !stays {
                withdrawn.push(request.clone());
            }
            stays
        });
        withdrawn
    }

    fn terminate(&mut self) {
        self.backlog.clear();
        if let Some(batch) = self.batch.take() {
            batch.cancel();
        }
    }
}

/// Idempotent tile scheduler in front of a `TileTransport`
///
/// Every scheduled url stays associated with its tile key until its outcome
/// has been delivered, so completions that race a `cancel` are still routed.
pub struct TileFetcher {
    transport: Box<dyn TileTransport>,
    queue: VecDeque<TileRequest>,
    pending: HashMap<String, TileKey>,
    loaded: HashSet<String>,
    destroyed: bool,
}

impl TileFetcher {
    pub fn new(transport: Box<dyn TileTransport>) -> Self {
        Self {
            transport,
            queue: VecDeque::new(),
            pending: HashMap::default(),
            loaded: HashSet::default(),
            destroyed: false,
        }
    }

    /// Pick the strategy named by the loading config.
    pub fn from_config(source: Arc<dyn TileSource>, config: &TileLoadingConfig) -> Result<Self> {
        let transport: Box<dyn TileTransport> = match config.fetch_mode {
            FetchMode::InProcess => Box::new(BatchedLoader::new(source, config.batch_size)),
            FetchMode::Worker => Box::new(WorkerLoader::spawn(source, config.batch_size)?),
        };
        Ok(Self::new(transport))
    }

    /// Queue a tile. Returns false, changing nothing, when the url is already
    /// loaded or in flight.
    pub fn schedule(&mut self, url: &str, level: u32, col: u32, row: u32) -> bool {
        if self.destroyed || self.loaded.contains(url) || self.pending.contains_key(url) {
            return false;
        }
        let key = TileKey::new(level, col, row);
        self.pending.insert(url.to_string(), key);
        self.queue.push_back(TileRequest::new(key, url));
        true
    }

    /// Dispatch the oldest queued request.
    pub fn load_one(&mut self) -> Result<bool> {
        match self.queue.pop_front() {
            Some(request) => {
                self.transport.load(vec![request])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dispatch every queued request, returning how many were sent.
    pub fn load_all(&mut self) -> Result<usize> {
        if self.queue.is_empty() {
            return Ok(0);
        }
        let requests: Vec<TileRequest> = self.queue.drain(..).collect();
        let count = requests.len();
        self.transport.load(requests)?;
        Ok(count)
    }

    /// Deliver completed fetches to `on_outcome`, returning how many were delivered.
    pub fn poll<F>(&mut self, mut on_outcome: F) -> usize
    where
        F: FnMut(FetchOutcome),
    {
        let mut delivered = 0;
        for response in self.transport.poll() {
            let Some(key) = self.pending.remove(&response.url) else {
                log::debug!("dropping response for unscheduled tile {}", response.url);
                continue;
            };
            let outcome = match response {
                WorkerResponse {
                    success: true,
                    buffer: Some(bytes),
                    url,
                    compressed,
                    ..
                } => {
                    self.loaded.insert(url.clone());
                    FetchOutcome::Loaded(TileTexture {
                        key,
                        url,
                        bytes,
                        compressed,
                    })
                }
                WorkerResponse {
                    aborted: true, url, ..
                } => FetchOutcome::Cancelled { key, url },
                WorkerResponse { url, error, .. } => FetchOutcome::Failed {
                    key,
                    url,
                    reason: error.unwrap_or_else(|| "no payload".into()),
                },
            };
            on_outcome(outcome);
            delivered += 1;
        }
        delivered
    }

    /// Clear the queue and abort whatever the transport has not started.
    pub fn cancel(&mut self) {
        for request in self.queue.drain(..) {
            self.pending.remove(&request.url);
        }
        if let Err(err) = self.transport.abort() {
            log::warn!("tile abort failed: {}", err);
        }
    }

    /// Withdraw every request, queued here or waiting in the transport, whose
    /// tile fails `keep`. Withdrawn urls can be scheduled again right away.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&TileKey) -> bool,
    {
        let mut withdrawn = Vec::new();
        self.queue.retain(|request| {
            let stays = keep(&request.key);
            if !stays {
                withdrawn.push(request.clone());
            }
            stays
        });
        withdrawn.extend(
            self.transport
                .withdraw(&mut |request: &TileRequest| keep(&request.key)),
        );
        for request in &withdrawn {
            self.pending.remove(&request.url);
        }
        withdrawn.len()
    }

    /// Forget a loaded url so it can be scheduled again.
    pub fn release(&mut self, url: &str) -> bool {
        self.loaded.remove(url)
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.cancel();
        self.transport.terminate();
        self.pending.clear();
        self.destroyed = true;
        log::debug!("tile fetcher destroyed");
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.contains(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains_key(url)
    }

    /// Tiles scheduled or in flight whose outcome has not been delivered
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for TileFetcher {
    fn drop(&mut self) {
        self.destroy();
    }
}
