//! Background tile worker
//!
//! A tokio task that receives `WorkerRequest`s over a channel, fetches tiles
//! through a `TileSource` with a bounded number of requests in flight, and
//! answers with one `WorkerResponse` per tile. Nothing is shared with the
//! caller except the two channels.

use super::loader::TileTransport;
use super::source::TileSource;
use super::{compressed_format, TileRequest};
use crate::prelude::{Arc, VecDeque};
use crate::runtime::{self, AsyncHandle};
use crate::{Result, ZoomError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Command sent to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// `[col, row, url]` triples
    Load { tiles: Vec<(u32, u32, String)> },
    /// Drop everything not yet started
    Abort,
}

/// One answer per requested tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub success: bool,
    pub url: String,
    pub col: u32,
    pub row: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<Vec<u8>>,
    /// Compressed texture container of `buffer`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Dropped by an abort before it was started
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}

impl WorkerResponse {
    pub fn loaded(col: u32, row: u32, url: String, buffer: Vec<u8>) -> Self {
        let compressed = compressed_format(&url);
        Self {
            success: true,
            url,
            col,
            row,
            buffer: Some(buffer),
            compressed,
            error: None,
            aborted: false,
        }
    }

    pub fn failed(col: u32, row: u32, url: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            url,
            col,
            row,
            buffer: None,
            compressed: None,
            error: Some(error.into()),
            aborted: false,
        }
    }

    pub fn aborted(col: u32, row: u32, url: String) -> Self {
        Self {
            aborted: true,
            ..Self::failed(col, row, url, "aborted")
        }
    }

    /// Response for a finished fetch
    pub fn from_fetch(col: u32, row: u32, url: String, result: Result<Vec<u8>>) -> Self {
        match result {
            Ok(bytes) => Self::loaded(col, row, url, bytes),
            Err(err) => {
                log::warn!("tile {} failed: {}", url, err);
                Self::failed(col, row, url, err.to_string())
            }
        }
    }
}

async fn fetch_one(source: Arc<dyn TileSource>, tile: (u32, u32, String)) -> WorkerResponse {
    let (col, row, url) = tile;
    let result = source.fetch(&url).await;
    WorkerResponse::from_fetch(col, row, url, result)
}

async fn run_worker(
    source: Arc<dyn TileSource>,
    batch_size: usize,
    mut commands: mpsc::UnboundedReceiver<WorkerRequest>,
    results: Sender<WorkerResponse>,
) {
    let mut queue: VecDeque<(u32, u32, String)> = VecDeque::new();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < batch_size {
            match queue.pop_front() {
                Some(tile) => in_flight.push(fetch_one(source.clone(), tile)),
                None => break,
            }
        }

        tokio::select! {
            command = commands.recv() => match command {
                Some(WorkerRequest::Load { tiles }) => {
                    log::debug!("worker queued {} tiles", tiles.len());
                    queue.extend(tiles);
                }
                Some(WorkerRequest::Abort) => {
                    log::debug!("worker abort, dropping {} queued tiles", queue.len());
                    for (col, row, url) in queue.drain(..) {
                        if results.send(WorkerResponse::aborted(col, row, url)).is_err() {
                            return;
                        }
                    }
                }
                None => break,
            },
            Some(response) = in_flight.next(), if !in_flight.is_empty() => {
                if results.send(response).is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("tile worker stopped");
}

/// Fetch strategy running in a background task
///
/// Requests wait in a local backlog until the worker has room for them, so
/// at most `batch_size` are ever handed over and the rest can be withdrawn.
pub struct WorkerLoader {
    commands: Option<mpsc::UnboundedSender<WorkerRequest>>,
    results: Receiver<WorkerResponse>,
    task: Option<Box<dyn AsyncHandle>>,
    batch_size: usize,
    backlog: VecDeque<TileRequest>,
    in_flight: usize,
    aborted: Vec<WorkerResponse>,
}

impl WorkerLoader {
    /// Start the worker with at most `batch_size` fetches in flight.
    pub fn spawn(source: Arc<dyn TileSource>, batch_size: usize) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = unbounded();
        let task = runtime::spawn(run_worker(source, batch_size, command_rx, result_tx))?;
        Ok(Self {
            commands: Some(command_tx),
            results: result_rx,
            task: Some(task),
            batch_size,
            backlog: VecDeque::new(),
            in_flight: 0,
            aborted: Vec::new(),
        })
    }

    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| ZoomError::ChannelClosed("worker terminated".into()))?;
        commands
            .send(request)
            .map_err(|_| ZoomError::ChannelClosed("worker command channel".into()))
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn pump(&mut self) -> Result<()> {
        let free = self
            .batch_size
            .saturating_sub(self.in_flight)
            .min(self.backlog.len());
        if free == 0 {
            return Ok(());
        }
        let tiles = self
            .backlog
            .drain(..free)
            .map(|r| (r.key.col, r.key.row, r.url))
            .collect();
        self.send(WorkerRequest::Load { tiles })?;
        self.in_flight += free;
        Ok(())
    }
}

impl TileTransport for WorkerLoader {
    fn load(&mut self, requests: Vec<TileRequest>) -> Result<()> {
        self.backlog.extend(requests);
        self.pump()
    }

    fn poll(&mut self) -> Vec<WorkerResponse> {
        let mut out = std::mem::take(&mut self.aborted);
        let received: Vec<WorkerResponse> = self.results.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(received.len());
        out.extend(received);
        if let Err(err) = self.pump() {
            log::error!("failed to hand tiles to the worker: {}", err);
        }
        out
    }

    fn abort(&mut self) -> Result<()> {
        let dropped = self
            .backlog
            .drain(..)
            .map(|r| WorkerResponse::aborted(r.key.col, r.key.row, r.url));
        self.aborted.extend(dropped);
        self.send(WorkerRequest::Abort)
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
        self.commands = None;
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

impl Drop for WorkerLoader {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::source::MemoryTileSource;
    use crate::tiles::TileKey;
    use std::time::Duration;

    #[test]
    fn test_protocol_shape() {
        let load = WorkerRequest::Load {
            tiles: vec![(1, 2, "p/3/1_2.jpg".into())],
        };
        assert_eq!(
            serde_json::to_string(&load).unwrap(),
            r#"{"command":"load","tiles":[[1,2,"p/3/1_2.jpg"]]}"#
        );
        assert_eq!(
            serde_json::to_string(&WorkerRequest::Abort).unwrap(),
            r#"{"command":"abort"}"#
        );

        let response: WorkerResponse =
            serde_json::from_str(r#"{"success":false,"url":"u","col":0,"row":4}"#).unwrap();
        assert!(!response.aborted);
        assert!(response.buffer.is_none());
    }

    #[test]
    fn test_compressed_payload_tagged() {
        let response = WorkerResponse::loaded(0, 0, "p/1/0_0.ktx2".into(), vec![0xAB]);
        assert_eq!(response.compressed.as_deref(), Some("ktx2"));
        let plain = WorkerResponse::loaded(0, 0, "p/1/0_0.png".into(), vec![0xAB]);
        assert!(plain.compressed.is_none());
    }

    async fn collect(loader: &mut WorkerLoader, count: usize) -> Vec<WorkerResponse> {
        let mut out = Vec::new();
        for _ in 0..200 {
            out.extend(loader.poll());
            if out.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        out
    }

    #[tokio::test]
    async fn test_worker_fetches_and_fails() {
        let source = MemoryTileSource::new();
        source.insert("t/1/0_0.jpg", vec![1]);
        let mut loader = WorkerLoader::spawn(Arc::new(source), 2).unwrap();
        loader
            .load(vec![
                TileRequest::new(TileKey::new(1, 0, 0), "t/1/0_0.jpg"),
                TileRequest::new(TileKey::new(1, 1, 0), "t/1/1_0.jpg"),
            ])
            .unwrap();

        let mut responses = collect(&mut loader, 2).await;
        responses.sort_by(|a, b| a.url.cmp(&b.url));
        assert_eq!(responses.len(), 2);
        assert!(responses[0].success);
        assert_eq!(responses[0].buffer, Some(vec![1]));
        assert!(!responses[1].success);
        assert!(!responses[1].aborted);
    }

    #[tokio::test]
    async fn test_abort_drops_queued_tiles() {
        let source = MemoryTileSource::new().with_latency(Duration::from_millis(30));
        for col in 0..6 {
            source.insert(format!("t/2/{}_0.jpg", col), vec![col as u8]);
        }
        let mut loader = WorkerLoader::spawn(Arc::new(source), 1).unwrap();
        let requests = (0..6)
            .map(|col| TileRequest::new(TileKey::new(2, col, 0), format!("t/2/{}_0.jpg", col)))
            .collect();
        loader.load(requests).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        loader.abort().unwrap();

        let responses = collect(&mut loader, 6).await;
        assert_eq!(responses.len(), 6);
        let aborted = responses.iter().filter(|r| r.aborted).count();
        assert!(aborted >= 4, "only {} aborted", aborted);
        assert!(responses.iter().any(|r| r.success));
    }

    #[tokio::test]
    async fn test_withdrawn_tiles_never_reach_worker() {
        let source = MemoryTileSource::new().with_latency(Duration::from_millis(20));
        for col in 0..4 {
            source.insert(format!("t/3/{}_0.jpg", col), vec![col as u8]);
        }
        let mut loader = WorkerLoader::spawn(Arc::new(source), 1).unwrap();
        let requests = (0..4)
            .map(|col| TileRequest::new(TileKey::new(3, col, 0), format!("t/3/{}_0.jpg", col)))
            .collect();
        loader.load(requests).unwrap();
        assert_eq!(loader.backlog_len(), 3);

        let withdrawn = loader.withdraw(&mut |r: &TileRequest| r.key.col != 2);
        assert_eq!(withdrawn.len(), 1);
        assert_eq!(withdrawn[0].key, TileKey::new(3, 2, 0));

        let mut responses = collect(&mut loader, 3).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        responses.extend(loader.poll());
        let mut cols: Vec<u32> = responses.iter().map(|r| r.col).collect();
        cols.sort();
        assert_eq!(cols, vec![0, 1, 3]);
        assert!(responses.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_terminate_closes_channel() {
        let mut loader = WorkerLoader::spawn(Arc::new(MemoryTileSource::new()), 4).unwrap();
        assert!(loader.is_running());
        loader.terminate();
        assert!(loader.abort().is_err());
    }
}
