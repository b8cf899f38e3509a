//! Task spawning for tile loading
//!
//! Tasks go to the ambient tokio runtime when called from inside one, and to
//! a lazily built background runtime otherwise, so a host with its own
//! render loop can drive the viewer without running async code itself.

use crate::prelude::{Future, Pin};
use crate::{Result, ZoomError};
use once_cell::sync::Lazy;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

struct TokioHandle(JoinHandle<()>);

impl AsyncHandle for TokioHandle {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    fn cancel(&self) {
        self.0.abort();
    }
}

static BACKGROUND: Lazy<Option<Runtime>> = Lazy::new(|| {
    match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("deepzoom-tiles")
        .enable_all()
        .build()
    {
        Ok(runtime) => Some(runtime),
        Err(err) => {
            log::error!("failed to start background runtime: {}", err);
            None
        }
    }
});

fn handle() -> Result<Handle> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    BACKGROUND
        .as_ref()
        .map(|runtime| runtime.handle().clone())
        .ok_or_else(|| ZoomError::Worker("no async runtime available".into()))
}

/// Spawn a future on the current or background runtime.
pub fn spawn<F>(future: F) -> Result<Box<dyn AsyncHandle>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let boxed: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(future);
    let join = handle()?.spawn(boxed);
    Ok(Box::new(TokioHandle(join)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tokio_spawner() {
        let handle = spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        })
        .unwrap();

        // Should not be finished immediately
        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn test_spawn_outside_runtime() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _handle = spawn(async move {
            let _ = tx.send(7);
        })
        .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(7));
    }

    #[tokio::test]
    async fn test_cancel() {
        let handle = spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .unwrap();
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_finished());
    }
}
