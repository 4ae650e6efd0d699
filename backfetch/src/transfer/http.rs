//! HTTP-backed transfer service.
//!
//! The bundled [`TransferSubsystem`] implementation: streams each source URL
//! into a spool directory with an async HTTP client, enforces the configured
//! concurrency limit with a semaphore (excess enqueues wait inside the
//! service), and reports lifecycle events over the shared event channel.
//!
//! Task handles are minted from a monotonically increasing counter and are
//! never reused for the lifetime of the service, so a handle from before a
//! catalog reset can never alias a later task.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{TaskHandle, TransferError, TransferEvent, TransferEventSender};
use crate::config::Config;
use crate::transfer::TransferSubsystem;

/// Upper bound on queued-plus-running transfers.
///
/// Guards against a runaway caller; the catalog this crate manages is small
/// and bounded, so hitting this means something is wrong upstream.
const MAX_OUTSTANDING: usize = 256;

/// HTTP transfer service.
///
/// Cheap to share behind an [`Arc`]; all mutable state is internal.
pub struct HttpTransferService {
    client: Client,
    events: TransferEventSender,
    spool_dir: PathBuf,
    limiter: Arc<Semaphore>,
    /// Live tasks and their cancellation tokens.
    tasks: Arc<DashMap<TaskHandle, CancellationToken>>,
    next_handle: AtomicU64,
    shutdown: CancellationToken,
}

impl HttpTransferService {
    /// Create a new service reporting events on `events`.
    ///
    /// Must be constructed (and its tasks enqueued) inside a tokio runtime.
    pub fn new(config: &Config, events: TransferEventSender) -> Self {
        let client = Client::builder()
            .timeout(config.transfer_timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            events,
            spool_dir: config.spool_dir.clone(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_transfers.max(1))),
            tasks: Arc::new(DashMap::new()),
            next_handle: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop accepting new tasks and cancel the outstanding ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.cancel_all();
    }

    /// Run one transfer to completion, reporting events along the way.
    async fn run_transfer(
        client: Client,
        source_url: String,
        handle: TaskHandle,
        spool_dir: PathBuf,
        events: TransferEventSender,
        limiter: Arc<Semaphore>,
        tasks: Arc<DashMap<TaskHandle, CancellationToken>>,
        token: CancellationToken,
    ) {
        // Hold a permit for the whole transfer; this is the concurrency
        // limit the rest of the crate relies on.
        let permit = limiter.acquire_owned().await;

        let result = if permit.is_err() || token.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Self::stream_to_spool(&client, &source_url, handle, &spool_dir, &events, &token).await
        };

        match result {
            Ok(temp_location) => {
                let _ = events
                    .send(TransferEvent::Finished {
                        handle,
                        temp_location,
                    })
                    .await;
                let _ = events
                    .send(TransferEvent::Completed {
                        handle,
                        error: None,
                    })
                    .await;
            }
            Err(error) => {
                debug!(%handle, %error, "transfer did not finish");
                let _ = events
                    .send(TransferEvent::Completed {
                        handle,
                        error: Some(error),
                    })
                    .await;
            }
        }

        tasks.remove(&handle);
        if tasks.is_empty() {
            let _ = events.send(TransferEvent::BatchDrained).await;
        }
    }

    /// Stream `source_url` into a spool file, emitting progress events.
    async fn stream_to_spool(
        client: &Client,
        source_url: &str,
        handle: TaskHandle,
        spool_dir: &Path,
        events: &TransferEventSender,
        token: &CancellationToken,
    ) -> Result<PathBuf, TransferError> {
        tokio::fs::create_dir_all(spool_dir)
            .await
            .map_err(|e| TransferError::Failed {
                reason: format!("failed to create spool directory: {}", e),
            })?;

        let response = client
            .get(source_url)
            .send()
            .await
            .map_err(|e| TransferError::Failed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Failed {
                reason: format!("GET request failed with status {}", status),
            });
        }

        let total_expected = response.content_length();
        let temp_path = spool_dir.join(format!("transfer-{}.part", handle.raw()));
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| TransferError::Failed {
                reason: format!("failed to create spool file: {}", e),
            })?;

        let mut stream = response.bytes_stream();
        let mut total_written: u64 = 0;

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => {
                    drop(file);
                    tokio::fs::remove_file(&temp_path).await.ok();
                    return Err(TransferError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    if let Err(e) = file.write_all(&bytes).await {
                        tokio::fs::remove_file(&temp_path).await.ok();
                        return Err(TransferError::Failed {
                            reason: format!("failed to write spool file: {}", e),
                        });
                    }
                    total_written += bytes.len() as u64;
                    let _ = events
                        .send(TransferEvent::Progress {
                            handle,
                            bytes_written: bytes.len() as u64,
                            total_written,
                            total_expected,
                        })
                        .await;
                }
                Some(Err(e)) => {
                    tokio::fs::remove_file(&temp_path).await.ok();
                    return Err(TransferError::Failed {
                        reason: format!("read error: {}", e),
                    });
                }
                None => break,
            }
        }

        file.flush().await.map_err(|e| TransferError::Failed {
            reason: format!("failed to flush spool file: {}", e),
        })?;

        Ok(temp_path)
    }
}

impl TransferSubsystem for HttpTransferService {
    fn enqueue(&self, source_url: &str) -> Result<TaskHandle, TransferError> {
        if self.shutdown.is_cancelled() {
            return Err(TransferError::TaskCreationFailed {
                reason: "transfer service is shut down".to_string(),
            });
        }
        if self.tasks.len() >= MAX_OUTSTANDING {
            return Err(TransferError::TaskCreationFailed {
                reason: format!("too many outstanding transfers ({})", self.tasks.len()),
            });
        }

        let handle = TaskHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let token = self.shutdown.child_token();
        self.tasks.insert(handle, token.clone());

        debug!(%handle, url = source_url, "enqueueing transfer");

        tokio::spawn(Self::run_transfer(
            self.client.clone(),
            source_url.to_string(),
            handle,
            self.spool_dir.clone(),
            self.events.clone(),
            Arc::clone(&self.limiter),
            Arc::clone(&self.tasks),
            token,
        ));

        Ok(handle)
    }

    fn cancel_all(&self) {
        let outstanding = self.tasks.len();
        if outstanding > 0 {
            warn!(outstanding, "cancelling all outstanding transfers");
        }
        for entry in self.tasks.iter() {
            entry.value().cancel();
        }
    }

    fn outstanding(&self) -> Vec<TaskHandle> {
        self.tasks.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_service() -> (Arc<HttpTransferService>, mpsc::Receiver<TransferEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let config = Config::default().with_spool_dir(std::env::temp_dir().join("backfetch-test"));
        (Arc::new(HttpTransferService::new(&config, tx)), rx)
    }

    #[tokio::test]
    async fn test_handles_are_monotonic_and_unique() {
        let (service, _rx) = test_service();

        let a = service.enqueue("http://127.0.0.1:9/a").unwrap();
        let b = service.enqueue("http://127.0.0.1:9/b").unwrap();

        assert!(b.raw() > a.raw());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_task_creation_failure() {
        let (service, _rx) = test_service();
        service.shutdown();

        let result = service.enqueue("http://127.0.0.1:9/a");
        assert!(matches!(
            result,
            Err(TransferError::TaskCreationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_source_reports_completed_with_error() {
        let (service, mut rx) = test_service();

        // Port 9 (discard) is not listening; the connection must fail.
        let handle = service.enqueue("http://127.0.0.1:9/missing").unwrap();

        loop {
            match rx.recv().await.expect("event stream closed") {
                TransferEvent::Completed {
                    handle: h,
                    error: Some(_),
                } => {
                    assert_eq!(h, handle);
                    break;
                }
                TransferEvent::BatchDrained => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_batch_drained_after_last_task() {
        let (service, mut rx) = test_service();
        service.enqueue("http://127.0.0.1:9/a").unwrap();

        let mut saw_completed = false;
        let mut saw_drained = false;
        while let Some(event) = rx.recv().await {
            match event {
                TransferEvent::Completed { .. } => saw_completed = true,
                TransferEvent::BatchDrained => {
                    saw_drained = true;
                    break;
                }
                _ => {}
            }
        }

        assert!(saw_completed);
        assert!(saw_drained);
        assert!(service.outstanding().is_empty());
    }
}
