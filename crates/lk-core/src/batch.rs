//! Bounded fan-out over a list of work items with per-item error isolation.
//!
//! Items are processed in fixed-size sub-batches. All items of a sub-batch
//! run concurrently, gated by a semaphore of `concurrency_limit` permits; the
//! next sub-batch starts only after every item of the current one settled.
//! A failing item is recorded and never aborts its siblings. Results keep
//! input order regardless of completion order.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Default number of items per sub-batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default number of items allowed in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Outcome of one input item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult<I, T> {
    /// Position of the item in the input list.
    pub index: usize,
    pub item: I,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<I, T> BatchItemResult<I, T> {
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Ephemeral report returned for one batch invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<I, T> {
    pub batch_id: Uuid,
    pub total_requested: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<BatchItemResult<I, T>>,
    pub processing_time_ms: u64,
}

/// Runs an async operation over many items with bounded concurrency.
#[derive(Debug, Clone, Copy)]
pub struct BatchProcessor {
    batch_size: usize,
    concurrency_limit: usize,
}

impl BatchProcessor {
    /// Zero values fall back to the defaults.
    pub fn new(batch_size: usize, concurrency_limit: usize) -> Self {
        Self {
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
            concurrency_limit: if concurrency_limit == 0 {
                DEFAULT_CONCURRENCY_LIMIT
            } else {
                concurrency_limit
            },
        }
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub const fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Process every item and return one result per item, in input order.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, op: F) -> BatchReport<I, T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let batch_id = Uuid::new_v4();
        let total = items.len();
        let span = info_span!("batch", %batch_id, total);
        self.run_inner(batch_id, items, op).instrument(span).await
    }

    async fn run_inner<I, T, E, F, Fut>(
        &self,
        batch_id: Uuid,
        items: Vec<I>,
        op: F,
    ) -> BatchReport<I, T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let started = Instant::now();
        let total_requested = items.len();
        let semaphore = Semaphore::new(self.concurrency_limit);
        let mut results = Vec::with_capacity(total_requested);

        let mut pending = items.into_iter().enumerate().peekable();
        let mut sub_batch = 0usize;
        while pending.peek().is_some() {
            let chunk: Vec<(usize, I)> = pending.by_ref().take(self.batch_size).collect();
            sub_batch += 1;
            debug!(sub_batch, size = chunk.len(), "processing sub-batch");

            let semaphore = &semaphore;
            let op = &op;
            let settled = join_all(chunk.into_iter().map(|(index, item)| async move {
                let outcome = match semaphore.acquire().await {
                    // Debug keeps the cause chain that Display drops.
                    Ok(_permit) => op(item.clone()).await.map_err(|e| {
                        warn!(index, error = %e, detail = ?e, "batch item failed");
                        e.to_string()
                    }),
                    Err(e) => Err(e.to_string()),
                };
                (index, item, outcome)
            }))
            .await;

            for (index, item, outcome) in settled {
                results.push(match outcome {
                    Ok(data) => BatchItemResult {
                        index,
                        item,
                        status: ItemStatus::Success,
                        data: Some(data),
                        error: None,
                    },
                    Err(error) => BatchItemResult {
                        index,
                        item,
                        status: ItemStatus::Failed,
                        data: None,
                        error: Some(error),
                    },
                });
            }
        }

        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = results.len() - success_count;
        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            success_count,
            failure_count,
            processing_time_ms,
            "batch finished"
        );

        BatchReport {
            batch_id,
            total_requested,
            success_count,
            failure_count,
            results,
            processing_time_ms,
        }
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY_LIMIT)
    }
}
