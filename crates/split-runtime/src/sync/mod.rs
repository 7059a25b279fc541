//! The sync task bodies run under [`crate::periodic::PeriodicTask`]: split
//! sync, segment sync, and the impression/metrics flushes. Each is a plain
//! async function taking `Arc`-shared storage and transport handles so
//! `SplitFactory` can close over them directly when spawning a
//! [`crate::periodic::PeriodicTask`] per task.

use std::sync::Arc;

use orion_error::StructError;
use split_core::storage::{ImpressionStorage, MetricsStorage, SegmentStorage, SplitStorage};

use crate::error::{SyncReason, SyncResult};
use crate::transport::{ImpressionsRecorder, MetricsRecorder, SegmentFetcher, SplitFetcher};

/// Fetch every split change since the storage's current watermark and
/// apply it if the sync actually advanced.
///
/// `SplitStorage` is a synchronous trait (the evaluator calls it inline,
/// never `.await`s it), so a remote backend's I/O runs on the blocking pool
/// rather than stalling this task's worker thread.
pub async fn split_sync(
    fetcher: Arc<dyn SplitFetcher>,
    storage: Arc<dyn SplitStorage>,
) -> SyncResult<()> {
    let since = {
        let storage = storage.clone();
        tokio::task::spawn_blocking(move || storage.till())
            .await
            .expect("split storage till() panicked")
    };
    let changes = fetcher
        .fetch_since(since)
        .await
        .map_err(|e| StructError::from(SyncReason::Transport).with_detail(format!("{e}")))?;

    if changes.till > since {
        let till = changes.till;
        tokio::task::spawn_blocking(move || storage.put_many(changes.splits, till))
            .await
            .expect("split storage put_many() panicked");
        sync_info!(sync, till = till, "split sync applied");
    }
    Ok(())
}

/// Fetch every segment referenced by the current split set and apply its
/// membership delta independently. One segment's fetch failure never blocks
/// the others: it is logged and the tick still reports
/// success, matching the failure-isolation behaviour of the split-sync and
/// flush tasks around it.
pub async fn segment_sync(
    fetcher: Arc<dyn SegmentFetcher>,
    split_storage: Arc<dyn SplitStorage>,
    segment_storage: Arc<dyn SegmentStorage>,
) -> SyncResult<()> {
    let names = {
        let split_storage = split_storage.clone();
        tokio::task::spawn_blocking(move || split_storage.segment_names())
            .await
            .expect("split storage segment_names() panicked")
    };

    for name in names {
        let since = {
            let segment_storage = segment_storage.clone();
            let name = name.clone();
            tokio::task::spawn_blocking(move || segment_storage.till(&name))
                .await
                .expect("segment storage till() panicked")
        };
        match fetcher.fetch(&name, since).await {
            Ok(delta) if delta.till > since => {
                let till = delta.till;
                let segment_storage = segment_storage.clone();
                let name2 = name.clone();
                tokio::task::spawn_blocking(move || {
                    segment_storage.apply_delta(&name2, delta.added, delta.removed, till)
                })
                .await
                .expect("segment storage apply_delta() panicked");
                sync_info!(sync, segment = %name, till = till, "segment sync applied");
            }
            Ok(_) => {}
            Err(e) => {
                sync_warn!(store, segment = %name, error = %e, "segment sync failed, will retry next tick");
            }
        }
    }
    Ok(())
}

/// Drain accumulated impressions and post them as one batch. Per the
/// fire-and-forget flush policy, a transport failure drops the batch
/// rather than requeueing it.
pub async fn impression_flush(
    recorder: Arc<dyn ImpressionsRecorder>,
    storage: Arc<dyn ImpressionStorage>,
) -> SyncResult<()> {
    let batch = tokio::task::spawn_blocking(move || storage.pop_all())
        .await
        .expect("impression storage pop_all() panicked");
    if batch.is_empty() {
        return Ok(());
    }
    let count = batch.len();
    if let Err(e) = recorder.record(batch).await {
        sync_warn!(sync, count = count, error = %e, "impression flush failed, batch dropped");
    }
    Ok(())
}

/// Drain counters and post them. Same drop-on-error policy as
/// [`impression_flush`].
pub async fn counters_flush(
    recorder: Arc<dyn MetricsRecorder>,
    storage: Arc<dyn MetricsStorage>,
) -> SyncResult<()> {
    let counters = tokio::task::spawn_blocking(move || storage.pop_counters())
        .await
        .expect("metrics storage pop_counters() panicked");
    if counters.is_empty() {
        return Ok(());
    }
    if let Err(e) = recorder.record_counters(counters).await {
        sync_warn!(sync, error = %e, "counters flush failed, batch dropped");
    }
    Ok(())
}

/// Drain gauges and post them. Same drop-on-error policy as
/// [`impression_flush`].
pub async fn gauges_flush(
    recorder: Arc<dyn MetricsRecorder>,
    storage: Arc<dyn MetricsStorage>,
) -> SyncResult<()> {
    let gauges = tokio::task::spawn_blocking(move || storage.pop_gauges())
        .await
        .expect("metrics storage pop_gauges() panicked");
    if gauges.is_empty() {
        return Ok(());
    }
    if let Err(e) = recorder.record_gauges(gauges).await {
        sync_warn!(sync, error = %e, "gauges flush failed, batch dropped");
    }
    Ok(())
}

/// Drain latency histograms and post them. Same drop-on-error policy as
/// [`impression_flush`].
pub async fn latencies_flush(
    recorder: Arc<dyn MetricsRecorder>,
    storage: Arc<dyn MetricsStorage>,
) -> SyncResult<()> {
    let latencies = tokio::task::spawn_blocking(move || storage.pop_latencies())
        .await
        .expect("metrics storage pop_latencies() panicked");
    if latencies.is_empty() {
        return Ok(());
    }
    if let Err(e) = recorder.record_latencies(latencies).await {
        sync_warn!(sync, error = %e, "latencies flush failed, batch dropped");
    }
    Ok(())
}
