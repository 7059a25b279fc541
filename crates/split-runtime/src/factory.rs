//! The SDK's bootstrap/lifecycle object: build the storage backend the
//! config selects, spawn the sync tasks in a fixed order, and join them in
//! reverse on shutdown.

use std::sync::Arc;
use std::time::Duration;

use orion_error::op_context;
use orion_error::prelude::*;
use split_config::{ClientConfig, OperationMode};
use split_core::storage::memory::{
    InMemoryImpressionStorage, InMemoryMetricsStorage, InMemorySegmentStorage,
    InMemorySplitStorage,
};
use split_core::storage::{ImpressionStorage, MetricsStorage, SegmentStorage, SplitStorage};

use crate::client::SplitClient;
use crate::error::{SyncReason, SyncResult};
use crate::manager::SplitManager;
use crate::periodic::PeriodicTask;
use crate::remote::{RedisClient, RedisImpressionStorage, RedisMetricsStorage, RedisSegmentStorage, RedisSplitStorage};
use crate::sync;
use crate::transport::{ImpressionsRecorder, MetricsRecorder, SegmentFetcher, SplitFetcher};

/// The SDK's single entry point: owns the storage backend and the sync
/// tasks that feed it, and hands out [`SplitClient`]/[`SplitManager`]
/// handles that share that storage.
pub struct SplitFactory {
    split_storage: Arc<dyn SplitStorage>,
    segment_storage: Arc<dyn SegmentStorage>,
    impression_storage: Arc<dyn ImpressionStorage>,
    metrics_storage: Arc<dyn MetricsStorage>,
    labels_enabled: bool,
    /// Sync tasks in start order; `shutdown` stops them in reverse.
    tasks: Vec<Arc<PeriodicTask>>,
}

impl SplitFactory {
    /// Build storage for `config.operation_mode`, spawn the six sync tasks,
    /// and return a ready-to-use factory. Transport (the fetchers and
    /// recorders the sync tasks call) is supplied by the caller since this
    /// crate has no concrete HTTP client of its own.
    #[tracing::instrument(skip_all)]
    pub fn build(
        config: &ClientConfig,
        split_fetcher: Arc<dyn SplitFetcher>,
        segment_fetcher: Arc<dyn SegmentFetcher>,
        impressions_recorder: Arc<dyn ImpressionsRecorder>,
        metrics_recorder: Arc<dyn MetricsRecorder>,
    ) -> SyncResult<Self> {
        let mut op = op_context!("split-factory-bootstrap").with_auto_log();

        let (split_storage, segment_storage, impression_storage, metrics_storage) =
            build_storage(config).err_conv()?;

        let mut tasks: Vec<Arc<PeriodicTask>> = Vec::new();

        let split_task = Arc::new(PeriodicTask::new(
            "split-sync",
            Duration::from_secs(config.split_sync_period_sec),
        ));
        {
            let fetcher = split_fetcher.clone();
            let storage = split_storage.clone();
            split_task.start(move || {
                let fetcher = fetcher.clone();
                let storage = storage.clone();
                async move { sync::split_sync(fetcher, storage).await }
            });
        }
        tasks.push(split_task);

        let segment_task = Arc::new(PeriodicTask::new(
            "segment-sync",
            Duration::from_secs(config.segment_sync_period_sec),
        ));
        {
            let fetcher = segment_fetcher.clone();
            let split_storage = split_storage.clone();
            let segment_storage = segment_storage.clone();
            segment_task.start(move || {
                let fetcher = fetcher.clone();
                let split_storage = split_storage.clone();
                let segment_storage = segment_storage.clone();
                async move { sync::segment_sync(fetcher, split_storage, segment_storage).await }
            });
        }
        tasks.push(segment_task);

        let impression_task = Arc::new(PeriodicTask::new(
            "impression-flush",
            Duration::from_secs(config.impressions_flush_period_sec),
        ));
        {
            let recorder = impressions_recorder.clone();
            let storage = impression_storage.clone();
            impression_task.start(move || {
                let recorder = recorder.clone();
                let storage = storage.clone();
                async move { sync::impression_flush(recorder, storage).await }
            });
        }
        tasks.push(impression_task);

        let counters_task = Arc::new(PeriodicTask::new(
            "counters-flush",
            Duration::from_secs(config.counters_flush_period_sec),
        ));
        {
            let recorder = metrics_recorder.clone();
            let storage = metrics_storage.clone();
            counters_task.start(move || {
                let recorder = recorder.clone();
                let storage = storage.clone();
                async move { sync::counters_flush(recorder, storage).await }
            });
        }
        tasks.push(counters_task);

        let gauges_task = Arc::new(PeriodicTask::new(
            "gauges-flush",
            Duration::from_secs(config.gauges_flush_period_sec),
        ));
        {
            let recorder = metrics_recorder.clone();
            let storage = metrics_storage.clone();
            gauges_task.start(move || {
                let recorder = recorder.clone();
                let storage = storage.clone();
                async move { sync::gauges_flush(recorder, storage).await }
            });
        }
        tasks.push(gauges_task);

        let latencies_task = Arc::new(PeriodicTask::new(
            "latencies-flush",
            Duration::from_secs(config.latencies_flush_period_sec),
        ));
        {
            let recorder = metrics_recorder.clone();
            let storage = metrics_storage.clone();
            latencies_task.start(move || {
                let recorder = recorder.clone();
                let storage = storage.clone();
                async move { sync::latencies_flush(recorder, storage).await }
            });
        }
        tasks.push(latencies_task);

        op.mark_suc();
        Ok(Self {
            split_storage,
            segment_storage,
            impression_storage,
            metrics_storage,
            labels_enabled: config.labels_enabled,
            tasks,
        })
    }

    /// A client sharing this factory's storage. Cheap to call repeatedly.
    pub fn client(&self) -> SplitClient {
        SplitClient::new(
            self.split_storage.clone(),
            self.segment_storage.clone(),
            self.impression_storage.clone(),
            self.metrics_storage.clone(),
            self.labels_enabled,
        )
    }

    /// A manager sharing this factory's storage.
    pub fn manager(&self) -> SplitManager {
        SplitManager::new(self.split_storage.clone())
    }

    /// Stop every sync task, most-recently-started first.
    pub async fn shutdown(&self) {
        for task in self.tasks.iter().rev() {
            task.stop().await;
        }
    }
}

type StorageBundle = (
    Arc<dyn SplitStorage>,
    Arc<dyn SegmentStorage>,
    Arc<dyn ImpressionStorage>,
    Arc<dyn MetricsStorage>,
);

fn build_storage(config: &ClientConfig) -> anyhow::Result<StorageBundle> {
    match config.operation_mode {
        OperationMode::InMemory => Ok((
            Arc::new(InMemorySplitStorage::new()),
            Arc::new(InMemorySegmentStorage::new()),
            Arc::new(InMemoryImpressionStorage::new()),
            Arc::new(InMemoryMetricsStorage::new()),
        )),
        OperationMode::Remote => {
            let redis = Arc::new(RedisClient::connect(
                &config.remote,
                &config.instance_id,
                &config.sdk_version_tag,
            )?);
            Ok((
                Arc::new(RedisSplitStorage::new(redis.clone())),
                Arc::new(RedisSegmentStorage::new(redis.clone())),
                Arc::new(RedisImpressionStorage::new(redis.clone())),
                Arc::new(RedisMetricsStorage::new(redis)),
            ))
        }
    }
}
