// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::usecases::submit_generation::SubmitGenerationUseCase;
use crate::config::settings::Settings;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::services::inference_service::InferenceBackend;
use crate::infrastructure::cache::result_cache::ResultCache;
use crate::infrastructure::services::rate_limiter::{RateLimitError, RateLimiter};
use crate::queue::scheduler::TaskScheduler;
use crate::queue::task_queue::{InMemoryTaskQueue, TaskQueue};
use crate::workers::cleanup_worker::CleanupWorker;
use crate::workers::generation_worker::GenerationWorker;
use crate::workers::worker::Worker;
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 工作池统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatistics {
    pub max_workers: usize,
    pub running: usize,
    pub queue_depth: usize,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    pub cancelled: u64,
}

/// 工作管理器
///
/// 组装队列、缓存、执行器、调度器和清理器，并管理后台循环的启动与关闭
pub struct WorkerManager {
    repository: Arc<dyn TaskRepository>,
    queue: Arc<InMemoryTaskQueue>,
    cache: Arc<ResultCache>,
    worker: Arc<GenerationWorker>,
    scheduler: Arc<TaskScheduler>,
    cleanup: Arc<CleanupWorker>,
    submissions: Arc<SubmitGenerationUseCase>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    /// 按配置组装工作池和准入用例
    ///
    /// 限流配置无效时返回 `RateLimitError::Configuration`
    pub fn new(
        settings: &Settings,
        repository: Arc<dyn TaskRepository>,
        storage: Arc<dyn StorageRepository>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Result<Self, RateLimitError> {
        let rate_limiter = Arc::new(RateLimiter::from_settings(&settings.rate_limiting)?);
        let notify = Arc::new(Notify::new());
        let queue = Arc::new(
            InMemoryTaskQueue::new(repository.clone(), settings.worker.max_queue_size)
                .with_notify(notify.clone()),
        );
        let cache = Arc::new(ResultCache::from_settings(&settings.cache, storage));
        let worker = Arc::new(GenerationWorker::new(
            queue.clone(),
            repository.clone(),
            backend,
            cache.clone(),
            settings.worker.retry_delay(),
        ));
        let scheduler = Arc::new(TaskScheduler::new(
            queue.clone(),
            worker.clone(),
            settings.worker.max_workers,
            settings.worker.scheduler_interval(),
            notify,
        ));
        let cleanup = Arc::new(CleanupWorker::new(
            repository.clone(),
            cache.clone(),
            &settings.cleanup,
        ));
        let submissions = Arc::new(SubmitGenerationUseCase::new(
            rate_limiter,
            queue.clone(),
            repository.clone(),
            settings.worker.retry_attempts,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            repository,
            queue,
            cache,
            worker,
            scheduler,
            cleanup,
            submissions,
            shutdown_tx,
            handles: Vec::new(),
        })
    }

    /// 启动调度循环和清理循环
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            warn!("Worker manager already started");
            return;
        }

        self.shutdown_tx.send_replace(false);
        let loops: [Arc<dyn Worker>; 2] = [self.scheduler.clone(), self.cleanup.clone()];
        for worker in loops {
            let shutdown = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run(shutdown).await {
                    error!("{} exited with error: {}", worker.name(), e);
                }
            });
            self.handles.push(handle);
        }

        info!(
            "Worker manager started ({} worker slots)",
            self.scheduler.max_workers()
        );
    }

    /// 停止派发新任务，等待执行中的任务结束
    ///
    /// 处于重试等待中的任务保留 Queued 状态
    pub async fn shutdown(&mut self) {
        info!("Shutting down workers...");
        self.shutdown_tx.send_replace(true);

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Background loop terminated abnormally: {}", e);
            }
        }

        self.scheduler.drain().await;
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown().await;
    }

    pub async fn statistics(&self) -> PoolStatistics {
        let queue_stats = self.queue.stats();
        let worker_stats = self.worker.stats();

        PoolStatistics {
            max_workers: self.scheduler.max_workers(),
            running: self.scheduler.running(),
            queue_depth: self.queue.depth().await,
            submitted: queue_stats.submitted,
            succeeded: worker_stats.succeeded,
            failed: worker_stats.failed,
            retried: worker_stats.retried,
            cancelled: queue_stats.cancelled,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// 提交、查询和取消任务的入口
    pub fn submissions(&self) -> Arc<SubmitGenerationUseCase> {
        self.submissions.clone()
    }

    pub fn queue(&self) -> Arc<InMemoryTaskQueue> {
        self.queue.clone()
    }

    pub fn repository(&self) -> Arc<dyn TaskRepository> {
        self.repository.clone()
    }

    pub fn cache(&self) -> Arc<ResultCache> {
        self.cache.clone()
    }

    pub fn scheduler(&self) -> Arc<TaskScheduler> {
        self.scheduler.clone()
    }

    pub fn cleanup(&self) -> Arc<CleanupWorker> {
        self.cleanup.clone()
    }
}
