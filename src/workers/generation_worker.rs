// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::generation::output_object_key;
use crate::domain::models::task::{PayloadRef, Task};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::domain::services::inference_service::InferenceBackend;
use crate::infrastructure::cache::result_cache::ResultCache;
use crate::queue::task_queue::TaskQueue;
use crate::utils::errors::WorkerError;

/// 终态写入的最大尝试次数
const TERMINAL_WRITE_ATTEMPTS: u32 = 3;
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// 单次执行的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 任务已成功
    Succeeded,
    /// 本次尝试失败，任务将在重试延迟后回到队尾
    Retrying,
    /// 重试耗尽或无法记录结果，任务已失败
    Failed,
}

/// 工作器计数
#[derive(Debug, Default)]
pub struct WorkerStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cache_hits: AtomicU64,
}

/// 工作器计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    pub cache_hits: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// 生成任务执行器
///
/// 调度器为每个派发的任务调用一次 `execute`。执行器先查结果缓存，
/// 未命中时调用推理后端，按大小内联或外置结果后将任务置为成功。
/// 失败的尝试在仍有重试次数时退回队列，延迟结束后放回队尾，
/// 等待期间不占用工作槽位。
pub struct GenerationWorker {
    queue: Arc<dyn TaskQueue>,
    repository: Arc<dyn TaskRepository>,
    backend: Arc<dyn InferenceBackend>,
    cache: Arc<ResultCache>,
    retry_delay: Duration,
    stats: WorkerStats,
}

impl GenerationWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        repository: Arc<dyn TaskRepository>,
        backend: Arc<dyn InferenceBackend>,
        cache: Arc<ResultCache>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            queue,
            repository,
            backend,
            cache,
            retry_delay,
            stats: WorkerStats::default(),
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// 执行一个已处于 Running 状态的任务
    #[instrument(
        skip(self, task),
        fields(task_id = %task.id, task_type = %task.task_type, attempt = task.attempts)
    )]
    pub async fn execute(&self, task: Task) -> TaskOutcome {
        match self.produce(&task).await {
            Ok(payload) => self.complete(task, payload).await,
            Err(e) => self.handle_failure(task, e).await,
        }
    }

    async fn produce(&self, task: &Task) -> Result<PayloadRef, WorkerError> {
        let key = task.fingerprint();

        if let Some(payload) = self.cache.get(&key) {
            debug!("Result cache hit, skipping inference");
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(payload);
        }

        let output = self
            .backend
            .run_inference(&task.model, &task.parameters)
            .await?;

        let object_key = output_object_key(task.task_type, task.id, Utc::now());
        let payload = self.cache.externalize(&object_key, output).await?;
        self.cache.put(&key, payload.clone(), None);

        Ok(payload)
    }

    async fn complete(&self, task: Task, payload: PayloadRef) -> TaskOutcome {
        let running = task.clone();
        let size = payload.size();
        let external = payload.is_external();

        let done = match task.succeed(payload) {
            Ok(done) => done,
            Err(e) => return self.fail(running, e.to_string()).await,
        };

        match self.record_terminal(&done).await {
            Ok(_) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                counter!("generation_tasks_succeeded_total").increment(1);
                info!(
                    "Task {} succeeded ({} bytes, external: {})",
                    done.id, size, external
                );
                TaskOutcome::Succeeded
            }
            Err(e) => {
                error!("Failed to record success for task {}: {}", done.id, e);
                self.fail(running, format!("failed to record result: {}", e))
                    .await
            }
        }
    }

    /// 写入终态，失败时按退避重试
    async fn record_terminal(&self, task: &Task) -> Result<Task, RepositoryError> {
        let mut attempt = 1;
        loop {
            match self.repository.update(task).await {
                Ok(updated) => return Ok(updated),
                Err(e) if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    warn!(
                        "Writing {} state of task {} failed (attempt {}): {}",
                        task.status, task.id, attempt, e
                    );
                    tokio::time::sleep(TERMINAL_WRITE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_failure(&self, task: Task, err: WorkerError) -> TaskOutcome {
        warn!(
            "Attempt {}/{} of task {} failed: {}",
            task.attempts,
            task.max_retries + 1,
            task.id,
            err
        );

        if err.is_retryable() && task.can_retry() {
            match self.queue.release_for_retry(task.clone()).await {
                Ok(queued) => {
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                    self.schedule_requeue(queued.id);
                    return TaskOutcome::Retrying;
                }
                Err(e) => {
                    error!("Failed to release task {} for retry: {}", task.id, e);
                }
            }
        }

        self.fail(task, err.to_string()).await
    }

    fn schedule_requeue(&self, task_id: uuid::Uuid) {
        let queue = self.queue.clone();
        let delay = self.retry_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match queue.requeue(task_id).await {
                Ok(true) => debug!("Task {} re-entered the queue", task_id),
                Ok(false) => debug!("Task {} was cancelled during retry delay", task_id),
                Err(e) => error!("Failed to requeue task {}: {}", task_id, e),
            }
        });
    }

    async fn fail(&self, task: Task, reason: String) -> TaskOutcome {
        let task_id = task.id;
        let attempts = task.attempts;

        let recorded = match task.fail(reason) {
            Ok(failed) => self.record_terminal(&failed).await.map_err(WorkerError::from),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = recorded {
            error!("Failed to record failure for task {}: {}", task_id, e);
        } else {
            error!("Task {} failed after {} attempts", task_id, attempts);
        }

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        counter!("generation_tasks_failed_total").increment(1);
        TaskOutcome::Failed
    }
}
