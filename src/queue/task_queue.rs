// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{DomainError, Task, TaskStatus};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use async_trait::async_trait;
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 队列已满
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// 任务不存在
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    /// 任务当前状态不允许取消
    #[error("Task {id} cannot be cancelled in status {status}")]
    NotCancellable { id: Uuid, status: TaskStatus },

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 状态转换错误
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// 任务队列特质
///
/// 所有把任务移入或移出 Queued 状态的操作都经过队列，
/// 由队列保证这些操作互相串行。
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队新任务，队列已满时不做任何修改并返回 `QueueFull`
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError>;

    /// 取出最早入队的任务并将其置为 Running
    async fn dequeue(&self) -> Result<Option<Task>, QueueError>;

    /// 执行失败的任务退回 Queued 状态，等待重试延迟结束后再调用 `requeue`
    async fn release_for_retry(&self, task: Task) -> Result<Task, QueueError>;

    /// 将仍处于 Queued 状态的任务放回队尾
    ///
    /// 重新入队不受容量限制；任务在等待期间被取消时返回 `false`
    async fn requeue(&self, task_id: Uuid) -> Result<bool, QueueError>;

    /// 取消排队中的任务
    async fn cancel(&self, task_id: Uuid) -> Result<Task, QueueError>;

    /// 当前排队长度
    async fn depth(&self) -> usize;
}

/// 队列累计计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub cancelled: u64,
}

/// 内存 FIFO 任务队列实现
pub struct InMemoryTaskQueue {
    /// 排队中的任务ID，队首最早
    pending: Mutex<VecDeque<Uuid>>,
    /// 任务仓库
    repository: Arc<dyn TaskRepository>,
    /// 最大排队长度
    capacity: usize,
    /// 有任务可派发时唤醒调度器
    notify: Option<Arc<Notify>>,
    submitted: AtomicU64,
    cancelled: AtomicU64,
}

impl InMemoryTaskQueue {
    /// 创建新的内存任务队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `capacity` - 最大排队长度
    pub fn new(repository: Arc<dyn TaskRepository>, capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            repository,
            capacity,
            notify: None,
            submitted: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    /// 设置入队时唤醒的通知器
    pub fn with_notify(mut self, notify: Arc<Notify>) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// 按出队顺序返回排队中的任务ID
    pub async fn pending_ids(&self) -> Vec<Uuid> {
        self.pending.lock().await.iter().copied().collect()
    }

    fn wake(&self) {
        if let Some(notify) = &self.notify {
            notify.notify_one();
        }
    }

    /// 将排队中的任务置为 Running，已不在 Queued 状态的任务返回 `None`
    async fn start_pending(&self, id: Uuid) -> Result<Option<Task>, QueueError> {
        let task = match self.repository.find_by_id(id).await? {
            Some(task) if task.status == TaskStatus::Queued => task,
            Some(task) => {
                warn!("Skipping task {} in status {}", id, task.status);
                return Ok(None);
            }
            None => {
                warn!("Skipping missing task {}", id);
                return Ok(None);
            }
        };

        let started = task.start()?;
        Ok(Some(self.repository.update(&started).await?))
    }

    fn record_depth(depth: usize) {
        gauge!("generation_queue_depth").set(depth as f64);
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    /// 入队任务
    ///
    /// # 参数
    ///
    /// * `task` - 要入队的任务，必须处于 Queued 状态
    ///
    /// # 返回值
    ///
    /// * `Ok(Task)` - 入队成功的任务
    /// * `Err(QueueError)` - 入队失败
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError> {
        let mut pending = self.pending.lock().await;

        if pending.len() >= self.capacity {
            counter!("generation_tasks_rejected_total", "reason" => "queue_full").increment(1);
            warn!("Queue full, rejecting task {}", task.id);
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        if task.status != TaskStatus::Queued {
            return Err(QueueError::Domain(DomainError::ValidationError(format!(
                "only queued tasks can be enqueued, got {}",
                task.status
            ))));
        }

        let created = self.repository.create(&task).await?;
        pending.push_back(created.id);
        Self::record_depth(pending.len());
        self.submitted.fetch_add(1, Ordering::Relaxed);
        counter!("generation_tasks_submitted_total").increment(1);
        debug!("Enqueued task {} ({} pending)", created.id, pending.len());
        drop(pending);

        self.wake();
        Ok(created)
    }

    /// 出队任务
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(Task))` - 已置为 Running 的任务
    /// * `Ok(None)` - 没有可出队的任务
    /// * `Err(QueueError)` - 出队失败
    async fn dequeue(&self) -> Result<Option<Task>, QueueError> {
        let mut pending = self.pending.lock().await;

        while let Some(id) = pending.pop_front() {
            match self.start_pending(id).await {
                Ok(Some(task)) => {
                    Self::record_depth(pending.len());
                    return Ok(Some(task));
                }
                Ok(None) => continue,
                Err(e) => {
                    // 任务仍处于 Queued，放回队首等待下次派发
                    pending.push_front(id);
                    return Err(e);
                }
            }
        }

        Ok(None)
    }

    async fn release_for_retry(&self, task: Task) -> Result<Task, QueueError> {
        let _pending = self.pending.lock().await;
        let queued = task.requeue()?;
        let updated = self.repository.update(&queued).await?;
        counter!("generation_tasks_retried_total").increment(1);
        Ok(updated)
    }

    async fn requeue(&self, task_id: Uuid) -> Result<bool, QueueError> {
        let mut pending = self.pending.lock().await;

        let still_queued = matches!(
            self.repository.find_by_id(task_id).await?,
            Some(task) if task.status == TaskStatus::Queued
        );
        if !still_queued || pending.contains(&task_id) {
            debug!("Task {} no longer waiting for retry", task_id);
            return Ok(false);
        }

        pending.push_back(task_id);
        Self::record_depth(pending.len());
        drop(pending);

        self.wake();
        Ok(true)
    }

    async fn cancel(&self, task_id: Uuid) -> Result<Task, QueueError> {
        let mut pending = self.pending.lock().await;

        let task = self
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(QueueError::NotFound(task_id))?;

        if task.status != TaskStatus::Queued {
            return Err(QueueError::NotCancellable {
                id: task_id,
                status: task.status,
            });
        }

        let cancelled = task.cancel()?;
        let updated = self.repository.update(&cancelled).await?;
        pending.retain(|id| *id != task_id);
        Self::record_depth(pending.len());

        self.cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("generation_tasks_cancelled_total").increment(1);
        info!("Cancelled task {}", task_id);
        Ok(updated)
    }

    async fn depth(&self) -> usize {
        self.pending.lock().await.len()
    }
}
