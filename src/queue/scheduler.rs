// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::queue::task_queue::{QueueError, TaskQueue};
use crate::utils::errors::WorkerError;
use crate::workers::generation_worker::GenerationWorker;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// 任务调度器
///
/// 单一控制循环，按固定间隔或在收到通知时检查空闲槽位，
/// 从队首取出任务交给执行器。并发上限由 `max_workers` 个许可保证。
pub struct TaskScheduler {
    /// 任务队列
    queue: Arc<dyn TaskQueue>,
    /// 任务执行器
    worker: Arc<GenerationWorker>,
    /// 工作槽位
    slots: Arc<Semaphore>,
    max_workers: usize,
    interval: Duration,
    /// 入队或槽位释放时唤醒调度循环
    notify: Arc<Notify>,
}

impl TaskScheduler {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `queue` - 任务队列
    /// * `worker` - 任务执行器
    /// * `max_workers` - 最大并发数
    /// * `interval` - 轮询间隔
    /// * `notify` - 与队列共享的唤醒通知器
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        worker: Arc<GenerationWorker>,
        max_workers: usize,
        interval: Duration,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            queue,
            worker,
            slots: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            interval,
            notify,
        }
    }

    /// 派发所有能立即派发的任务
    ///
    /// # 返回值
    ///
    /// * `Ok(usize)` - 本次派发的任务数
    /// * `Err(QueueError)` - 出队失败
    pub async fn dispatch_ready(&self) -> Result<usize, QueueError> {
        let mut dispatched = 0;

        loop {
            let Ok(permit) = self.slots.clone().try_acquire_owned() else {
                break;
            };
            let Some(task) = self.queue.dequeue().await? else {
                break;
            };

            debug!("Dispatching task {} (attempt {})", task.id, task.attempts);
            let worker = self.worker.clone();
            let notify = self.notify.clone();
            tokio::spawn(async move {
                worker.execute(task).await;
                drop(permit);
                notify.notify_one();
            });
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// 正在执行的任务数
    pub fn running(&self) -> usize {
        self.max_workers
            .saturating_sub(self.slots.available_permits())
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 等待所有执行中的任务结束
    pub async fn drain(&self) {
        let Ok(total) = u32::try_from(self.max_workers) else {
            return;
        };
        if let Ok(permits) = self.slots.acquire_many(total).await {
            drop(permits);
        }
    }
}

#[async_trait]
impl Worker for TaskScheduler {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        info!(
            "Task scheduler started with {} worker slots",
            self.max_workers
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.dispatch_ready().await {
                error!("Failed to dispatch tasks: {}", e);
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.notify.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Task scheduler stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "task_scheduler"
    }
}
