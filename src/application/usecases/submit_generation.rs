// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::dto::generation_request::GenerationRequestDto;
use crate::application::dto::task_query_request::TaskQueryRequestDto;
use crate::domain::models::model::{resolve_model, ModelError};
use crate::domain::models::task::Task;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::infrastructure::services::rate_limiter::{RateLimitError, RateLimiter};
use crate::queue::task_queue::{QueueError, TaskQueue};

/// 准入错误类型
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Task not found: {0}")]
    NotFound(Uuid),
}

/// 提交生成任务用例
///
/// 准入顺序：限流 → 模型解析 → 创建任务 → 入队。
/// 任何一步失败都不会留下任务记录。
pub struct SubmitGenerationUseCase {
    rate_limiter: Arc<RateLimiter>,
    queue: Arc<dyn TaskQueue>,
    repository: Arc<dyn TaskRepository>,
    max_retries: u32,
}

impl SubmitGenerationUseCase {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        queue: Arc<dyn TaskQueue>,
        repository: Arc<dyn TaskRepository>,
        max_retries: u32,
    ) -> Self {
        Self {
            rate_limiter,
            queue,
            repository,
            max_retries,
        }
    }

    /// 提交一个生成请求
    pub async fn submit(&self, request: GenerationRequestDto) -> Result<Task, AdmissionError> {
        self.rate_limiter.allow()?;

        let model = resolve_model(request.task_type, request.model.as_deref()).map_err(|e| {
            counter!("generation_tasks_rejected_total", "reason" => "invalid_model").increment(1);
            warn!("Rejected {} request: {}", request.task_type, e);
            e
        })?;

        let task = Task::new(
            request.task_type,
            model,
            request.parameters,
            self.max_retries,
        );
        let task = self.queue.enqueue(task).await?;

        info!(
            "Admitted {} task {} using {}",
            task.task_type, task.id, task.model.model_id
        );
        Ok(task)
    }

    /// 查询单个任务
    pub async fn get_task(&self, task_id: Uuid) -> Result<Task, AdmissionError> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(AdmissionError::NotFound(task_id))
    }

    /// 取消排队中的任务
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<Task, AdmissionError> {
        Ok(self.queue.cancel(task_id).await?)
    }

    /// 按条件列出任务，返回当前页和匹配总数
    pub async fn list_tasks(
        &self,
        query: TaskQueryRequestDto,
    ) -> Result<(Vec<Task>, u64), AdmissionError> {
        Ok(self.repository.query_tasks(query.into()).await?)
    }
}
