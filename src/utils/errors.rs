// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::task::DomainError;
use crate::domain::repositories::storage_repository::StorageError;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::domain::services::inference_service::InferenceError;
use crate::queue::task_queue::QueueError;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("推理失败: {0}")]
    Inference(#[from] InferenceError),

    #[error("存储失败: {0}")]
    Storage(#[from] StorageError),

    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),

    #[error("领域错误: {0}")]
    Domain(#[from] DomainError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl WorkerError {
    /// 单次尝试内的失败，可以由工作池重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Inference(_) | WorkerError::Storage(_))
    }
}
