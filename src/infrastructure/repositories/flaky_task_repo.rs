// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskQueryParams, TaskRepository,
};
use crate::infrastructure::repositories::memory_task_repo::InMemoryTaskRepository;

/// 写入指定状态时会失败的任务仓库
///
/// 前 `failures` 次把任务写成 `status` 的 `update` 返回后端错误，`u32::MAX` 表示一直失败
pub(crate) struct FlakyTaskRepository {
    inner: InMemoryTaskRepository,
    status: TaskStatus,
    failures: AtomicU32,
}

impl FlakyTaskRepository {
    pub(crate) fn new(status: TaskStatus, failures: u32) -> Self {
        Self {
            inner: InMemoryTaskRepository::new(),
            status,
            failures: AtomicU32::new(failures),
        }
    }

    fn should_fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl TaskRepository for FlakyTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        self.inner.create(task).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, task: &Task) -> Result<Task, RepositoryError> {
        if task.status == self.status && self.should_fail() {
            return Err(RepositoryError::Backend("write rejected".to_string()));
        }
        self.inner.update(task).await
    }

    async fn query_tasks(
        &self,
        params: TaskQueryParams,
    ) -> Result<(Vec<Task>, u64), RepositoryError> {
        self.inner.query_tasks(params).await
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.inner.delete_terminal_before(cutoff).await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.inner.count().await
    }
}
