// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus, TaskType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 记录已存在
    #[error("Record already exists: {0}")]
    AlreadyExists(Uuid),
    /// 存储后端错误
    #[error("Backend error: {0}")]
    Backend(String),
}

/// 任务查询参数
#[derive(Debug, Default, Clone)]
pub struct TaskQueryParams {
    pub task_ids: Option<Vec<Uuid>>,
    pub task_types: Option<Vec<TaskType>>,
    pub statuses: Option<Vec<TaskStatus>>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl TaskQueryParams {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(ids) = &self.task_ids {
            if !ids.contains(&task.id) {
                return false;
            }
        }
        if let Some(types) = &self.task_types {
            if !types.contains(&task.task_type) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if task.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if task.created_at > before {
                return false;
            }
        }
        true
    }
}

/// 任务仓库特质
///
/// 定义任务数据访问接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;
    /// 更新任务，记录不存在时返回 `NotFound`
    async fn update(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 高级任务查询，按创建时间升序返回当前页和匹配总数
    async fn query_tasks(
        &self,
        params: TaskQueryParams,
    ) -> Result<(Vec<Task>, u64), RepositoryError>;
    /// 删除在 `cutoff` 之前完成的终态任务，返回删除数量
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
    /// 任务总数
    async fn count(&self) -> Result<u64, RepositoryError>;
}
