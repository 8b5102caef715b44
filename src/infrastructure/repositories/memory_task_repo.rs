// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::task::Task;
use crate::domain::repositories::task_repository::{
    RepositoryError, TaskQueryParams, TaskRepository,
};

/// 内存任务仓库实现
///
/// 所有写操作在同一把写锁下完成，工作器提交终态后清理器的下一次扫描一定能看到。
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(RepositoryError::AlreadyExists(task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> Result<Task, RepositoryError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(task.clone())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn query_tasks(
        &self,
        params: TaskQueryParams,
    ) -> Result<(Vec<Task>, u64), RepositoryError> {
        let tasks = self.tasks.read().await;
        let mut matched: Vec<&Task> = tasks.values().filter(|t| params.matches(t)).collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as u64;
        let limit = if params.limit == 0 {
            usize::MAX
        } else {
            params.limit as usize
        };
        let page = matched
            .into_iter()
            .skip(params.offset as usize)
            .take(limit)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| match (task.is_terminal(), task.completed_at) {
            (true, Some(completed_at)) => completed_at >= cutoff,
            _ => true,
        });
        let removed = (before - tasks.len()) as u64;
        if removed > 0 {
            debug!("Removed {} terminal task records older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.tasks.read().await.len() as u64)
    }
}
