// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{PayloadRef, Task, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 生成请求DTO
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationRequestDto {
    /// 资源类型
    pub task_type: TaskType,

    /// 模型别名，缺省时使用资源类型的默认模型
    #[serde(default)]
    pub model: Option<String>,

    /// 生成参数
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// 任务状态响应DTO
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponseDto {
    pub id: Uuid,
    pub task_type: TaskType,
    pub model: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 外置结果的地址
    pub result_url: Option<String>,
    /// 结果大小（字节）
    pub result_size: Option<u64>,
    pub error: Option<String>,
}

impl From<&Task> for TaskResponseDto {
    fn from(task: &Task) -> Self {
        let result_url = match &task.payload {
            Some(PayloadRef::External { url, .. }) => Some(url.clone()),
            _ => None,
        };

        Self {
            id: task.id,
            task_type: task.task_type,
            model: task.model.alias.to_string(),
            status: task.status,
            attempts: task.attempts,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            result_url,
            result_size: task.payload.as_ref().map(|p| p.size()),
            error: task.error.clone(),
        }
    }
}
