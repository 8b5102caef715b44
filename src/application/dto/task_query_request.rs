// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{TaskStatus, TaskType};
use crate::domain::repositories::task_repository::TaskQueryParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 1000;

/// 任务查询请求DTO
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct TaskQueryRequestDto {
    /// 任务ID列表（批量查询）
    pub task_ids: Option<Vec<Uuid>>,

    /// 任务类型过滤
    pub task_types: Option<Vec<TaskType>>,

    /// 任务状态过滤
    pub statuses: Option<Vec<TaskStatus>>,

    /// 创建时间范围过滤（开始时间）
    pub created_after: Option<DateTime<Utc>>,

    /// 创建时间范围过滤（结束时间）
    pub created_before: Option<DateTime<Utc>>,

    /// 每页数量，范围 1..=1000，默认 50
    pub limit: Option<u32>,

    /// 分页偏移
    pub offset: Option<u32>,
}

impl From<TaskQueryRequestDto> for TaskQueryParams {
    fn from(dto: TaskQueryRequestDto) -> Self {
        Self {
            task_ids: dto.task_ids,
            task_types: dto.task_types,
            statuses: dto.statuses,
            created_after: dto.created_after,
            created_before: dto.created_before,
            limit: dto.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: dto.offset.unwrap_or(0),
        }
    }
}
