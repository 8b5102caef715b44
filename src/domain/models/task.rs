// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::generation::fingerprint;
use crate::domain::models::model::{Capability, ModelAlias, ResolvedModel};

/// 生成任务实体
///
/// 表示一次美术资源生成请求的完整生命周期。任务在准入时创建，
/// 之后只由执行它的工作器修改（状态、尝试次数、时间戳），
/// 清理器只会删除已处于终态的记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符，准入时生成
    pub id: Uuid,
    /// 资源类型，决定可用模型的能力
    pub task_type: TaskType,
    /// 解析后的推理模型
    pub model: ResolvedModel,
    /// 生成参数，原样传递给推理后端
    pub parameters: serde_json::Value,
    /// 任务状态
    pub status: TaskStatus,
    /// 已执行次数，每次派发到工作器时加一
    pub attempts: u32,
    /// 最大重试次数，总执行次数不超过 `max_retries + 1`
    pub max_retries: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最近一次开始执行的时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间，当且仅当任务处于终态时存在
    pub completed_at: Option<DateTime<Utc>>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
    /// 生成结果，成功时为内联数据或外部存储引用之一
    pub payload: Option<PayloadRef>,
    /// 失败原因，仅在 Failed 状态下设置
    pub error: Option<String>,
}

/// 资源类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 老虎机符号
    #[default]
    Symbols,
    /// UI 元素（按钮、面板、弹窗）
    Ui,
    /// 游戏背景
    Backgrounds,
    /// 音效与音乐
    Audio,
    /// 动画
    Animation,
    /// 视频处理
    Video,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Symbols,
        TaskType::Ui,
        TaskType::Backgrounds,
        TaskType::Audio,
        TaskType::Animation,
        TaskType::Video,
    ];

    /// 该资源类型要求模型具备的能力
    pub fn capability(&self) -> Capability {
        match self {
            TaskType::Symbols | TaskType::Ui | TaskType::Backgrounds => Capability::Image,
            TaskType::Audio => Capability::Audio,
            TaskType::Animation => Capability::Animation,
            TaskType::Video => Capability::Video,
        }
    }

    /// 未指定模型时使用的默认模型
    pub fn default_model(&self) -> ModelAlias {
        match self {
            TaskType::Symbols | TaskType::Ui | TaskType::Backgrounds => ModelAlias::GptImage1,
            TaskType::Audio => ModelAlias::Ardianfe,
            TaskType::Animation => ModelAlias::Pixverse,
            TaskType::Video => ModelAlias::BackgroundRemoval,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::Symbols => write!(f, "symbols"),
            TaskType::Ui => write!(f, "ui"),
            TaskType::Backgrounds => write!(f, "backgrounds"),
            TaskType::Audio => write!(f, "audio"),
            TaskType::Animation => write!(f, "animation"),
            TaskType::Video => write!(f, "video"),
        }
    }
}

impl FromStr for TaskType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbols" => Ok(TaskType::Symbols),
            "ui" => Ok(TaskType::Ui),
            "backgrounds" => Ok(TaskType::Backgrounds),
            "audio" => Ok(TaskType::Audio),
            "animation" => Ok(TaskType::Animation),
            "video" => Ok(TaskType::Video),
            other => Err(DomainError::ValidationError(format!(
                "unknown task type: {}",
                other
            ))),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Queued → Running → Succeeded/Failed
/// Running → Queued（重试）
/// Queued → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 已入队，等待工作器槽位
    #[default]
    Queued,
    /// 执行中
    Running,
    /// 已成功
    Succeeded,
    /// 已失败，重试次数耗尽
    Failed,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown task status: {}",
                other
            ))),
        }
    }
}

/// 任务结果引用
///
/// 小于外置阈值的结果内联保存，超过阈值的结果写入对象存储，只保留引用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadRef {
    /// 内联结果
    Inline {
        data: Vec<u8>,
        content_type: String,
    },
    /// 外部存储引用
    External {
        key: String,
        url: String,
        size: u64,
        content_type: String,
    },
}

impl PayloadRef {
    /// 结果字节数
    pub fn size(&self) -> u64 {
        match self {
            PayloadRef::Inline { data, .. } => data.len() as u64,
            PayloadRef::External { size, .. } => *size,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            PayloadRef::Inline { content_type, .. } => content_type,
            PayloadRef::External { content_type, .. } => content_type,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, PayloadRef::External { .. })
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} ({action})")]
    InvalidStateTransition {
        from: TaskStatus,
        action: &'static str,
    },

    /// 重试次数已耗尽
    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Task {
    /// 创建一个新的排队任务
    ///
    /// # 参数
    ///
    /// * `task_type` - 资源类型
    /// * `model` - 已解析的推理模型
    /// * `parameters` - 生成参数
    /// * `max_retries` - 最大重试次数
    pub fn new(
        task_type: TaskType,
        model: ResolvedModel,
        parameters: serde_json::Value,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            model,
            parameters,
            status: TaskStatus::Queued,
            attempts: 0,
            max_retries,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            payload: None,
            error: None,
        }
    }

    /// 开始执行
    ///
    /// Queued → Running，记录开始时间并累加尝试次数
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Queued => {
                if self.attempts > self.max_retries {
                    return Err(DomainError::RetriesExhausted {
                        attempts: self.attempts,
                    });
                }
                let now = Utc::now();
                self.status = TaskStatus::Running;
                self.attempts += 1;
                self.started_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                action: "start",
            }),
        }
    }

    /// 标记成功并保存结果
    ///
    /// Running → Succeeded
    pub fn succeed(mut self, payload: PayloadRef) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Running => {
                let now = Utc::now();
                self.status = TaskStatus::Succeeded;
                self.payload = Some(payload);
                self.error = None;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                action: "succeed",
            }),
        }
    }

    /// 标记失败并记录原因
    ///
    /// Running → Failed
    pub fn fail(mut self, reason: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Running => {
                let now = Utc::now();
                self.status = TaskStatus::Failed;
                self.error = Some(reason.into());
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                action: "fail",
            }),
        }
    }

    /// 退回队列等待重试
    ///
    /// Running → Queued，仅在仍有剩余重试次数时允许
    pub fn requeue(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Running => {
                if !self.can_retry() {
                    return Err(DomainError::RetriesExhausted {
                        attempts: self.attempts,
                    });
                }
                self.status = TaskStatus::Queued;
                self.started_at = None;
                self.updated_at = Utc::now();
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                action: "requeue",
            }),
        }
    }

    /// 取消任务
    ///
    /// 只有排队中的任务可以取消，执行中的任务不支持中途取消
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Queued => {
                let now = Utc::now();
                self.status = TaskStatus::Cancelled;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                action: "cancel",
            }),
        }
    }

    /// 失败后是否还能重试
    pub fn can_retry(&self) -> bool {
        self.attempts <= self.max_retries
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 结果缓存键
    pub fn fingerprint(&self) -> String {
        fingerprint(self.task_type, &self.model, &self.parameters)
    }
}
