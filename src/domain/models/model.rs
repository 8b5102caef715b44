// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::task::TaskType;

/// 推理服务提供商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Replicate,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Replicate => write!(f, "replicate"),
        }
    }
}

/// 模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Image,
    Text,
    Audio,
    Animation,
    Video,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capability::Image => write!(f, "image"),
            Capability::Text => write!(f, "text"),
            Capability::Audio => write!(f, "audio"),
            Capability::Animation => write!(f, "animation"),
            Capability::Video => write!(f, "video"),
        }
    }
}

/// 模型别名
///
/// 客户端只使用别名，别名到提供商模型标识的映射集中在这里维护。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAlias {
    GptImage1,
    Dalle3,
    Gpt4o,
    Gpt4oMini,
    Ardianfe,
    Meta,
    Pixverse,
    Pia,
    BackgroundRemoval,
}

impl ModelAlias {
    pub const ALL: [ModelAlias; 9] = [
        ModelAlias::GptImage1,
        ModelAlias::Dalle3,
        ModelAlias::Gpt4o,
        ModelAlias::Gpt4oMini,
        ModelAlias::Ardianfe,
        ModelAlias::Meta,
        ModelAlias::Pixverse,
        ModelAlias::Pia,
        ModelAlias::BackgroundRemoval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAlias::GptImage1 => "gpt_image_1",
            ModelAlias::Dalle3 => "dalle3",
            ModelAlias::Gpt4o => "gpt4o",
            ModelAlias::Gpt4oMini => "gpt4o_mini",
            ModelAlias::Ardianfe => "ardianfe",
            ModelAlias::Meta => "meta",
            ModelAlias::Pixverse => "pixverse",
            ModelAlias::Pia => "pia",
            ModelAlias::BackgroundRemoval => "background_removal",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ModelAlias::GptImage1
            | ModelAlias::Dalle3
            | ModelAlias::Gpt4o
            | ModelAlias::Gpt4oMini => Provider::OpenAi,
            _ => Provider::Replicate,
        }
    }

    /// 提供商侧的模型标识
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelAlias::GptImage1 => "gpt-image-1",
            ModelAlias::Dalle3 => "dall-e-3",
            ModelAlias::Gpt4o => "gpt-4o",
            ModelAlias::Gpt4oMini => "gpt-4o-mini",
            ModelAlias::Ardianfe => "ardianfe/musicgen-stereo-chord:latest",
            ModelAlias::Meta => "meta/musicgen",
            ModelAlias::Pixverse => "pixverse/pixverse-v4",
            ModelAlias::Pia => "open-mmlab/pia",
            ModelAlias::BackgroundRemoval => "nateraw/video-background-remover",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ModelAlias::GptImage1 | ModelAlias::Dalle3 => Capability::Image,
            ModelAlias::Gpt4o | ModelAlias::Gpt4oMini => Capability::Text,
            ModelAlias::Ardianfe | ModelAlias::Meta => Capability::Audio,
            ModelAlias::Pixverse | ModelAlias::Pia => Capability::Animation,
            ModelAlias::BackgroundRemoval => Capability::Video,
        }
    }
}

impl fmt::Display for ModelAlias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelAlias {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelAlias::ALL
            .iter()
            .copied()
            .find(|alias| alias.as_str() == s)
            .ok_or_else(|| ModelError::UnknownAlias(s.to_string()))
    }
}

/// 已解析的模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub alias: ModelAlias,
    pub provider: Provider,
    pub model_id: String,
}

impl From<ModelAlias> for ResolvedModel {
    fn from(alias: ModelAlias) -> Self {
        Self {
            alias,
            provider: alias.provider(),
            model_id: alias.model_id().to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown model alias: {0}")]
    UnknownAlias(String),

    #[error("Model {alias} does not support {task_type} tasks")]
    Unsupported { alias: ModelAlias, task_type: TaskType },
}

/// 解析任务使用的模型
///
/// 未指定别名时使用资源类型的默认模型；指定的别名必须具备该资源类型要求的能力。
pub fn resolve_model(
    task_type: TaskType,
    requested: Option<&str>,
) -> Result<ResolvedModel, ModelError> {
    let alias = match requested {
        None => task_type.default_model(),
        Some(name) => name.trim().parse::<ModelAlias>()?,
    };

    if alias.capability() != task_type.capability() {
        return Err(ModelError::Unsupported { alias, task_type });
    }

    Ok(alias.into())
}
