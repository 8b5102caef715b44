// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::models::generation::GenerationOutput;
use crate::domain::models::model::ResolvedModel;

/// 推理错误类型
#[derive(Error, Debug)]
pub enum InferenceError {
    /// 请求发送失败
    #[error("Inference request failed: {0}")]
    Request(String),
    /// 提供商返回错误
    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    /// 请求超时
    #[error("Inference request timed out")]
    Timeout,
    /// 响应无法解析
    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),
}

/// 推理后端特质
///
/// 每次调用只尝试一次，失败后的重试由工作池负责。
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// 使用指定模型执行一次推理
    ///
    /// # 参数
    /// * `model` - 已解析的模型
    /// * `parameters` - 生成参数
    ///
    /// # 返回值
    /// * `Ok(GenerationOutput)` - 生成的原始字节和内容类型
    /// * `Err(InferenceError)` - 本次尝试失败
    async fn run_inference(
        &self,
        model: &ResolvedModel,
        parameters: &Value,
    ) -> Result<GenerationOutput, InferenceError>;
}
