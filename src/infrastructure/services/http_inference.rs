// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::settings::InferenceSettings;
use crate::domain::models::generation::GenerationOutput;
use crate::domain::models::model::ResolvedModel;
use crate::domain::services::inference_service::{InferenceBackend, InferenceError};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// HTTP 推理网关客户端
///
/// 将请求以 `{provider, model, input}` 的 JSON 形式 POST 到网关，
/// 响应体即生成结果，`Content-Type` 头作为结果的内容类型。
/// 每次调用只发送一次请求。
pub struct HttpInferenceBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceBackend {
    pub fn new(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn run_inference(
        &self,
        model: &ResolvedModel,
        parameters: &Value,
    ) -> Result<GenerationOutput, InferenceError> {
        let request_body = json!({
            "provider": model.provider.to_string(),
            "model": model.model_id,
            "input": parameters,
        });

        let mut request = self.client.post(&self.endpoint).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Sending inference request for {}", model.model_id);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout
            } else {
                InferenceError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Inference gateway returned {} for {}", status, model.model_id);
            return Err(InferenceError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let data = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout
            } else {
                InferenceError::InvalidResponse(e.to_string())
            }
        })?;

        if data.is_empty() {
            return Err(InferenceError::InvalidResponse(
                "empty response body".to_string(),
            ));
        }

        let metadata = HashMap::from([
            ("provider".to_string(), model.provider.to_string()),
            ("model".to_string(), model.model_id.clone()),
        ]);

        Ok(GenerationOutput {
            data: data.to_vec(),
            content_type,
            metadata,
        })
    }
}
