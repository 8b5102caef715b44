// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::models::model::ResolvedModel;
use crate::domain::models::task::TaskType;

/// 推理后端的原始输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub data: Vec<u8>,
    pub content_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GenerationOutput {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// 计算生成请求的指纹
///
/// 指纹覆盖资源类型、模型标识和参数，参数中的对象键按字典序规范化，
/// 因此键顺序不同但内容相同的请求得到同一指纹。
pub fn fingerprint(task_type: TaskType, model: &ResolvedModel, parameters: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task_type.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(model.model_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(parameters).as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// 外置结果在对象存储中的键
///
/// 布局为 `asset_output/{YYYY}-{MM}-{DD}/{task_id}/{task_type}/result.bin`
pub fn output_object_key(task_type: TaskType, task_id: Uuid, at: DateTime<Utc>) -> String {
    format!(
        "asset_output/{}/{}/{}/result.bin",
        at.format("%Y-%m-%d"),
        task_id,
        task_type
    )
}
