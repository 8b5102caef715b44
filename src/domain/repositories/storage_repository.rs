// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 配置错误
    #[error("Storage configuration error: {0}")]
    Configuration(String),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 已写入存储的对象描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

/// 存储仓库特质
///
/// 定义存储数据访问接口
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// 使用指定键保存数据，`metadata` 中的 `content-type` 作为对象的内容类型
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError>;

    /// 根据键从存储中检索数据
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 根据键从存储中删除数据
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// 检查存储中是否存在指定键
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
