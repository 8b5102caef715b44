// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::settings::StorageSettings;
use crate::domain::repositories::storage_repository::{
    StorageError, StorageRepository, StoredObject,
};

const CONTENT_TYPE_KEY: &str = "content-type";

/// S3 对象存储实现
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint: Option<String>,
    region: String,
}

impl S3Storage {
    pub fn new(
        region: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    ) -> Self {
        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()))
            .credentials_provider(credentials);

        if let Some(ep) = endpoint.clone() {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let config = config_builder.build();
        let client = aws_sdk_s3::Client::from_conf(config);

        Self {
            client,
            bucket,
            endpoint,
            region,
        }
    }

    fn object_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(ep) => format!("{}/{}/{}", ep.trim_end_matches('/'), self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[async_trait]
impl StorageRepository for S3Storage {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()));

        for (name, value) in metadata {
            if name == CONTENT_TYPE_KEY {
                request = request.content_type(value);
            } else {
                request = request.metadata(name, value);
            }
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        debug!("Uploaded {} bytes to s3://{}/{}", data.len(), self.bucket, key);

        Ok(StoredObject {
            key: key.to_string(),
            url: self.object_url(key),
            size: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Other(e.to_string()))?
                    .into_bytes();
                Ok(Some(data.to_vec()))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StorageError::Other(service_error.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Other(service_error.to_string()))
                }
            }
        }
    }
}

/// 本地文件系统存储实现
///
/// 元数据写入同目录下的 `.meta.json` 文件
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.split('/').any(|part| part == "..") || Path::new(key).is_absolute() {
            return Err(StorageError::Other(format!("Invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(key))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}

#[async_trait]
impl StorageRepository for LocalStorage {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError> {
        let full_path = self.full_path(key)?;

        // 确保目录存在
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        if !metadata.is_empty() {
            let encoded = serde_json::to_vec(metadata)
                .map_err(|e| StorageError::Other(e.to_string()))?;
            fs::write(Self::meta_path(&full_path), encoded).await?;
        }

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("file://{}", full_path.to_string_lossy()),
            size: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full_path = self.full_path(key)?;

        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let full_path = self.full_path(key)?;

        for path in [Self::meta_path(&full_path), full_path] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let full_path = self.full_path(key)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}

/// 内存存储实现，用于测试和单进程部署
#[derive(Default, Clone)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, (Vec<u8>, HashMap<String, String>)>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取对象的元数据
    pub async fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        let map = self.data.read().await;
        map.get(key).map(|(_, meta)| meta.clone())
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageRepository for InMemoryStorage {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError> {
        let mut map = self.data.write().await;
        map.insert(key.to_string(), (data.to_vec(), metadata.clone()));
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{}", key),
            size: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let map = self.data.read().await;
        Ok(map.get(key).map(|(data, _)| data.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let map = self.data.read().await;
        Ok(map.contains_key(key))
    }
}

/// 存储工厂函数
pub fn create_storage_repository(
    settings: &StorageSettings,
) -> Result<Arc<dyn StorageRepository>, StorageError> {
    match settings.storage_type.as_str() {
        "local" => {
            let base_path = settings
                .local_path
                .clone()
                .unwrap_or_else(|| "./storage".to_string());
            info!("Using local storage at {}", base_path);
            Ok(Arc::new(LocalStorage::new(base_path)))
        }
        "s3" => {
            let required = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .ok_or_else(|| StorageError::Configuration(format!("{} is required", name)))
            };
            let region = required(&settings.s3_region, "storage.s3_region")?;
            let bucket = required(&settings.s3_bucket, "storage.s3_bucket")?;
            let access_key = required(&settings.s3_access_key, "storage.s3_access_key")?;
            let secret_key = required(&settings.s3_secret_key, "storage.s3_secret_key")?;
            info!("Using S3 storage bucket {} in {}", bucket, region);
            Ok(Arc::new(S3Storage::new(
                region,
                bucket,
                access_key,
                secret_key,
                settings.s3_endpoint.clone(),
            )))
        }
        "memory" => {
            info!("Using in-memory storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        other => Err(StorageError::Configuration(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}
