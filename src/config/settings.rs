// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 进程启动时构建一次，之后以引用或 `Arc` 的形式注入各组件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// 工作池配置
    pub worker: WorkerSettings,
    /// 结果缓存配置
    pub cache: CacheSettings,
    /// 清理配置
    pub cleanup: CleanupSettings,
    /// 速率限制配置
    pub rate_limiting: RateLimitingSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 推理网关配置
    pub inference: InferenceSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
}

/// 工作池配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 最大并发工作器数量
    pub max_workers: usize,
    /// 失败后的最大重试次数
    pub retry_attempts: u32,
    /// 重试前的等待时间（毫秒）
    pub retry_delay_ms: u64,
    /// 调度器轮询间隔（毫秒）
    pub scheduler_interval_ms: u64,
    /// 队列最大长度
    pub max_queue_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            retry_attempts: 3,
            retry_delay_ms: 5_000,
            scheduler_interval_ms: 1_000,
            max_queue_size: 100,
        }
    }
}

/// 结果缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// 最大缓存条目数
    pub result_cache_size: usize,
    /// 缓存条目存活时间（秒）
    pub result_cache_ttl_secs: u64,
    /// 超过该大小（KB）的结果写入对象存储
    pub s3_persist_threshold_kb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            result_cache_size: 1_000,
            result_cache_ttl_secs: 3_600,
            s3_persist_threshold_kb: 512,
        }
    }
}

/// 历史保留时长上限（100 年）
pub const MAX_HISTORY_HOURS: u64 = 24 * 365 * 100;

/// 清理配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupSettings {
    /// 清理间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 终态任务保留时长（小时）
    pub max_history_hours: u64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 3_600,
            max_history_hours: 24,
        }
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingSettings {
    /// 是否启用速率限制
    pub enabled: bool,
    /// 每分钟补充的令牌数
    pub requests_per_minute: u32,
    /// 令牌桶容量
    pub burst_size: u32,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 10,
        }
    }
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, s3, memory)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// S3 区域
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (可选，用于 MinIO 等兼容服务)
    pub s3_endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_type: "local".to_string(),
            local_path: Some("./storage".to_string()),
            s3_region: None,
            s3_bucket: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_endpoint: None,
        }
    }
}

/// 推理网关配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceSettings {
    /// 推理网关地址
    pub endpoint: String,
    /// 访问密钥
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1/generate".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// 指标导出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 监听地址
    pub listen_addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:9000".to_string(),
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 和 `ASSETFORGE__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Worker pool
            .set_default("worker.max_workers", 4)?
            .set_default("worker.retry_attempts", 3)?
            .set_default("worker.retry_delay_ms", 5_000)?
            .set_default("worker.scheduler_interval_ms", 1_000)?
            .set_default("worker.max_queue_size", 100)?
            // Result cache
            .set_default("cache.result_cache_size", 1_000)?
            .set_default("cache.result_cache_ttl_secs", 3_600)?
            .set_default("cache.s3_persist_threshold_kb", 512)?
            // Cleanup
            .set_default("cleanup.cleanup_interval_secs", 3_600)?
            .set_default("cleanup.max_history_hours", 24)?
            // Rate limiting
            .set_default("rate_limiting.enabled", true)?
            .set_default("rate_limiting.requests_per_minute", 60)?
            .set_default("rate_limiting.burst_size", 10)?
            // Storage
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./storage")?
            // Inference gateway
            .set_default("inference.endpoint", "http://127.0.0.1:8080/v1/generate")?
            .set_default("inference.timeout_secs", 120)?
            // Metrics
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("ASSETFORGE").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Message(msg.to_string()));

        if self.worker.max_workers == 0 {
            return invalid("worker.max_workers must be greater than 0");
        }
        if self.worker.max_queue_size == 0 {
            return invalid("worker.max_queue_size must be greater than 0");
        }
        if self.worker.scheduler_interval_ms == 0 {
            return invalid("worker.scheduler_interval_ms must be greater than 0");
        }
        if self.cache.result_cache_size == 0 {
            return invalid("cache.result_cache_size must be greater than 0");
        }
        if self.cleanup.cleanup_interval_secs == 0 {
            return invalid("cleanup.cleanup_interval_secs must be greater than 0");
        }
        if self.cleanup.max_history_hours > MAX_HISTORY_HOURS {
            return invalid("cleanup.max_history_hours must not exceed 876000 (100 years)");
        }
        if self.rate_limiting.enabled
            && (self.rate_limiting.requests_per_minute == 0 || self.rate_limiting.burst_size == 0)
        {
            return invalid("rate_limiting.requests_per_minute and burst_size must be greater than 0");
        }
        Ok(())
    }
}

impl WorkerSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs)
    }

    /// 外置阈值（字节）
    pub fn persist_threshold_bytes(&self) -> u64 {
        self.s3_persist_threshold_kb.saturating_mul(1024)
    }
}

impl CleanupSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// 终态任务的保留时长，超出可表示范围时返回 `None`
    pub fn retention(&self) -> Option<chrono::Duration> {
        i64::try_from(self.max_history_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
    }
}

impl InferenceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
