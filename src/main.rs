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

use assetforge::config::settings::Settings;
use assetforge::domain::repositories::task_repository::TaskRepository;
use assetforge::infrastructure::repositories::memory_task_repo::InMemoryTaskRepository;
use assetforge::infrastructure::services::http_inference::HttpInferenceBackend;
use assetforge::infrastructure::storage::create_storage_repository;
use assetforge::utils::telemetry;
use assetforge::workers::manager::WorkerManager;
use std::sync::Arc;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并运行工作池直到收到关闭信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting assetforge...");

    // 2. Load configuration
    let settings = Settings::new()?;
    settings.validate()?;
    info!("Configuration loaded");

    // 3. Initialize Prometheus Metrics
    if settings.metrics.enabled {
        assetforge::infrastructure::metrics::init_metrics(&settings.metrics.listen_addr);
    }

    // 4. Initialize collaborators
    let storage = create_storage_repository(&settings.storage)?;
    let backend = Arc::new(HttpInferenceBackend::new(&settings.inference)?);
    let repository: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
    info!("Inference gateway: {}", settings.inference.endpoint);

    // 5. Start worker pool
    let mut manager = WorkerManager::new(&settings, repository, storage, backend)?;
    manager.start();

    manager.wait_for_shutdown().await;

    let stats = manager.statistics().await;
    info!(
        "Final statistics: submitted={} succeeded={} failed={} retried={} cancelled={} queued={}",
        stats.submitted,
        stats.succeeded,
        stats.failed,
        stats.retried,
        stats.cancelled,
        stats.queue_depth
    );

    Ok(())
}
