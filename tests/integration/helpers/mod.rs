// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use assetforge::application::dto::generation_request::GenerationRequestDto;
use assetforge::application::usecases::submit_generation::SubmitGenerationUseCase;
use assetforge::config::settings::Settings;
use assetforge::domain::models::generation::GenerationOutput;
use assetforge::domain::models::model::ResolvedModel;
use assetforge::domain::models::task::{Task, TaskStatus, TaskType};
use assetforge::domain::repositories::storage_repository::{
    StorageError, StorageRepository, StoredObject,
};
use assetforge::domain::repositories::task_repository::TaskRepository;
use assetforge::domain::services::inference_service::{InferenceBackend, InferenceError};
use assetforge::infrastructure::repositories::memory_task_repo::InMemoryTaskRepository;
use assetforge::infrastructure::storage::InMemoryStorage;
use assetforge::workers::manager::WorkerManager;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

const POLL_STEP: Duration = Duration::from_millis(5);
const POLL_LIMIT: usize = 20_000;

/// 可编排的推理后端
///
/// 按请求参数中的 `label` 记录调用顺序，可以让指定 label 失败若干次，
/// 也可以在返回前等待测试放行。
pub struct TestBackend {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
    fail_all: bool,
    gate: Option<Semaphore>,
    started: AtomicUsize,
    output_size: usize,
}

#[allow(dead_code)]
impl TestBackend {
    /// 立即成功的后端
    pub fn instant() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            fail_all: false,
            gate: None,
            started: AtomicUsize::new(0),
            output_size: 16,
        }
    }

    /// 每次调用都失败
    pub fn always_failing() -> Self {
        Self {
            fail_all: true,
            ..Self::instant()
        }
    }

    /// 每次调用都等待 `release` 放行
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::instant()
        }
    }

    /// 指定 label 的前 `times` 次调用失败
    pub fn fail_times(self, label: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(label.to_string(), times);
        self
    }

    pub fn with_output_size(mut self, size: usize) -> Self {
        self.output_size = size;
        self
    }

    /// 放行 `n` 个等待中的调用
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// 已开始的调用数
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// 按开始顺序返回调用的 label
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn should_fail(&self, label: &str) -> bool {
        if self.fail_all {
            return true;
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(label) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl InferenceBackend for TestBackend {
    async fn run_inference(
        &self,
        _model: &ResolvedModel,
        parameters: &Value,
    ) -> Result<GenerationOutput, InferenceError> {
        let label = parameters["label"].as_str().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(label.clone());
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.should_fail(&label) {
            return Err(InferenceError::Provider {
                status: 503,
                message: "upstream unavailable".to_string(),
            });
        }

        Ok(GenerationOutput::new(
            vec![0xAB; self.output_size],
            "image/png",
        ))
    }
}

/// 写入总是失败的对象存储
pub struct FailingStorage;

#[async_trait]
impl StorageRepository for FailingStorage {
    async fn put(
        &self,
        _key: &str,
        _data: &[u8],
        _metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError> {
        Err(StorageError::Other("bucket unavailable".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// 测试用工作池
#[allow(dead_code)]
pub struct TestPool {
    pub manager: WorkerManager,
    pub use_case: Arc<SubmitGenerationUseCase>,
    pub repository: Arc<dyn TaskRepository>,
    pub backend: Arc<TestBackend>,
    pub settings: Settings,
}

/// 适合测试的配置：短间隔、关闭限流、使用内存存储
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.worker.max_workers = 2;
    settings.worker.retry_attempts = 3;
    settings.worker.retry_delay_ms = 20;
    settings.worker.scheduler_interval_ms = 10;
    settings.worker.max_queue_size = 100;
    settings.cleanup.cleanup_interval_secs = 86_400;
    settings.rate_limiting.enabled = false;
    settings.storage.storage_type = "memory".to_string();
    settings.metrics.enabled = false;
    settings
}

#[allow(dead_code)]
pub fn build_pool(settings: Settings, backend: TestBackend) -> TestPool {
    build_pool_with_storage(settings, backend, Arc::new(InMemoryStorage::new()))
}

pub fn build_pool_with_storage(
    settings: Settings,
    backend: TestBackend,
    storage: Arc<dyn StorageRepository>,
) -> TestPool {
    let repository: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
    let backend = Arc::new(backend);
    let manager = WorkerManager::new(&settings, repository.clone(), storage, backend.clone())
        .expect("test settings should build a worker manager");
    let use_case = manager.submissions();

    TestPool {
        manager,
        use_case,
        repository,
        backend,
        settings,
    }
}

#[allow(dead_code)]
impl TestPool {
    /// 提交一个以 label 区分参数的生成请求
    pub async fn submit(&self, label: &str) -> Task {
        self.use_case
            .submit(request(label))
            .await
            .expect("submission should be admitted")
    }

    pub async fn status_of(&self, id: Uuid) -> TaskStatus {
        self.task(id).await.status
    }

    pub async fn task(&self, id: Uuid) -> Task {
        self.repository
            .find_by_id(id)
            .await
            .unwrap()
            .expect("task record should exist")
    }

    /// 等待任务进入指定状态
    pub async fn wait_for_status(&self, id: Uuid, status: TaskStatus) -> Task {
        for _ in 0..POLL_LIMIT {
            let task = self.task(id).await;
            if task.status == status {
                return task;
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("task {} never reached {}", id, status);
    }

    /// 等待后端至少开始 `n` 次调用
    pub async fn wait_for_started(&self, n: usize) {
        for _ in 0..POLL_LIMIT {
            if self.backend.started() >= n {
                return;
            }
            tokio::time::sleep(POLL_STEP).await;
        }
        panic!("backend only started {} of {} calls", self.backend.started(), n);
    }

    /// 等待所有任务进入终态
    pub async fn wait_all_terminal(&self, ids: &[Uuid]) -> Vec<Task> {
        let mut done = Vec::with_capacity(ids.len());
        for id in ids {
            let mut finished = None;
            for _ in 0..POLL_LIMIT {
                let task = self.task(*id).await;
                if task.is_terminal() {
                    finished = Some(task);
                    break;
                }
                tokio::time::sleep(POLL_STEP).await;
            }
            done.push(finished.unwrap_or_else(|| panic!("task {} never finished", id)));
        }
        done
    }
}

pub fn request(label: &str) -> GenerationRequestDto {
    GenerationRequestDto {
        task_type: TaskType::Symbols,
        model: None,
        parameters: json!({"label": label, "prompt": format!("slot symbol {}", label)}),
    }
}
