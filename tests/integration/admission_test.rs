// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_pool, request, test_settings, TestBackend};
use assetforge::application::dto::task_query_request::TaskQueryRequestDto;
use assetforge::application::usecases::submit_generation::AdmissionError;
use assetforge::domain::models::task::TaskStatus;
use assetforge::domain::repositories::task_repository::TaskRepository;
use assetforge::infrastructure::services::rate_limiter::RateLimitError;
use assetforge::infrastructure::repositories::memory_task_repo::InMemoryTaskRepository;
use assetforge::infrastructure::storage::InMemoryStorage;
use assetforge::queue::task_queue::{QueueError, TaskQueue};
use assetforge::workers::manager::WorkerManager;
use std::sync::Arc;

#[tokio::test]
async fn test_burst_of_six_rejects_exactly_one() {
    let mut settings = test_settings();
    settings.rate_limiting.enabled = true;
    settings.rate_limiting.requests_per_minute = 60;
    settings.rate_limiting.burst_size = 5;
    let pool = build_pool(settings, TestBackend::instant());

    let mut admitted = 0;
    let mut limited = 0;
    for i in 0..6 {
        match pool.use_case.submit(request(&format!("r{}", i))).await {
            Ok(_) => admitted += 1,
            Err(AdmissionError::RateLimited(RateLimitError::RateLimitExceeded { .. })) => {
                limited += 1
            }
            Err(other) => panic!("unexpected admission error: {}", other),
        }
    }

    assert_eq!(admitted, 5);
    assert_eq!(limited, 1);
    assert_eq!(pool.manager.queue().depth().await, 5);
}

#[tokio::test]
async fn test_full_queue_rejects_without_side_effects() {
    let mut settings = test_settings();
    settings.worker.max_queue_size = 2;
    let pool = build_pool(settings, TestBackend::instant());

    pool.submit("one").await;
    pool.submit("two").await;
    let before = pool.manager.queue().pending_ids().await;

    let err = pool.use_case.submit(request("three")).await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Queue(QueueError::QueueFull { capacity: 2 })
    ));

    assert_eq!(pool.manager.queue().pending_ids().await, before);
    assert_eq!(pool.repository.count().await.unwrap(), 2);
    assert_eq!(pool.manager.statistics().await.submitted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_applies_only_to_queued_tasks() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    let mut pool = build_pool(settings, TestBackend::gated());

    let running = pool.submit("running").await;
    let waiting = pool.submit("waiting").await;
    pool.manager.start();
    pool.wait_for_started(1).await;

    let cancelled = pool.use_case.cancel_task(waiting.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    let err = pool.use_case.cancel_task(running.id).await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Queue(QueueError::NotCancellable {
            status: TaskStatus::Running,
            ..
        })
    ));

    pool.backend.release(1);
    pool.wait_for_status(running.id, TaskStatus::Succeeded).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // 被取消的任务从未执行
    assert_eq!(pool.backend.calls(), vec!["running"]);
    assert_eq!(pool.status_of(waiting.id).await, TaskStatus::Cancelled);
    assert_eq!(pool.manager.statistics().await.cancelled, 1);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_completed_at_set_only_for_terminal_records() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    let mut pool = build_pool(settings, TestBackend::gated());

    let done = pool.submit("done").await;
    let running = pool.submit("running").await;
    let queued = pool.submit("queued").await;
    let cancelled = pool.submit("cancelled").await;
    pool.use_case.cancel_task(cancelled.id).await.unwrap();

    pool.manager.start();
    pool.wait_for_started(1).await;
    pool.backend.release(1);
    pool.wait_for_status(done.id, TaskStatus::Succeeded).await;
    pool.wait_for_status(running.id, TaskStatus::Running).await;

    let (tasks, total) = pool
        .use_case
        .list_tasks(TaskQueryRequestDto::default())
        .await
        .unwrap();
    assert_eq!(total, 4);
    for task in &tasks {
        assert_eq!(
            task.completed_at.is_some(),
            task.status.is_terminal(),
            "task {} in status {}",
            task.id,
            task.status
        );
    }
    assert_eq!(pool.status_of(queued.id).await, TaskStatus::Queued);

    pool.backend.release(2);
    pool.manager.shutdown().await;
}

#[tokio::test]
async fn test_manager_admission_follows_settings() {
    let mut settings = test_settings();
    settings.worker.retry_attempts = 7;
    settings.rate_limiting.enabled = true;
    settings.rate_limiting.requests_per_minute = 1;
    settings.rate_limiting.burst_size = 2;
    let pool = build_pool(settings, TestBackend::instant());

    let task = pool.submit("first").await;
    assert_eq!(task.max_retries, 7);
    pool.submit("second").await;

    let err = pool.use_case.submit(request("third")).await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::RateLimited(RateLimitError::RateLimitExceeded { .. })
    ));
    assert_eq!(pool.manager.queue().depth().await, 2);
}

#[tokio::test]
async fn test_manager_rejects_invalid_rate_limit_settings() {
    let mut settings = test_settings();
    settings.rate_limiting.enabled = true;
    settings.rate_limiting.requests_per_minute = 0;

    let result = WorkerManager::new(
        &settings,
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(InMemoryStorage::new()),
        Arc::new(TestBackend::instant()),
    );
    assert!(matches!(result, Err(RateLimitError::Configuration(_))));
}
