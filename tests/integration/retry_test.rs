// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_pool, build_pool_with_storage, test_settings, FailingStorage, TestBackend};
use assetforge::domain::models::task::TaskStatus;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_always_failing_task_uses_every_attempt() {
    let mut settings = test_settings();
    settings.worker.retry_attempts = 3;
    let mut pool = build_pool(settings, TestBackend::always_failing());
    pool.manager.start();

    let task = pool.submit("doomed").await;
    let failed = pool.wait_for_status(task.id, TaskStatus::Failed).await;

    assert_eq!(failed.attempts, 4);
    assert_eq!(pool.backend.calls().len(), 4);
    assert!(failed.completed_at.is_some());
    assert!(failed.payload.is_none());
    assert!(failed.error.as_deref().unwrap_or_default().contains("503"));

    // 失败后不再有新的尝试
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pool.backend.calls().len(), 4);

    let stats = pool.manager.statistics().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retried, 3);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_fails_on_first_error() {
    let mut settings = test_settings();
    settings.worker.retry_attempts = 0;
    let mut pool = build_pool(settings, TestBackend::always_failing());
    pool.manager.start();

    let task = pool.submit("once").await;
    let failed = pool.wait_for_status(task.id, TaskStatus::Failed).await;
    assert_eq!(failed.attempts, 1);
    assert_eq!(pool.backend.calls().len(), 1);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover() {
    let mut pool = build_pool(test_settings(), TestBackend::instant().fail_times("flaky", 2));
    pool.manager.start();

    let task = pool.submit("flaky").await;
    let done = pool.wait_for_status(task.id, TaskStatus::Succeeded).await;

    assert_eq!(done.attempts, 3);
    assert!(done.error.is_none());
    assert_eq!(pool.manager.statistics().await.retried, 2);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retried_task_rejoins_at_tail() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    settings.worker.retry_delay_ms = 20;
    let mut pool = build_pool(settings, TestBackend::instant().fail_times("a", 1));

    let a = pool.submit("a").await;
    let b = pool.submit("b").await;
    let c = pool.submit("c").await;
    pool.manager.start();

    pool.wait_all_terminal(&[a.id, b.id, c.id]).await;
    assert_eq!(pool.backend.calls(), vec!["a", "b", "c", "a"]);
    assert_eq!(pool.task(a.id).await.attempts, 2);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_task_is_queued_while_waiting_to_retry() {
    let mut settings = test_settings();
    settings.worker.retry_delay_ms = 10_000;
    let mut pool = build_pool(settings, TestBackend::always_failing());
    pool.manager.start();

    let task = pool.submit("later").await;
    pool.wait_for_started(1).await;
    let waiting = pool.wait_for_status(task.id, TaskStatus::Queued).await;
    assert_eq!(waiting.attempts, 1);
    assert!(waiting.started_at.is_none());
    assert!(waiting.completed_at.is_none());

    // 等待期间可以取消，延迟结束后不会再执行
    let cancelled = pool.use_case.cancel_task(task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(pool.status_of(task.id).await, TaskStatus::Cancelled);
    assert_eq!(pool.backend.calls().len(), 1);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_is_retried_then_fails() {
    let mut settings = test_settings();
    settings.worker.retry_attempts = 2;
    settings.cache.s3_persist_threshold_kb = 1;
    let mut pool = build_pool_with_storage(
        settings,
        TestBackend::instant().with_output_size(8192),
        Arc::new(FailingStorage),
    );
    pool.manager.start();

    let task = pool.submit("big").await;
    let failed = pool.wait_for_status(task.id, TaskStatus::Failed).await;

    assert_eq!(failed.attempts, 3);
    assert!(failed
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("bucket unavailable"));
    assert!(pool.manager.cache().is_empty());

    pool.manager.shutdown().await;
}
