// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_pool, build_pool_with_storage, test_settings, TestBackend};
use assetforge::domain::models::task::{PayloadRef, TaskStatus};
use assetforge::infrastructure::storage::InMemoryStorage;
use assetforge::domain::repositories::storage_repository::StorageRepository;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_two_workers_three_tasks() {
    let mut settings = test_settings();
    settings.worker.max_workers = 2;
    let mut pool = build_pool(settings, TestBackend::gated());

    let a = pool.submit("a").await;
    let b = pool.submit("b").await;
    let c = pool.submit("c").await;
    pool.manager.start();

    pool.wait_for_started(2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pool.status_of(a.id).await, TaskStatus::Running);
    assert_eq!(pool.status_of(b.id).await, TaskStatus::Running);
    assert_eq!(pool.status_of(c.id).await, TaskStatus::Queued);
    assert_eq!(pool.backend.started(), 2);
    assert_eq!(pool.manager.scheduler().running(), 2);

    // 放行一个执行中的任务后，排队的任务进入执行
    pool.backend.release(1);
    pool.wait_for_started(3).await;
    pool.wait_for_status(c.id, TaskStatus::Running).await;

    pool.backend.release(2);
    let finished = pool.wait_all_terminal(&[a.id, b.id, c.id]).await;
    for task in finished {
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.attempts, 1);
        assert!(task.completed_at.is_some());
        assert!(task.payload.is_some());
    }

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_follows_admission_order() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    let mut pool = build_pool(settings, TestBackend::instant());

    let labels = ["t0", "t1", "t2", "t3", "t4"];
    let mut ids = Vec::new();
    for label in labels {
        ids.push(pool.submit(label).await.id);
    }
    pool.manager.start();

    pool.wait_all_terminal(&ids).await;
    assert_eq!(pool.backend.calls(), labels.to_vec());

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_every_admitted_task_reaches_terminal_state() {
    let mut settings = test_settings();
    settings.worker.max_workers = 3;
    let mut pool = build_pool(settings, TestBackend::instant());
    pool.manager.start();

    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(pool.submit(&format!("task-{}", i)).await.id);
    }

    let finished = pool.wait_all_terminal(&ids).await;
    assert!(finished.iter().all(|t| t.status == TaskStatus::Succeeded));

    let stats = pool.manager.statistics().await;
    assert_eq!(stats.submitted, 20);
    assert_eq!(stats.succeeded, 20);
    assert_eq!(stats.queue_depth, 0);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_identical_requests_hit_result_cache() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    let mut pool = build_pool(settings, TestBackend::instant());

    let first = pool.submit("same").await;
    let second = pool.submit("same").await;
    pool.manager.start();

    let finished = pool.wait_all_terminal(&[first.id, second.id]).await;
    assert_eq!(pool.backend.calls().len(), 1);
    assert_eq!(finished[0].payload, finished[1].payload);
    assert_eq!(finished[1].status, TaskStatus::Succeeded);
    assert_eq!(finished[1].attempts, 1);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_large_results_are_externalized() {
    let mut settings = test_settings();
    settings.cache.s3_persist_threshold_kb = 1;
    let storage = Arc::new(InMemoryStorage::new());
    let mut pool = build_pool_with_storage(
        settings,
        TestBackend::instant().with_output_size(4096),
        storage.clone(),
    );
    pool.manager.start();

    let task = pool.submit("huge").await;
    let done = pool.wait_for_status(task.id, TaskStatus::Succeeded).await;

    match done.payload {
        Some(PayloadRef::External { key, size, .. }) => {
            assert_eq!(size, 4096);
            assert!(key.starts_with("asset_output/"));
            assert!(key.ends_with(&format!("{}/symbols/result.bin", task.id)));
            assert!(storage.exists(&key).await.unwrap());
        }
        other => panic!("expected external payload, got {:?}", other),
    }

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_small_results_stay_inline() {
    let storage = Arc::new(InMemoryStorage::new());
    let mut pool = build_pool_with_storage(test_settings(), TestBackend::instant(), storage.clone());
    pool.manager.start();

    let task = pool.submit("tiny").await;
    let done = pool.wait_for_status(task.id, TaskStatus::Succeeded).await;
    assert!(matches!(done.payload, Some(PayloadRef::Inline { .. })));
    assert!(storage.is_empty().await);

    pool.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_work() {
    let mut pool = build_pool(test_settings(), TestBackend::gated());
    pool.manager.start();

    let task = pool.submit("slow").await;
    pool.wait_for_started(1).await;

    let backend = pool.backend.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        backend.release(1);
    });

    pool.manager.shutdown().await;
    assert!(!pool.manager.is_running());
    assert_eq!(pool.status_of(task.id).await, TaskStatus::Succeeded);
}
