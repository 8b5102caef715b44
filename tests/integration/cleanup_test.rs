// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_pool, test_settings, TestBackend};
use assetforge::domain::models::task::TaskStatus;
use assetforge::domain::repositories::task_repository::TaskRepository;

#[tokio::test(start_paused = true)]
async fn test_sweep_spares_active_tasks_of_a_live_pool() {
    let mut settings = test_settings();
    settings.worker.max_workers = 1;
    settings.cleanup.max_history_hours = 0;
    let mut pool = build_pool(settings, TestBackend::gated());

    let finished = pool.submit("finished").await;
    let running = pool.submit("running").await;
    let queued = pool.submit("queued").await;
    pool.manager.start();

    pool.wait_for_started(1).await;
    pool.backend.release(1);
    pool.wait_for_status(finished.id, TaskStatus::Succeeded).await;
    pool.wait_for_status(running.id, TaskStatus::Running).await;

    let cleanup = pool.manager.cleanup();
    let report = cleanup.sweep().await.unwrap();
    assert_eq!(report.records_removed, 1);
    assert!(pool
        .repository
        .find_by_id(finished.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(pool.status_of(running.id).await, TaskStatus::Running);
    assert_eq!(pool.status_of(queued.id).await, TaskStatus::Queued);

    // 没有新的完成时再次清理不做任何事
    assert_eq!(cleanup.sweep().await.unwrap().records_removed, 0);
    assert_eq!(pool.repository.count().await.unwrap(), 2);

    pool.backend.release(2);
    pool.wait_for_status(queued.id, TaskStatus::Succeeded).await;
    pool.manager.shutdown().await;
}
