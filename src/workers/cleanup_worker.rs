// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::settings::CleanupSettings;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::infrastructure::cache::result_cache::ResultCache;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;

/// 一次清理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 删除的终态任务记录数
    pub records_removed: u64,
    /// 清除的过期缓存条目数
    pub cache_entries_purged: usize,
}

/// 历史任务清理工作器
///
/// 负责定期删除完成时间早于保留期限的终态任务，并清除过期的缓存条目。
/// 排队中和执行中的任务无论多旧都不会被删除。
pub struct CleanupWorker {
    repository: Arc<dyn TaskRepository>,
    cache: Arc<ResultCache>,
    interval: Duration,
    /// 为 `None` 时没有任何记录达到保留期限
    retention: Option<chrono::Duration>,
}

impl CleanupWorker {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        cache: Arc<ResultCache>,
        settings: &CleanupSettings,
    ) -> Self {
        Self {
            repository,
            cache,
            interval: settings.interval(),
            retention: settings.retention(),
        }
    }

    /// 执行一次清理
    pub async fn sweep(&self) -> Result<SweepReport, WorkerError> {
        let cutoff = self
            .retention
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let records_removed = match cutoff {
            Some(cutoff) => self.repository.delete_terminal_before(cutoff).await?,
            None => 0,
        };
        let cache_entries_purged = self.cache.purge_expired();

        counter!("task_records_swept_total").increment(records_removed);
        if records_removed > 0 || cache_entries_purged > 0 {
            info!(
                "Cleanup removed {} task records and {} cache entries",
                records_removed, cache_entries_purged
            );
        } else {
            debug!("Cleanup found nothing to remove");
        }

        Ok(SweepReport {
            records_removed,
            cache_entries_purged,
        })
    }
}

#[async_trait]
impl Worker for CleanupWorker {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        info!("Cleanup worker started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("Failed to clean up task history: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Cleanup worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "cleanup_worker"
    }
}

#[cfg(test)]
#[path = "cleanup_worker_test.rs"]
mod tests;
