// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 启动 Prometheus 导出器并登记指标说明
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    // 端口被占用时只记录警告
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("generation_tasks_submitted_total", "Tasks admitted to the queue");
    describe_counter!("generation_tasks_succeeded_total", "Tasks finished successfully");
    describe_counter!("generation_tasks_failed_total", "Tasks failed after exhausting retries");
    describe_counter!("generation_tasks_retried_total", "Failed attempts sent back for retry");
    describe_counter!("generation_tasks_cancelled_total", "Queued tasks cancelled");
    describe_counter!("generation_tasks_rejected_total", "Admission rejections by reason");
    describe_counter!("result_cache_hits_total", "Result cache hits");
    describe_counter!("result_cache_misses_total", "Result cache misses");
    describe_counter!("result_cache_evictions_total", "Result cache capacity evictions");
    describe_counter!("task_records_swept_total", "Terminal task records removed by cleanup");
    describe_gauge!("generation_queue_depth", "Tasks waiting for a worker slot");
}
