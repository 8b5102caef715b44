// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use metrics::counter;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::settings::RateLimitingSettings;

/// 限流错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// 令牌不足，请求被拒绝
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },
    /// 配置错误
    #[error("Invalid rate limit configuration: {0}")]
    Configuration(String),
}

/// 准入令牌桶限流器
///
/// 桶容量为 `burst_size`，每分钟补充 `requests_per_minute` 个令牌。
/// 在任务入队之前检查，被拒绝的请求不会占用队列容量。
pub struct RateLimiter {
    limiter: Option<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    clock: DefaultClock,
}

impl RateLimiter {
    /// 创建限流器
    ///
    /// # 参数
    /// * `requests_per_minute` - 每分钟补充的令牌数
    /// * `burst_size` - 令牌桶容量
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Result<Self, RateLimitError> {
        let rpm = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            RateLimitError::Configuration("requests_per_minute must be greater than 0".to_string())
        })?;
        let burst = NonZeroU32::new(burst_size).ok_or_else(|| {
            RateLimitError::Configuration("burst_size must be greater than 0".to_string())
        })?;

        let quota = Quota::per_minute(rpm).allow_burst(burst);
        Ok(Self {
            limiter: Some(GovernorLimiter::direct(quota)),
            clock: DefaultClock::default(),
        })
    }

    /// 不做任何限制的限流器
    pub fn disabled() -> Self {
        Self {
            limiter: None,
            clock: DefaultClock::default(),
        }
    }

    pub fn from_settings(settings: &RateLimitingSettings) -> Result<Self, RateLimitError> {
        if !settings.enabled {
            debug!("Admission rate limiting disabled");
            return Ok(Self::disabled());
        }
        Self::new(settings.requests_per_minute, settings.burst_size)
    }

    /// 尝试消耗一个令牌
    pub fn allow(&self) -> Result<(), RateLimitError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        limiter.check().map_err(|not_until| {
            let retry_after = not_until.wait_time_from(self.clock.now());
            counter!("generation_tasks_rejected_total", "reason" => "rate_limited").increment(1);
            warn!("Admission rate limit exceeded, retry after {:?}", retry_after);
            RateLimitError::RateLimitExceeded { retry_after }
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}
