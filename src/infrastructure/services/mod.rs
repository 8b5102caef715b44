// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施服务模块
///
/// 提供基础设施层的服务实现
/// 包括准入限流和 HTTP 推理网关
pub mod http_inference;
pub mod rate_limiter;
