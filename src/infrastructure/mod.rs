// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - 缓存（cache）：生成结果缓存
/// - 指标（metrics）：Prometheus 指标导出
/// - 仓库实现（repositories）：任务记录仓库的内存实现
/// - 服务（services）：准入限流和 HTTP 推理网关
/// - 存储（storage）：S3、本地文件和内存对象存储
///
/// 基础设施层遵循依赖倒置原则，依赖于领域层的抽象接口，
/// 确保领域层保持纯粹的业务逻辑，不受技术实现的影响。
pub mod cache;
pub mod metrics;
pub mod repositories;
pub mod services;
pub mod storage;
