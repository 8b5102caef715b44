// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含准入、查询和取消等用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供结果缓存、限流、对象存储和推理网关等外部集成
pub mod infrastructure;

/// 队列模块
///
/// 实现任务队列和调度功能
pub mod queue;

/// 工具模块
///
/// 提供错误类型和遥测初始化
pub mod utils;

/// 工作器模块
///
/// 实现任务执行、历史清理和工作器管理
pub mod workers;
