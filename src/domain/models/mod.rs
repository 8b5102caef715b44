// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 任务（task）：一次资源生成请求及其生命周期
/// - 模型（model）：模型别名、提供商与能力映射
/// - 生成结果（generation）：推理输出、请求指纹与外置存储键
///
/// 这些模型构成了系统的数据基础，定义了业务概念的
/// 结构和行为，是领域驱动设计的核心组成部分。
pub mod generation;
pub mod model;
pub mod task;
