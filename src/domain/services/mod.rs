// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 推理服务（inference_service）：调用外部生成模型的后端抽象
pub mod inference_service;
