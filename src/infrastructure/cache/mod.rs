// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 提供生成结果的内存缓存，超过阈值的结果外置到对象存储
pub mod result_cache;
