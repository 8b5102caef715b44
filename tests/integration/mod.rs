// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod admission_test;
pub mod cleanup_test;
pub mod helpers;
pub mod retry_test;
pub mod scheduler_test;
