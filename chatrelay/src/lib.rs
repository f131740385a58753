// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

pub mod backend;
pub mod config;
pub mod proxy;
pub mod stream;
