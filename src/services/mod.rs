// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod comparator;
pub mod crawler;
pub mod fetcher;
pub mod links;
pub mod localizer;
pub mod logging;
pub mod rewriter;
pub mod sanitize;
pub mod store;
