// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod archive;
pub mod compare;
pub mod snapshot;
pub mod version;
