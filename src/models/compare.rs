// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to compare one page across two snapshots
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompareRequest {
    pub domain: String,
    pub timestamp1: String,
    pub timestamp2: String,
    /// Page path relative to the snapshot root, e.g. `about.html`
    pub path: String,
}

/// Text and image differences between two versions of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffResult {
    /// Unified diff lines (three lines of context), empty when the texts match
    pub diff: Vec<String>,
    /// `img src` values present only in the second version
    pub added_images: Vec<String>,
    /// `img src` values present only in the first version
    pub removed_images: Vec<String>,
    pub timestamp1: String,
    pub timestamp2: String,
}
