// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response of `GET /archives/{domain}/{timestamp}`
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SnapshotListing {
    /// Every stored page, relative to the snapshot root
    pub pages: Vec<String>,
    /// Root `index.html` content when the snapshot has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Response of `GET /versions/{domain}`, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionsResponse {
    pub versions: Vec<String>,
}

/// A file read back from a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFile {
    Html(String),
    Binary {
        bytes: Vec<u8>,
        content_type: String,
    },
}
