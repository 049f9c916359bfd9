// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to archive a site starting from a seed URL
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArchiveRequest {
    /// Seed URL; its authority bounds the crawl
    pub url: String,
}

/// Result of one archive run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    /// Authority of the seed URL, used as the top-level archive directory
    pub domain: String,
    /// Snapshot directory name (ISO-8601, UTC)
    pub timestamp: String,
    /// URLs admitted to the visited set, including ones that failed
    pub pages_visited: usize,
    /// Pages actually written to the snapshot
    pub pages_written: usize,
    /// Whether the run stopped early because of a page limit or time budget
    pub truncated: bool,
}

/// Response of `POST /archive`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArchiveResponse {
    Success {
        domain: String,
        timestamp: String,
        /// Number of URLs visited during the run (attempted, not necessarily written)
        pages_archived: usize,
        pages_written: usize,
        truncated: bool,
    },
    Error {
        message: String,
    },
}

impl From<ArchiveOutcome> for ArchiveResponse {
    fn from(outcome: ArchiveOutcome) -> Self {
        ArchiveResponse::Success {
            domain: outcome.domain,
            timestamp: outcome.timestamp,
            pages_archived: outcome.pages_visited,
            pages_written: outcome.pages_written,
            truncated: outcome.truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_shape() {
        let response = ArchiveResponse::from(ArchiveOutcome {
            domain: "example.com".to_string(),
            timestamp: "2026-01-02T03:04:05.000006".to_string(),
            pages_visited: 3,
            pages_written: 2,
            truncated: false,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["domain"], "example.com");
        assert_eq!(json["pages_archived"], 3);
        assert_eq!(json["pages_written"], 2);
    }

    #[test]
    fn test_error_response_shape() {
        let response = ArchiveResponse::Error {
            message: "Invalid URL".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "Invalid URL"}));
    }
}
