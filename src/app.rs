// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, route handlers, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::config::VERSION;
use crate::models::archive::{ArchiveRequest, ArchiveResponse};
use crate::models::compare::{CompareRequest, DiffResult};
use crate::models::snapshot::{SnapshotListing, StoredFile, VersionsResponse};
use crate::models::version::VersionResponse;
use crate::services::comparator::{self, CompareError};
use crate::services::crawler::Archiver;
use crate::services::logging::redact_url_str;
use crate::services::rewriter::{rewrite_navigation, BrowseView};
use crate::services::store::SnapshotStore;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;

/// Route prefix selecting the navigation-rewritten view of a stored page
const BROWSE_PREFIX: &str = "page/";

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub archiver: Arc<Archiver>,
}

impl AppState {
    pub fn new(archiver: Archiver) -> Self {
        Self {
            archiver: Arc::new(archiver),
        }
    }

    fn store(&self) -> &SnapshotStore {
        self.archiver.store()
    }
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Not found".to_string())
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Storage error: {e}"),
    )
}

fn file_response(file: StoredFile) -> Response {
    match file {
        StoredFile::Html(html) => Html(html).into_response(),
        StoredFile::Binary {
            bytes,
            content_type,
        } => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Agent name and version", body = VersionResponse))
)]
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        agent: "archive-agent".to_string(),
        version: VERSION.to_string(),
    })
}

/// Archive a site. Failures are reported in the body, not the status code.
#[utoipa::path(
    post,
    path = "/archive",
    request_body = ArchiveRequest,
    responses((status = 200, description = "Archive outcome", body = ArchiveResponse))
)]
pub async fn archive_handler(
    State(state): State<AppState>,
    Json(payload): Json<ArchiveRequest>,
) -> Json<ArchiveResponse> {
    info!("Archive requested for {}", redact_url_str(&payload.url));

    match state.archiver.archive(&payload.url).await {
        Ok(outcome) => Json(outcome.into()),
        Err(e) => {
            warn!(
                "Archive of {} failed: {}",
                redact_url_str(&payload.url),
                e
            );
            Json(ArchiveResponse::Error {
                message: e.to_string(),
            })
        }
    }
}

#[utoipa::path(
    get,
    path = "/archives/{domain}",
    params(("domain" = String, Path, description = "Archived domain (host[:port])")),
    responses((status = 200, description = "Snapshot timestamps, oldest first", body = Vec<String>))
)]
pub async fn list_archives_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Json<Vec<String>> {
    Json(state.store().list_timestamps(&domain).await)
}

#[utoipa::path(
    get,
    path = "/archives/{domain}/{timestamp}",
    params(
        ("domain" = String, Path, description = "Archived domain (host[:port])"),
        ("timestamp" = String, Path, description = "Snapshot timestamp"),
    ),
    responses((status = 200, description = "Stored pages and root index content", body = SnapshotListing))
)]
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Path((domain, timestamp)): Path<(String, String)>,
) -> Result<Json<SnapshotListing>, (StatusCode, String)> {
    let pages = state.store().list_pages(&domain, &timestamp).await;
    if pages.is_empty() {
        return Ok(Json(SnapshotListing::default()));
    }

    let content = state
        .store()
        .read_index(&domain, &timestamp)
        .await
        .map_err(internal_error)?;

    Ok(Json(SnapshotListing { pages, content }))
}

/// Raw stored file, or the browse view when the path starts with `page/`
#[utoipa::path(
    get,
    path = "/archives/{domain}/{timestamp}/{path}",
    params(
        ("domain" = String, Path, description = "Archived domain (host[:port])"),
        ("timestamp" = String, Path, description = "Snapshot timestamp"),
        ("path" = String, Path, description = "File path, or page/{path} for the browse view"),
    ),
    responses(
        (status = 200, description = "Stored HTML or file bytes"),
        (status = 404, description = "Not found"),
    )
)]
pub async fn snapshot_file_handler(
    State(state): State<AppState>,
    Path((domain, timestamp, path)): Path<(String, String, String)>,
) -> Result<Response, (StatusCode, String)> {
    let (file_path, browse) = match path.strip_prefix(BROWSE_PREFIX) {
        Some(page_path) => (page_path, true),
        None => (path.as_str(), false),
    };

    let file = state
        .store()
        .read_file(&domain, &timestamp, file_path)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    let file = match file {
        StoredFile::Html(html) if browse => {
            let view = BrowseView {
                domain: &domain,
                timestamp: &timestamp,
                page_path: file_path,
            };
            StoredFile::Html(rewrite_navigation(&html, &view))
        }
        other => other,
    };

    Ok(file_response(file))
}

#[utoipa::path(
    post,
    path = "/compare",
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Text diff and image changes", body = DiffResult),
        (status = 404, description = "Page missing in one of the snapshots"),
    )
)]
pub async fn compare_handler(
    State(state): State<AppState>,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<DiffResult>, (StatusCode, String)> {
    comparator::compare(
        state.store(),
        &payload.domain,
        &payload.timestamp1,
        &payload.timestamp2,
        &payload.path,
    )
    .await
    .map(Json)
    .map_err(|e| match e {
        CompareError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        CompareError::Store(e) => internal_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/versions/{domain}",
    params(("domain" = String, Path, description = "Archived domain (host[:port])")),
    responses((status = 200, description = "Snapshot timestamps, newest first", body = VersionsResponse))
)]
pub async fn versions_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Json<VersionsResponse> {
    Json(VersionsResponse {
        versions: state.store().list_versions(&domain).await,
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        version_handler,
        archive_handler,
        list_archives_handler,
        snapshot_handler,
        snapshot_file_handler,
        compare_handler,
        versions_handler,
    ),
    components(schemas(
        ArchiveRequest,
        ArchiveResponse,
        SnapshotListing,
        VersionsResponse,
        CompareRequest,
        DiffResult,
        VersionResponse,
    ))
)]
pub struct ArchiveApiDoc;

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ArchiveApiDoc::openapi())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the Axum application router.
///
/// CORS is opened to any origin when `cors_enabled` is set, since the browsing
/// front end is served from a different origin.
pub fn create_router(state: AppState, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/version", get(version_handler))
        .route("/archive", post(archive_handler))
        .route("/archives/{domain}", get(list_archives_handler))
        .route("/archives/{domain}/{timestamp}", get(snapshot_handler))
        .route(
            "/archives/{domain}/{timestamp}/{*path}",
            get(snapshot_file_handler),
        )
        .route("/compare", post(compare_handler))
        .route("/versions/{domain}", get(versions_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .with_state(state);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}
