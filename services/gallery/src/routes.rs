//! Gallery service routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::HeaderMap,
    middleware::from_fn_with_state,
    response::{
        IntoResponse, Redirect,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{
    access::{AccessRequest, Capability},
    error::{ApiError, ApiResult},
    fanout::session_channel,
    gateway::PhotoGateway,
    ingest::{FileFailure, IngestOptions, UploadFile},
    middleware::{auth_middleware, presented_code, request_origin},
    models::{Actor, Photo, PhotoChanges, PhotoStatus, Session, VariantKind},
    moderation::BatchAction,
    repositories::photo::PhotoListFilter,
    state::AppState,
};

/// Create the router for the gallery service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/sessions/:session_id/photos",
            post(upload_photos).get(list_session_photos),
        )
        .route("/sessions/:session_id/photos/batch", post(batch_moderate))
        .route("/sessions/:session_id/events", get(session_events))
        .route(
            "/photos/:id",
            get(get_photo).put(update_photo).delete(delete_photo),
        )
        .route("/photos/:id/download", get(download_photo))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(state.config.upload.max_request_bytes))
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "gallery-service",
        "database": database,
    }))
}

#[derive(Debug, Deserialize)]
struct AccessQuery {
    #[serde(rename = "accessCode")]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    status: Option<PhotoStatus>,
    /// Comma-separated; photos must carry all of them
    tags: Option<String>,
    /// `asc` or `desc` by created_at, newest first by default
    sort: Option<String>,
    #[serde(rename = "accessCode")]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    size: Option<VariantKind>,
    #[serde(rename = "accessCode")]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdatePhotoRequest {
    tags: Option<Vec<String>>,
    status: Option<PhotoStatus>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    action: BatchAction,
    #[serde(rename = "photoIds")]
    photo_ids: Vec<Uuid>,
    tags: Option<Vec<String>>,
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    uploaded: Vec<Photo>,
    failed: Vec<FileFailure>,
}

#[derive(Serialize)]
struct PhotoListResponse {
    items: Vec<Photo>,
    page: u32,
    limit: u32,
    total: i64,
}

async fn load_session(state: &AppState, id: Uuid) -> ApiResult<Session> {
    state
        .session_repository
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("Session"))
}

/// Run the gate for one request; a denial aborts the request with the
/// decision's reason code.
async fn require(
    state: &AppState,
    actor: &Actor,
    session: &Session,
    capability: Capability,
    headers: &HeaderMap,
    query_code: Option<&str>,
) -> ApiResult<()> {
    let code = presented_code(headers, query_code);
    let origin = request_origin(headers);
    let decision = state
        .gate
        .authorize(
            AccessRequest {
                actor,
                session,
                capability,
                presented_code: code.as_deref(),
            },
            &origin,
        )
        .await;

    if decision.allowed {
        Ok(())
    } else {
        Err(ApiError::Authorization(decision.reason))
    }
}

fn parse_bool_field(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Multipart upload of up to the configured number of files
async fn upload_photos(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let session = load_session(&state, session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::Upload,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    let mut files: Vec<UploadFile> = Vec::new();
    let mut options = IngestOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(filename) = field.file_name().map(str::to_string) {
            if files.len() >= state.config.upload.max_files_per_request {
                return Err(ApiError::Validation(format!(
                    "a request may contain at most {} files",
                    state.config.upload.max_files_per_request
                )));
            }
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("failed to read {filename}: {e}")))?;
            files.push(UploadFile {
                filename,
                mime_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(format!("malformed field {name}: {e}")))?;

        match name.as_str() {
            "tags" => options.tags.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            ),
            "tags[]" => {
                if !value.trim().is_empty() {
                    options.tags.push(value.trim().to_string());
                }
            }
            "watermarkText" => {
                if !value.is_empty() {
                    options.watermark_text = Some(value);
                }
            }
            "autoTag" => options.auto_tag = parse_bool_field(&value),
            "reviewRequired" => options.review_required = parse_bool_field(&value),
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::Validation("no files in upload".to_string()));
    }

    let uploader_id = actor.id.unwrap_or(session.owner_id);
    let outcome = state
        .pipeline
        .ingest_batch(&session, uploader_id, &options, files)
        .await;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(UploadResponse {
            success: outcome.failed.is_empty(),
            uploaded: outcome.uploaded,
            failed: outcome.failed,
        }),
    ))
}

/// Paginated photo listing for a session
async fn list_session_photos(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let session = load_session(&state, session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::View,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    // Only the owner and admins may look past published photos.
    let privileged = actor.is_admin() || actor.owns(&session);
    let status = if privileged {
        query.status
    } else {
        Some(PhotoStatus::Published)
    };

    let filter = PhotoListFilter {
        status,
        tags: query
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(20).clamp(1, 100),
        sort_desc: query.sort.as_deref() != Some("asc"),
    };

    let (items, total) = state
        .photo_repository
        .list(session_id, &filter)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list photos: {}", e);
            ApiError::Persistence(e.to_string())
        })?;

    Ok(Json(PhotoListResponse {
        items,
        page: filter.page,
        limit: filter.limit,
        total,
    }))
}

async fn load_visible_photo(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<(Photo, Session, bool)> {
    let photo = state
        .photo_repository
        .find(id)
        .await?
        .ok_or(ApiError::NotFound("Photo"))?;
    let session = load_session(state, photo.session_id).await?;
    let privileged = actor.is_admin() || actor.owns(&session);

    // Unpublished photos do not exist for ordinary viewers.
    if !privileged && photo.status != PhotoStatus::Published {
        return Err(ApiError::NotFound("Photo"));
    }

    Ok((photo, session, privileged))
}

/// Single photo detail; counts a view for ordinary viewers
async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> ApiResult<impl IntoResponse> {
    let (photo, session, privileged) = load_visible_photo(&state, &actor, id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::View,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    if !privileged {
        state.photo_repository.record_view(photo.id).await?;
    }

    Ok(Json(photo))
}

/// Update tags and/or status of a single photo (owner/admin)
async fn update_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
    Json(payload): Json<UpdatePhotoRequest>,
) -> ApiResult<impl IntoResponse> {
    let photo = state
        .photo_repository
        .find(id)
        .await?
        .ok_or(ApiError::NotFound("Photo"))?;
    let session = load_session(&state, photo.session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::Moderate,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    if payload.tags.is_none() && payload.status.is_none() {
        return Err(ApiError::Validation("no fields to update".to_string()));
    }

    // Status changes go through the moderation workflow so its transition
    // rules and fanout apply; tags are a plain structured update.
    match payload.status {
        Some(PhotoStatus::Published) => {
            state
                .moderation
                .transition(session.id, &[id], BatchAction::Approve, None)
                .await?;
        }
        Some(PhotoStatus::Rejected) => {
            state
                .moderation
                .transition(session.id, &[id], BatchAction::Reject, None)
                .await?;
        }
        Some(PhotoStatus::Pending) => {
            return Err(ApiError::Validation(
                "photos cannot be reverted to pending".to_string(),
            ));
        }
        None => {}
    }

    if let Some(tags) = payload.tags {
        let changes = PhotoChanges {
            tags: Some(tags),
            status: None,
        };
        state.photo_repository.update(id, &changes).await?;
    }

    let updated = state
        .photo_repository
        .find(id)
        .await?
        .ok_or(ApiError::NotFound("Photo"))?;
    Ok(Json(updated))
}

/// Delete one photo and its variants (owner/admin)
async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> ApiResult<impl IntoResponse> {
    let photo = state
        .photo_repository
        .find(id)
        .await?
        .ok_or(ApiError::NotFound("Photo"))?;
    let session = load_session(&state, photo.session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::Moderate,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    let result = state
        .moderation
        .transition(session.id, &[id], BatchAction::Delete, None)
        .await?;

    Ok(Json(json!({
        "success": true,
        "affected": result.affected,
    })))
}

/// Batch moderation and tag operations over a session's photos
async fn batch_moderate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
    Json(payload): Json<BatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = load_session(&state, session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::Moderate,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    if payload.photo_ids.is_empty() {
        return Err(ApiError::Validation("photoIds must not be empty".to_string()));
    }

    let result = state
        .moderation
        .transition(session_id, &payload.photo_ids, payload.action, payload.tags)
        .await?;

    Ok(Json(json!({
        "success": true,
        "affected": result.affected,
    })))
}

/// Redirect to a variant URL; counts a download
async fn download_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<impl IntoResponse> {
    let (photo, session, privileged) = load_visible_photo(&state, &actor, id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::Download,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    let mut size = query.size.unwrap_or(VariantKind::Original);
    // Full-resolution downloads are reserved for the owner and admins.
    if !privileged && size == VariantKind::Original {
        size = VariantKind::Medium;
    }

    let url = photo
        .variant_url(size)
        .ok_or(ApiError::NotFound("Variant"))?;

    state.photo_repository.record_download(photo.id).await?;

    Ok(Redirect::temporary(&url))
}

/// SSE stream of a session's realtime events
async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> ApiResult<impl IntoResponse> {
    let session = load_session(&state, session_id).await?;
    require(
        &state,
        &actor,
        &session,
        Capability::View,
        &headers,
        query.access_code.as_deref(),
    )
    .await?;

    let rx = state.bus.subscribe(&session_channel(session_id));
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        // Lagged receivers drop events; delivery is at-most-once.
        let event = msg.ok()?;
        let sse = Event::default().event(event.name()).json_data(&event).ok()?;
        Some(Ok::<_, Infallible>(sse))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
