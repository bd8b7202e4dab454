use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    dto::SubmissionResponse,
    services::{delete_submission, store_submission, validate_pdf, UploadItem, UploadRejection},
};
use crate::{
    auth::{
        dto::MessageResponse,
        extractors::{Authorized, StaffOnly, StudentOnly},
    },
    error::ApiError,
    state::AppState,
};

/// Headroom over the file limit for multipart framing and the other fields,
/// so a slightly oversize file still reaches validation.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

const PRESIGN_TTL_SECS: u64 = 10 * 60;

pub fn upload_routes(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_bytes.saturating_add(MULTIPART_OVERHEAD)))
}

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/assignments", get(list_assignments))
        .route("/assignments/:id", delete(delete_assignment))
}

/// `/uploads/*key` for object-storage backends: 307 to a short-lived URL.
pub fn presigned_upload_routes() -> Router<AppState> {
    Router::new().route("/uploads/*key", get(redirect_to_blob))
}

impl From<UploadRejection> for ApiError {
    fn from(r: UploadRejection) -> Self {
        ApiError::Validation(r.to_string())
    }
}

/// POST /upload (multipart): `assignmentFile` (or `file`) plus an optional
/// `studentName`, which is ignored in favour of the token's username.
#[instrument(skip(state, auth, mp), fields(user_id = %auth.claims.sub))]
pub async fn upload(
    State(state): State<AppState>,
    auth: Authorized<StudentOnly>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let mut mp = mp.map_err(|e| {
        warn!(error = %e, "upload is not multipart/form-data");
        ApiError::Validation(format!("Expected multipart/form-data: {}", e.body_text()))
    })?;
    let mut file: Option<UploadItem> = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "multipart read failed");
                return Err(multipart_rejection(e.status(), state.config.upload_max_bytes));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "assignmentFile" | "file" => {
                if file.is_some() {
                    warn!("upload carries more than one file");
                    return Err(UploadRejection::Duplicate.into());
                }
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "multipart file read failed");
                    multipart_rejection(e.status(), state.config.upload_max_bytes)
                })?;
                file = Some(UploadItem { body, content_type });
            }
            "studentName" => {
                let claimed = field.text().await.map_err(|e| {
                    warn!(error = %e, "multipart studentName read failed");
                    multipart_rejection(e.status(), state.config.upload_max_bytes)
                })?;
                if claimed.trim() != auth.claims.username {
                    debug!(%claimed, "form studentName differs from token; using token");
                }
            }
            _ => {}
        }
    }

    let item = file.ok_or(UploadRejection::Missing)?;
    validate_pdf(&item, state.config.upload_max_bytes)?;

    let submission = store_submission(&state, &auth.claims.identity(), item)
        .await
        .map_err(ApiError::internal("Failed to upload assignment"))?;

    Ok((StatusCode::CREATED, Json(submission.into())))
}

fn multipart_rejection(status: StatusCode, limit: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        UploadRejection::TooLarge { limit }.into()
    } else {
        ApiError::Validation("Malformed multipart body".into())
    }
}

#[instrument(skip(state, auth), fields(user_id = %auth.claims.sub))]
pub async fn list_assignments(
    State(state): State<AppState>,
    auth: Authorized<StaffOnly>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let rows = state
        .submissions
        .list_all()
        .await
        .map_err(ApiError::internal("Failed to fetch assignments"))?;
    Ok(Json(rows.into_iter().map(SubmissionResponse::from).collect()))
}

/// Unknown and malformed ids are both 404, so a repeated delete is 404.
#[instrument(skip(state, auth), fields(user_id = %auth.claims.sub))]
pub async fn delete_assignment(
    State(state): State<AppState>,
    auth: Authorized<StaffOnly>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let not_found = ApiError::NotFound("Assignment not found");
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(not_found);
    };
    delete_submission(&state, id)
        .await
        .map_err(ApiError::internal("Failed to delete assignment"))?
        .ok_or(not_found)?;
    Ok(Json(MessageResponse {
        message: "Assignment deleted successfully",
    }))
}

#[instrument(skip(state))]
pub async fn redirect_to_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let url = state
        .storage
        .presign_get(&key, PRESIGN_TTL_SECS)
        .await
        .map_err(ApiError::internal("presign failed"))?;
    Ok(Redirect::temporary(&url))
}
