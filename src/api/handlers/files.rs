use crate::AppState;
use crate::api::error::{AppError, PlainError};
use crate::api::middleware::auth::require_capability;
use crate::services::storage::{StorageError, served_content_type};
use crate::utils::auth::{Claims, capabilities};
use crate::utils::validation::validate_relative_path;
use axum::{
    Extension,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

#[utoipa::path(
    get,
    path = "/api/storage/{path}",
    params(
        ("path" = String, Path, description = "Storage path relative to the storage root")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Unsafe path"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing donor.read permission"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Read failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn serve_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(path): Path<String>,
) -> Result<Response, PlainError> {
    require_capability(&claims, capabilities::DONOR_READ)?;

    // Textual check first: a rejected path never reaches the filesystem
    validate_relative_path(&path).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let exists = state.storage.exists(&path).await.map_err(read_error)?;
    if !exists {
        return Err(AppError::NotFound("File not found".to_string()).into());
    }

    let data = state.storage.read(&path).await.map_err(read_error)?;

    let filename = path.rsplit('/').next().unwrap_or(&path);
    tracing::info!("📤 Serving {} ({} bytes) to {}", path, data.len(), claims.sub);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, served_content_type(&path))
        .header(header::CONTENT_DISPOSITION, inline_disposition(filename))
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()).into())
}

/// Read-side failures: unsafe paths stay 400, missing stays 404, everything else is a 500.
fn read_error(err: StorageError) -> PlainError {
    match err {
        StorageError::InvalidPath(_) | StorageError::NotFound(_) => AppError::from(err).into(),
        other => AppError::Internal(format!("Failed to read stored file: {}", other)).into(),
    }
}

fn inline_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    if fallback_filename == filename {
        return format!("inline; filename=\"{}\"", filename);
    }

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}
