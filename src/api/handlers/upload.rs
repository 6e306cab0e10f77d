use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::require_capability;
use crate::models::{UploadKind, UploadRequest, UploadResponse};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};

#[utoipa::path(
    post,
    path = "/api/reports/upload",
    request_body(content = Object, description = "`file` (PDF) and optional `folder`", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Report stored", body = UploadResponse),
        (status = 400, description = "Missing file, non-PDF, or storage failure"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing donor.update permission")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    handle_upload(state, claims, multipart, UploadKind::Report).await
}

#[utoipa::path(
    post,
    path = "/api/media/upload",
    request_body(content = Object, description = "`file` (image or PDF) and optional `folder`", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Media stored", body = UploadResponse),
        (status = 400, description = "Missing file, disallowed type, or storage failure"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing donor.update permission")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    handle_upload(state, claims, multipart, UploadKind::Media).await
}

async fn handle_upload(
    state: AppState,
    claims: Claims,
    multipart: Result<Multipart, MultipartRejection>,
    kind: UploadKind,
) -> Result<Json<UploadResponse>, AppError> {
    // Permission is checked before a single byte of the body is read
    require_capability(&claims, kind.required_capability())?;

    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let req = read_upload_form(multipart).await?;

    tracing::info!(
        "📥 {:?} upload by {}: {} ({})",
        kind,
        claims.sub,
        req.filename,
        req.content_type
    );

    let stored = state.upload_service.upload(kind, req).await?;

    Ok(Json(UploadResponse {
        success: true,
        data: stored,
    }))
}

/// Collects the `file` and optional `folder` fields. Other fields are ignored.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut file = None;
    let mut folder = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::BadRequest(
                        "Only one file may be uploaded per request".to_string(),
                    ));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                file = Some((filename, content_type, data));
            }
            "folder" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                folder = Some(value);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    Ok(UploadRequest {
        data,
        filename,
        content_type,
        folder,
    })
}
