use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::{Claims, validate_jwt};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Resolves the caller from a bearer token (header or `?token=`) and stores
/// the claims as a request extension. Rejects with a plain-text 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    if let Some(token) = token {
        match validate_jwt(&token, &state.config.jwt_secret) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                return next.run(req).await;
            }
            Err(e) => tracing::debug!("Rejected bearer token: {}", e),
        }
    }

    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

/// Fails with `Forbidden` unless the caller holds `capability`.
pub fn require_capability(claims: &Claims, capability: &str) -> Result<(), AppError> {
    if claims.has_capability(capability) {
        return Ok(());
    }
    tracing::warn!(
        "User {} lacks capability '{}'",
        claims.sub,
        capability
    );
    Err(AppError::Forbidden(format!(
        "Missing required permission: {}",
        capability
    )))
}
