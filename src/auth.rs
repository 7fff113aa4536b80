use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Proof that the request carried the shared upload token.
///
/// Missing or malformed `Authorization` headers answer 401, a wrong token 403.
#[derive(Debug, Clone, Copy)]
pub struct UploadToken;

#[async_trait]
impl FromRequestParts<AppState> for UploadToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        if !tokens_match(bearer.token(), &state.config.upload_api_token) {
            tracing::warn!("upload rejected: bearer token mismatch");
            return Err(AppError::forbidden());
        }

        Ok(UploadToken)
    }
}

/// Route middleware admitting only requests that carry the upload token.
pub async fn require_upload_token(
    _token: UploadToken,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

// Comparing digests keeps the comparison time independent of where the inputs diverge.
fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
