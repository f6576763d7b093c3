use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::session::{SessionStore, cookie::extract_session_token};

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// `null` when the identity carries no email.
    pub email: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, description = "Session is valid", body = VerifyResponse),
        (status = 401, description = "Missing, expired, revoked or malformed session", body = VerifyResponse)
    ),
    tag = "session"
)]
pub async fn verify(headers: HeaderMap, store: Extension<SessionStore>) -> Response {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse {
                valid: false,
                uid: None,
                email: None,
            }),
        )
            .into_response()
    };

    let Some(token) = extract_session_token(&headers) else {
        return invalid();
    };

    // Every failure, including an unreadable revocation store, denies.
    match store.verify(&token).await {
        Ok(claims) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                uid: Some(claims.uid),
                email: claims.email,
            }),
        )
            .into_response(),
        Err(err) => {
            debug!("Session verification failed: {err}");
            invalid()
        }
    }
}
