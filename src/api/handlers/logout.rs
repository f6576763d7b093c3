use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::session::{
    SessionStore,
    cookie::{clear_session_cookie, extract_session_token},
};

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LogoutResponse {
    pub success: bool,
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = LogoutResponse)
    ),
    tag = "session"
)]
pub async fn logout(headers: HeaderMap, store: Extension<SessionStore>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        // Revocation is best effort; the subject is only known for a valid credential.
        match store.verify(&token).await {
            Ok(claims) => match store.revoke(&claims.uid).await {
                Ok(()) => info!(uid = %claims.uid, "Logged out"),
                Err(err) => error!("Failed to revoke session: {err}"),
            },
            Err(err) => debug!("Logout without a valid session: {err}"),
        }
    }

    // Always clear the cookie, even if revocation failed.
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie());
    (
        StatusCode::OK,
        response_headers,
        Json(LogoutResponse { success: true }),
    )
}
