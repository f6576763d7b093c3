//! Session issuance: identity token in, `session` cookie out.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use super::ErrorResponse;
use crate::session::{SessionError, SessionStore, cookie::session_cookie};

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct IssueResponse {
    pub success: bool,
    pub uid: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/session",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Session issued, `session` cookie set", body = IssueResponse),
        (status = 400, description = "Missing identity token", body = ErrorResponse),
        (status = 401, description = "Identity token rejected", body = ErrorResponse),
        (status = 503, description = "Identity authority unavailable", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn issue(
    store: Extension<SessionStore>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Response {
    // A body that does not parse carries no token either.
    let request = payload.map(|Json(request)| request).unwrap_or_else(|rejection| {
        warn!("Unreadable session request: {rejection}");
        IssueRequest::default()
    });
    let id_token = request.id_token.unwrap_or_default();

    match store.issue(&id_token).await {
        Ok(issued) => {
            let cookie = match session_cookie(issued.credential.as_str(), store.ttl()) {
                Ok(cookie) => cookie,
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            let body = IssueResponse {
                success: true,
                uid: issued.claims.uid,
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(SessionError::MissingToken) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing idToken")),
        )
            .into_response(),
        Err(SessionError::CredentialInvalid) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid idToken")),
        )
            .into_response(),
        Err(SessionError::IdentityUnavailable(reason)) => {
            error!("Identity authority unavailable: {reason}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Identity authority unavailable")),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to issue session: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create session")),
            )
                .into_response()
        }
    }
}
