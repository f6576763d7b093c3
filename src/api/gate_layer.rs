//! Route gating as axum middleware.

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::{
    gate::{GateDecision, RouteGate},
    session::cookie::{clear_session_cookie, extract_session_token},
};

/// Runs [`RouteGate::evaluate`] for every request; redirects are `307`.
///
/// A rejected credential is cleared in the same response so the login page
/// is reachable again.
pub async fn gate(State(gate): State<RouteGate>, request: Request, next: Next) -> Response {
    let requested = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let credential = extract_session_token(request.headers());

    match gate.evaluate(&requested, credential.as_deref()).await {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(location) => Redirect::temporary(&location).into_response(),
        GateDecision::Reject(location) => (
            AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
            Redirect::temporary(&location),
        )
            .into_response(),
    }
}
