use crate::{gate::RouteGate, session::SessionStore};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::from_fn_with_state,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod gate_layer;
pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Documented routes plus page gating, request ids and tracing.
///
/// Page routes are not served here: anything the gate lets through that is not
/// an API route falls back to `404`.
#[must_use]
pub fn app(store: SessionStore, gate: RouteGate) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router
        .fallback(not_found)
        .layer(from_fn_with_state(gate, gate_layer::gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(store)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, store: SessionStore, gate: RouteGate) -> Result<()> {
    let app = app(store, gate);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gate::{RoutePolicy, StoreVerifier},
        session::test_support,
    };
    use anyhow::Result;
    use axum::http::header::LOCATION;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn full_app() -> (SessionStore, Router) {
        let store = test_support::store();
        let gate = RouteGate::new(
            RoutePolicy::default(),
            Arc::new(StoreVerifier::new(store.clone())),
        );
        (store.clone(), app(store, gate))
    }

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() -> Result<()> {
        let (_, app) = full_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        assert!(request_id.is_some_and(|id| Ulid::from_string(&id).is_ok()));
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_then_navigate_then_logout() -> Result<()> {
        let (store, app) = full_app();
        let issued = store.issue("id:jo").await?;
        let cookie = format!("session={}", issued.credential.as_str());

        let page = |cookie: Option<String>| -> Result<Request<Body>> {
            let mut builder = Request::builder().uri("/dashboard");
            if let Some(cookie) = cookie {
                builder = builder.header("Cookie", cookie);
            }
            Ok(builder.body(Body::empty())?)
        };

        let response = app.clone().oneshot(page(Some(cookie.clone()))?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "allowed through to the fallback");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/logout")
                    .header("Cookie", cookie.clone())
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(page(Some(cookie))?).await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/login?redirect=%2Fdashboard")
        );
        Ok(())
    }
}
