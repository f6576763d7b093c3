pub mod health;
pub mod logout;
pub mod session;
pub mod verify;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every non-2xx JSON answer.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::session::{SessionStore, test_support};
    use axum::{Extension, Router};

    /// All session routes wired against an in-memory store.
    pub(crate) fn app(store: SessionStore) -> Router {
        let (router, _openapi) = crate::api::router().split_for_parts();
        router.layer(Extension(store))
    }

    pub(crate) fn store() -> SessionStore {
        test_support::store()
    }
}
