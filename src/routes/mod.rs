pub mod admin;
pub mod callback_urls;
pub mod payments;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Payment initiation
        .route(
            "/open-banking/{version}/pisp/{resource}",
            post(payments::create),
        )
        .route(
            "/open-banking/{version}/pisp/{resource}/{id}",
            get(payments::get),
        )
        // Event notification callbacks
        .route(
            "/open-banking/{version}/callback-urls",
            get(callback_urls::list).post(callback_urls::create),
        )
        .route(
            "/open-banking/{version}/callback-urls/{id}",
            delete(callback_urls::delete),
        )
}

pub fn admin_routes() -> Router<SharedState> {
    Router::new().route(
        "/admin/submissions/{id}/status",
        put(admin::update_status),
    )
}

/// Non-empty header value as an owned string.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
