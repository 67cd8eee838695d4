// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP router.
//
// Middleware order, outermost first:
//   TraceLayer -> panic catcher -> error details -> authentication -> reverse proxy -> local routes
//
// Local routes declare their minimum tier next to their definitions.

use axum::{
    http::{StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use super::auth::{authenticate, require_tier};
use super::error::{error_details, ApiError};
use super::handlers::{agents, chats, exchange, health};
use super::proxy::reverse_proxy;
use super::state::AppState;
use crate::domain::identity::RoleTier;

pub fn app(state: Arc<AppState>) -> Router {
    let policy = state.policy;

    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/health/ping", get(health::ping_handler))
        .route("/api/health/service_health", get(health::service_health_handler));

    let private = Router::new()
        .route(
            "/api/v1/chats",
            get(chats::list_chats_handler).post(chats::create_chat_handler),
        )
        .route(
            "/api/v1/chats/{chat_id}",
            get(chats::get_chat_handler)
                .put(chats::update_chat_handler)
                .delete(chats::delete_chat_handler),
        )
        .route(
            "/api/v1/chats/{chat_id}/messages",
            get(chats::list_messages_handler).post(chats::create_message_handler),
        )
        .route(
            "/api/v1/chats/{chat_id}/messages/{message_id}",
            get(chats::get_message_handler)
                .put(chats::update_message_handler)
                .delete(chats::delete_message_handler),
        )
        .route_layer(from_fn_with_state((policy, RoleTier::Private), require_tier));

    let common = Router::new()
        .route(
            "/api/v1/chats/{chat_id}/exchange",
            post(exchange::exchange_handler),
        )
        .route("/api/v1/agents", get(agents::list_agents_handler))
        .route_layer(from_fn_with_state((policy, RoleTier::Common), require_tier));

    let staff = Router::new()
        .route("/api/v1/agents/health", get(agents::agents_health_handler))
        .route_layer(from_fn_with_state((policy, RoleTier::Staff), require_tier));

    Router::new()
        .merge(public)
        .merge(private)
        .merge(common)
        .merge(staff)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(from_fn_with_state(state.clone(), error_details))
                .layer(from_fn_with_state(state.clone(), authenticate))
                .layer(from_fn_with_state(state.clone(), reverse_proxy)),
        )
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {}", reason);
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "InternalError",
        "Internal server error",
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("handler bug")
    }

    #[tokio::test]
    async fn test_panicking_handler_renders_json_error() {
        let router = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = router
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["type"], "InternalError");
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["details"], Value::Null);
    }
}
