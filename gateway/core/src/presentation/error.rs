// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API error responses.
//!
//! Every failure leaving the gateway is rendered as
//! `{ "type": ..., "message": ..., "details": ... }`. Responses are rendered
//! without `details`; the [`error_details`] middleware re-renders them with
//! details when the deployment allows it.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::proxy::ProxyError;
use super::state::AppState;
use crate::application::exchange::ExchangeError;
use crate::domain::identity::AuthError;
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn render(&self, expose_details: bool) -> Response {
        let details = if expose_details {
            self.details.clone().unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        let body = Json(json!({
            "type": self.kind,
            "message": self.message,
            "details": details,
        }));

        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render(false);
        if self.details.is_some() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

/// Re-renders error responses with their details when the deployment allows it.
pub async fn error_details(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if !state.expose_error_details {
        return response;
    }
    match response.extensions_mut().remove::<ApiError>() {
        Some(error) => error.render(true),
        None => response,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        // Never carries details
        match err {
            AuthError::MissingCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "MissingCredentials", err.to_string())
            }
            AuthError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "InvalidCredentials", err.to_string())
            }
            AuthError::InsufficientRole { .. } => {
                Self::new(StatusCode::FORBIDDEN, "InsufficientRole", err.to_string())
            }
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        let message = err.to_string();
        match err {
            ExchangeError::EmptyMessage => {
                Self::new(StatusCode::BAD_REQUEST, "EmptyMessage", message)
            }
            ExchangeError::AccessDenied(_) => {
                Self::new(StatusCode::FORBIDDEN, "AccessDenied", message)
            }
            ExchangeError::ChatNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "ChatNotFound", message)
            }
            ExchangeError::NoAgentBound(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "NoAgentBound", message)
            }
            ExchangeError::AgentNotFound(agent) => {
                Self::new(StatusCode::BAD_GATEWAY, "AgentNotFound", message)
                    .with_details(json!({ "agent": agent }))
            }
            ExchangeError::Failed {
                chat_id,
                agent,
                user_message_id,
                source,
            } => {
                let status = if source.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                // The agent error can echo backend output; it only goes in details
                let message = format!("Agent '{}' failed to answer in chat {}", agent, chat_id);
                Self::new(status, "ExchangeFailed", message).with_details(json!({
                    "chat_id": chat_id,
                    "agent": agent,
                    "user_message_id": user_message_id,
                    "cause": source.kind(),
                    "error": source.to_string(),
                }))
            }
            ExchangeError::Persistence(source) => source.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PersistenceError",
                "The request could not be completed",
            )
            .with_details(json!({ "error": other.to_string() })),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        let message = err.to_string();
        match err {
            ProxyError::Upstream { route, reason } => {
                Self::new(StatusCode::BAD_GATEWAY, "UpstreamUnavailable", message)
                    .with_details(json!({ "route": route, "error": reason }))
            }
            ProxyError::Timeout { route } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "UpstreamTimeout", message)
                    .with_details(json!({ "route": route }))
            }
            ProxyError::BodyTooLarge { limit } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", message)
                    .with_details(json!({ "limit_bytes": limit }))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "InvalidBody", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentError;
    use crate::domain::chat::{ChatId, MessageId};
    use crate::domain::identity::RoleTier;
    use std::time::Duration;

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_auth_errors() {
        let response = ApiError::from(AuthError::MissingCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert!(response.extensions().get::<ApiError>().is_none());
        let body = body_json(response).await;
        assert_eq!(body["type"], "MissingCredentials");
        assert_eq!(body["details"], Value::Null);

        let response = ApiError::from(AuthError::InsufficientRole {
            required: RoleTier::Admin,
            held: RoleTier::Common,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_exchange_failure_status() {
        let failed = |source| ExchangeError::Failed {
            chat_id: ChatId(1),
            agent: "agenda".to_string(),
            user_message_id: MessageId(5),
            source,
        };

        let err = ApiError::from(failed(AgentError::Network("refused".into())));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "ExchangeFailed");

        let err = ApiError::from(failed(AgentError::Timeout(Duration::from_secs(1))));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);

        let err = ApiError::from(ExchangeError::NoAgentBound(ChatId(1)));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(ExchangeError::AgentNotFound("ghost".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_details_hidden_by_default() {
        let err = ApiError::from(RepositoryError::Database("connection reset".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = err.clone().into_response();
        assert!(response.extensions().get::<ApiError>().is_some());
        let body = body_json(response).await;
        assert_eq!(body["details"], Value::Null);
        assert!(!body["message"].as_str().unwrap().contains("connection reset"));

        let body = body_json(err.render(true)).await;
        assert_eq!(body["details"]["error"], "Database error: connection reset");
    }
}
