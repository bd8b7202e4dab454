use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::{claims::Role, jwt::TokenError};

/// Every failure a handler can answer with. Rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Access token required")]
    AuthenticationRequired,

    #[error("Invalid token")]
    InvalidToken(#[source] TokenError),

    #[error("Access denied")]
    AccessDenied {
        role: Role,
        required: &'static [Role],
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Users already exist")]
    UsersExist,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}")]
    Internal {
        message: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    /// For `map_err`: keeps `cause` for the log, shows only `message`.
    pub fn internal<E>(message: &'static str) -> impl FnOnce(E) -> ApiError
    where
        E: Into<anyhow::Error>,
    {
        move |e| ApiError::Internal {
            message,
            cause: e.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidToken(_) | ApiError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::UsersExist => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::AccessDenied { role, required } => {
                warn!(%role, ?required, "role not permitted");
                json!({ "error": self.to_string(), "role": role, "required": required })
            }
            ApiError::InvalidToken(reason) => {
                warn!(%reason, "token rejected");
                json!({ "error": self.to_string() })
            }
            ApiError::Internal { message, cause } => {
                error!(error = ?cause, "{message}");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn expired_and_malformed_tokens_answer_identically() {
        let (s1, b1) = body_json(ApiError::InvalidToken(TokenError::Expired)).await;
        let (s2, b2) = body_json(ApiError::InvalidToken(TokenError::BadSignature)).await;
        assert_eq!(s1, StatusCode::FORBIDDEN);
        assert_eq!(s1, s2);
        assert_eq!(b1, b2);
        assert_eq!(b1["error"], "Invalid token");
    }

    #[tokio::test]
    async fn access_denied_discloses_role_and_required_set() {
        let (status, body) = body_json(ApiError::AccessDenied {
            role: Role::Student,
            required: &[Role::Staff],
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["role"], "student");
        assert_eq!(body["required"], serde_json::json!(["staff"]));
    }

    #[tokio::test]
    async fn internal_hides_source() {
        let err = ApiError::internal("Failed to fetch assignments")(anyhow::anyhow!(
            "connection refused to 10.0.0.5"
        ));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Failed to fetch assignments" }));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::AuthenticationRequired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::UsersExist.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x").status_code(), StatusCode::NOT_FOUND);
    }
}
