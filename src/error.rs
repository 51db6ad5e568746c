use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request, State,
    },
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::config::Environment;

/// Errors surfaced by handlers and services.
///
/// Every variant except `Internal` is operational: its message is meant for
/// the client. `Internal` is masked to a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    pub fn internal_code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_FAILED",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn into_payload(self) -> ErrorPayload {
        let status = self.status();
        let internal_code = Some(self.internal_code());
        match self {
            AppError::Internal(e) => ErrorPayload {
                status,
                message: "Internal Server Error".into(),
                internal_code,
                details: None,
                stack: Some(format!("{e:?}")),
            },
            AppError::Validation { message, details } => ErrorPayload {
                status,
                message,
                internal_code,
                details,
                stack: None,
            },
            AppError::Unauthenticated(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message) => ErrorPayload {
                status,
                message,
                internal_code,
                details: None,
                stack: None,
            },
        }
    }
}

/// Extractor rejections become 400s so they share the error envelope.
fn rejection(kind: &'static str, status: StatusCode, text: String) -> AppError {
    AppError::Validation {
        message: text,
        details: Some(serde_json::json!({ "source": kind, "rejectedWith": status.as_u16() })),
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        rejection("body", r.status(), r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        rejection("path", r.status(), r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        rejection("query", r.status(), r.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_operational() {
            warn!(status = %self.status(), error = %self, "request failed");
        } else {
            error!(error = ?self, "unexpected error");
        }
        let payload = self.into_payload();
        // Rendered without request context; `error_envelope` re-renders it
        // with path and method when the middleware is installed.
        let mut res = payload.render(&Method::GET, "", Environment::Production);
        res.extensions_mut().insert(payload);
        res
    }
}

/// Error data carried through response extensions until the envelope
/// middleware knows the request path and method.
#[derive(Debug, Clone)]
pub struct ErrorPayload {
    pub status: StatusCode,
    pub message: String,
    pub internal_code: Option<&'static str>,
    pub details: Option<Value>,
    pub stack: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    message: &'a str,
    status: u16,
    instance: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

impl ErrorPayload {
    pub fn render(&self, method: &Method, instance: &str, env: Environment) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: &self.message,
                status: self.status.as_u16(),
                instance,
                method: method.as_str(),
                internal_code: self.internal_code,
                details: self.details.as_ref(),
                stack: if env.is_development() {
                    self.stack.as_deref()
                } else {
                    None
                },
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Completes error responses with `instance` and `method`.
pub async fn error_envelope(State(env): State<Environment>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let instance = req.uri().path().to_owned();
    let mut res = next.run(req).await;
    match res.extensions_mut().remove::<ErrorPayload>() {
        Some(payload) => payload.render(&method, &instance, env),
        None => res,
    }
}
