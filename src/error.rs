/*
 * Responsibility
 * - gateway 共通の AppError 定義 (Front Door の終端エラー)
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - credential の失敗理由は body に出さない (ログのみ)
 */
use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_routes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { message: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: requires {required}")]
    Forbidden { required: String },
    #[error("no route for {method} {path}")]
    RouteNotFound {
        method: Method,
        path: String,
        available_routes: Vec<String>,
    },
    #[error("service unavailable: {service}")]
    ServiceUnavailable { service: String },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn forbidden(required: impl Into<String>) -> Self {
        Self::Forbidden {
            required: required.into(),
        }
    }

    pub fn route_not_found(method: Method, path: impl Into<String>, available_routes: Vec<String>) -> Self {
        Self::RouteNotFound {
            method,
            path: path.into(),
            available_routes,
        }
    }

    pub fn service_unavailable(service: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest { message } => ErrorBody {
                code: "BAD_REQUEST",
                message,
                available_routes: None,
                service: None,
            },
            // One message for every credential failure.
            AppError::Unauthorized => ErrorBody {
                code: "UNAUTHORIZED",
                message: "authentication required".into(),
                available_routes: None,
                service: None,
            },
            AppError::Forbidden { required } => ErrorBody {
                code: "FORBIDDEN",
                message: format!("access denied: requires {required}"),
                available_routes: None,
                service: None,
            },
            AppError::RouteNotFound {
                method,
                path,
                available_routes,
            } => ErrorBody {
                code: "NOT_FOUND",
                message: format!("route {method} {path} not found"),
                available_routes: Some(available_routes),
                service: None,
            },
            AppError::ServiceUnavailable { service } => ErrorBody {
                code: "SERVICE_UNAVAILABLE",
                message: "the service is not available at the moment".into(),
                available_routes: None,
                service: Some(service),
            },
            AppError::Internal => ErrorBody {
                code: "INTERNAL_SERVER_ERROR",
                message: "internal server error".into(),
                available_routes: None,
                service: None,
            },
        };

        (status, Json(ErrorResponse { error: body })).into_response()
    }
}
