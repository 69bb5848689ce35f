use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not authorized")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Requested quantity exceeds stock, reduce quantity to at most {available}")]
    InsufficientStock { available: i32 },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Payment not completed yet (status: {0})")]
    PaymentNotVerified(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Order is {0}, its status can no longer change")]
    TerminalState(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable discriminant carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::EmptyCart => "empty_cart",
            AppError::PaymentNotVerified(_) => "payment_not_verified",
            AppError::PaymentGateway(_) => "payment_gateway_error",
            AppError::TerminalState(_) => "terminal_state_violation",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::EmptyCart | AppError::PaymentNotVerified(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InsufficientStock { .. } | AppError::TerminalState(_) => StatusCode::CONFLICT,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    kind: &'static str,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Store/collaborator failures get logged with detail but the caller
        // only sees the opaque "Internal Server Error" message.
        match &self {
            AppError::DbError(err) => tracing::error!(error = %err, "database error"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let status = self.status_code();
        let message = self.to_string();

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData {
                kind: self.kind(),
                error: message,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
