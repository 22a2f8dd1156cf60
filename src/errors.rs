// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AppError {
    #[error("phone and amount are required")]
    MissingFields,

    #[error("Phone number must contain only digits")]
    PhoneNotNumeric,

    #[error("Invalid Phone Number")]
    InvalidPhone,

    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Failed to get access token")]
    TokenRetrieval,

    #[error("Failed to create request")]
    RequestBuild,

    #[error("Failed to send request")]
    RequestSend,

    #[error("Failed to read response body")]
    ResponseRead,

    #[error("Failed to unmarshal response")]
    ResponseDecode,

    #[error("Invalid JSON")]
    InvalidJson,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields
            | AppError::PhoneNotNumeric
            | AppError::InvalidPhone
            | AppError::InvalidAmount
            | AppError::InvalidJson => StatusCode::BAD_REQUEST,
            AppError::TokenRetrieval
            | AppError::RequestBuild
            | AppError::RequestSend
            | AppError::ResponseRead
            | AppError::ResponseDecode => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Required-fields rejections use "message", everything else "error".
        let body = match self {
            AppError::MissingFields => json!({ "message": self.to_string() }),
            _ => json!({ "error": self.to_string() }),
        };

        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
