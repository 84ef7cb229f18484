use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(&self).map_err(|_| fmt::Error)?)
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    AdminKeyNotProvided,
    InvalidAdminKey,
    AdminAccessDisabled,
    SignatureNotProvided,
    InvalidSignature,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl ErrorMessage {
    fn to_str(&self) -> &'static str {
        match self {
            ErrorMessage::AdminKeyNotProvided => "Admin key not provided. Send it in the x-admin-key header",
            ErrorMessage::InvalidAdminKey => "Admin key is invalid",
            ErrorMessage::AdminAccessDisabled => "Admin access is not configured on this server",
            ErrorMessage::SignatureNotProvided => "Missing webhook signature",
            ErrorMessage::InvalidSignature => "Invalid webhook signature",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
