use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use anyhow::Error;
use serde::Serialize;
use std::fmt::{Display, Formatter};

use crate::gateway::GatewayError;

#[derive(Debug, Clone, PartialEq)]
pub enum AppErrorType {
    NotFoundError,
    InvalidFormatError,
    DuplicatePendingError,
    DuplicateAccountError,
    AlreadyProcessedError,
    ExpiredError,
    NoCopiesError,
    PermissionError,
    GatewayError,
    AuthError,
    PayloadValidationError,
    JsonParseError,
    HashingFailed,
    InternalServerError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: Option<String>,
    pub cause: Option<String>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    pub fn message(&self) -> String {
        match self {
            AppError {
                message: Some(message),
                ..
            } => message.clone(),

            AppError {
                message: None,
                error_type: AppErrorType::NotFoundError,
                ..
            } => "The requested item was not found".to_string(),
            AppError {
                message: None,
                error_type: AppErrorType::GatewayError,
                ..
            } => "The library service is unavailable, please try again".to_string(),
            _ => "An unexpected error has occurred".to_string(),
        }
    }

    fn with_message(error_type: AppErrorType, message: impl ToString) -> AppError {
        AppError {
            cause: None,
            error_type,
            message: Some(message.to_string()),
        }
    }

    pub fn not_found(message: impl ToString) -> AppError {
        Self::with_message(AppErrorType::NotFoundError, message)
    }

    pub fn invalid_format(message: impl ToString) -> AppError {
        Self::with_message(AppErrorType::InvalidFormatError, message)
    }

    pub fn duplicate_pending() -> AppError {
        Self::with_message(
            AppErrorType::DuplicatePendingError,
            "You already have a pending request for this thesis",
        )
    }

    pub fn duplicate_account(message: impl ToString) -> AppError {
        Self::with_message(AppErrorType::DuplicateAccountError, message)
    }

    pub fn already_processed() -> AppError {
        Self::with_message(
            AppErrorType::AlreadyProcessedError,
            "Transaction already processed",
        )
    }

    pub fn expired() -> AppError {
        Self::with_message(AppErrorType::ExpiredError, "QR code expired")
    }

    pub fn no_copies() -> AppError {
        Self::with_message(AppErrorType::NoCopiesError, "No copies available")
    }

    pub fn permission_denied(message: impl ToString) -> AppError {
        Self::with_message(AppErrorType::PermissionError, message)
    }

    pub fn unauthorized(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::AuthError,
            message: Some(error.to_string()),
        }
    }

    pub fn validation_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::PayloadValidationError,
            message: Some(error.to_string()),
        }
    }

    pub fn gateway_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::GatewayError,
            message: None,
        }
    }

    pub fn internal_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::InternalServerError,
            message: Some(error.to_string()),
        }
    }

    pub fn is(&self, error_type: AppErrorType) -> bool {
        self.error_type == error_type
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: Error) -> Self {
        AppError {
            message: None,
            cause: Some(error.to_string()),
            error_type: AppErrorType::InternalServerError,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        AppError::gateway_error(error)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError {
            cause: Some(error.to_string()),
            message: Some(format!("Failed to decode backend row: {}", error)),
            error_type: AppErrorType::JsonParseError,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::internal_error(error)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::validation_error(errors)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.message())
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::AuthError => StatusCode::UNAUTHORIZED,
            AppErrorType::PermissionError => StatusCode::FORBIDDEN,
            AppErrorType::NotFoundError => StatusCode::NOT_FOUND,
            AppErrorType::InvalidFormatError | AppErrorType::PayloadValidationError => {
                StatusCode::BAD_REQUEST
            }
            AppErrorType::DuplicatePendingError
            | AppErrorType::DuplicateAccountError
            | AppErrorType::AlreadyProcessedError => StatusCode::CONFLICT,
            AppErrorType::ExpiredError => StatusCode::GONE,
            AppErrorType::NoCopiesError => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorType::GatewayError | AppErrorType::HashingFailed => StatusCode::BAD_GATEWAY,
            AppErrorType::JsonParseError | AppErrorType::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(AppErrorResponse {
            success: false,
            message: self.message(),
        })
    }
}

#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> AppSuccessResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }
}
