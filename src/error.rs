use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The `{success, message, data}` wrapper every API response uses.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Envelope {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                log::error!("Failed to serialize response data: {}", e);
                Value::Null
            }
        };
        Envelope {
            data: Some(data),
            ..Envelope::ok(message)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Envelope {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
        }
    }
}

pub type ApiResult = Result<Json<Envelope>, ApiError>;

/// Successful envelope carrying `data`.
pub fn ok(message: &str, data: impl Serialize) -> ApiResult {
    Ok(Json(Envelope::with_data(message, data)))
}

/// Successful envelope without a payload.
pub fn done(message: &str) -> ApiResult {
    Ok(Json(Envelope::ok(message)))
}

/// Field-level validation messages, first message per field wins.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        FieldErrors(BTreeMap::new())
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action".to_string())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotLoggedIn | ApiError::InvalidCredentials => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::TooManyRequests(_) => Status::TooManyRequests,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

/// Model-layer failures are plain strings; they surface as generic internal errors.
impl From<String> for ApiError {
    fn from(detail: String) -> Self {
        ApiError::Internal(detail)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if let ApiError::Internal(ref detail) = self {
            log::error!("{} {} failed: {}", req.method(), req.uri(), detail);
        }
        let status = self.status();
        let message = self.to_string();
        let body = match self {
            ApiError::Validation(errors) => Envelope {
                errors: Some(errors.0),
                ..Envelope::failure(message)
            },
            _ => Envelope::failure(message),
        };
        (status, Json(body)).respond_to(req)
    }
}

/// Decode an action-tagged request body, reporting decode problems as a bad request.
pub fn parse_command<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e)))
}

/// True when a SQLite error string reports a UNIQUE violation.
pub fn is_unique_violation(detail: &str) -> bool {
    detail.contains("UNIQUE constraint failed")
}
