//! Custom error types for the community service
//!
//! Every action returns [`ActionResult`]; the HTTP layer turns the error
//! side into a `{ success: false, message }` body with a matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::response::ServerResponse;
use crate::store::StoreError;

/// Field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Terminal failure states of an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Caller is anonymous or fails the access policy. Never says which.
    #[error("Unauthorized")]
    Unauthorized,

    /// Referenced resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Input failed shape or length constraints
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Request conflicts with current state (e.g. duplicate registration)
    #[error("{0}")]
    Conflict(String),

    /// The store raised an error; the message is forwarded verbatim
    #[error("{0}")]
    Persistence(String),
}

impl ActionError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn invalid(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ActionError::Conflict(_) => StatusCode::CONFLICT,
            ActionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ActionError::NotFound(what),
            StoreError::Conflict(msg) => ActionError::Conflict(msg),
            other => ActionError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body: ServerResponse<()> = ServerResponse::failure(self);
        (status, Json(body)).into_response()
    }
}

/// Type alias for action results
pub type ActionResult<T> = Result<T, ActionError>;
