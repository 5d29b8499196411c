//! The response envelope every action is reported in.

use serde::Serialize;

use crate::error::{ActionError, ActionResult, FieldError};

/// `{ success: true, message?, data } | { success: false, message, errors? }`
#[derive(Debug, Clone, Serialize)]
pub struct ServerResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ServerResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(err: ActionError) -> Self {
        let message = err.to_string();
        let errors = match err {
            ActionError::Validation(errors) => errors,
            _ => Vec::new(),
        };
        Self {
            success: false,
            message: Some(message),
            data: None,
            errors,
        }
    }
}

impl<T> From<ActionResult<T>> for ServerResponse<T> {
    fn from(result: ActionResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let body = serde_json::to_value(ServerResponse::ok(vec![7])).unwrap();
        assert_eq!(body, json!({ "success": true, "data": [7] }));
    }

    #[test]
    fn test_unit_success_serializes_null_data() {
        let body = serde_json::to_value(ServerResponse::from(Ok::<(), ActionError>(()))).unwrap();
        assert_eq!(body, json!({ "success": true, "data": null }));
    }

    #[test]
    fn test_unauthorized_shape() {
        let response: ServerResponse<()> = Err(ActionError::Unauthorized).into();
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "Unauthorized" }));
    }

    #[test]
    fn test_validation_carries_field_errors() {
        let response: ServerResponse<()> =
            Err(ActionError::invalid("content", "Content is required")).into();
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["field"], "content");
    }
}
