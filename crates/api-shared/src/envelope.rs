//! JSON response envelope.
//!
//! Every REST response body has the shape:
//!
//! ```json
//! { "success": true, "data": { ... }, "message": "optional" }
//! { "success": false, "error": "what went wrong" }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// A successful response carrying `data` and a human-readable note.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    /// A failed response.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_omits_error_fields() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn test_error_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error("Missing required fields: firstName"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Missing required fields: firstName" })
        );
    }

    #[test]
    fn test_message_is_carried() {
        let res = ApiResponse::ok_with_message("x", "Referral submitted");
        assert!(res.success);
        assert_eq!(res.message.as_deref(), Some("Referral submitted"));
    }
}
