//! User-facing banner messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A short message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A response body carrying a notice next to its payload.
#[derive(Debug, Clone, Serialize)]
pub struct WithNotice<T> {
    pub notice: Notice,
    #[serde(flatten)]
    pub data: T,
}

impl<T> WithNotice<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            notice: Notice::success(message),
            data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_notice_wire_shape() {
        let body = serde_json::to_value(WithNotice::success(
            "Product added successfully",
            json!({ "product": { "name": "Catan" } }),
        ))
        .unwrap();
        assert_eq!(body["notice"]["level"], "success");
        assert_eq!(body["notice"]["message"], "Product added successfully");
        assert_eq!(body["product"]["name"], "Catan");
    }
}
