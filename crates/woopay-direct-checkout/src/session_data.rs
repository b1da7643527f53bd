//! Encrypted Session Data
//!
//! Opaque bundle produced by the store and consumed by WooPay. The store
//! answers failures with arbitrary shapes (`{ success: false }`, error strings),
//! so parsing is lenient: anything missing simply leaves the bundle invalid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Encrypted session payload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Session bundle handed to WooPay
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct EncryptedSessionData {
    /// Store site identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blog_id: Option<u64>,

    pub data: SessionPayload,
}

impl EncryptedSessionData {
    pub fn new(
        blog_id: u64,
        session: impl Into<String>,
        iv: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            blog_id: Some(blog_id),
            data: SessionPayload {
                session: Some(session.into()),
                iv: Some(iv.into()),
                hash: Some(hash.into()),
            },
        }
    }

    /// All four fields present and non-empty
    pub fn is_valid(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());

        self.blog_id.is_some_and(|id| id != 0)
            && present(&self.data.session)
            && present(&self.data.iv)
            && present(&self.data.hash)
    }
}

impl From<Value> for EncryptedSessionData {
    fn from(value: Value) -> Self {
        let blog_id = match value.get("blog_id") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        let text = |key: &str| {
            value
                .get("data")
                .and_then(|data| data.get(key))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        Self {
            blog_id,
            data: SessionPayload {
                session: text("session"),
                iv: text("iv"),
                hash: text("hash"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_bundle() {
        let data: EncryptedSessionData = serde_json::from_value(json!({
            "blog_id": 42,
            "data": { "session": "s", "iv": "i", "hash": "h" }
        }))
        .unwrap();
        assert!(data.is_valid());
        assert_eq!(data, EncryptedSessionData::new(42, "s", "i", "h"));
    }

    #[test]
    fn test_numeric_string_blog_id() {
        let data = EncryptedSessionData::from(json!({
            "blog_id": "17",
            "data": { "session": "s", "iv": "i", "hash": "h" }
        }));
        assert_eq!(data.blog_id, Some(17));
        assert!(data.is_valid());
    }

    #[test]
    fn test_missing_or_falsy_fields_invalid() {
        assert!(!EncryptedSessionData::from(json!({ "success": false })).is_valid());
        assert!(!EncryptedSessionData::from(json!({ "success": false, "data": "nonce" })).is_valid());
        assert!(!EncryptedSessionData::from(json!({
            "blog_id": 0,
            "data": { "session": "s", "iv": "i", "hash": "h" }
        }))
        .is_valid());
        assert!(!EncryptedSessionData::from(json!({
            "blog_id": 1,
            "data": { "session": "s", "iv": "", "hash": "h" }
        }))
        .is_valid());
    }

    #[test]
    fn test_serializes_wire_shape() {
        let wire = serde_json::to_value(EncryptedSessionData::new(3, "s", "i", "h")).unwrap();
        assert_eq!(
            wire,
            json!({ "blog_id": 3, "data": { "session": "s", "iv": "i", "hash": "h" } })
        );
    }
}
