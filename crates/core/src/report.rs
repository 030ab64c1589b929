//! Report payload model and the persisted shape of a queued submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::id::{ErrorCodeId, LineId, ReportId, UserId};

/// Normalized error-code reference.
///
/// Older captures carried error codes in several shapes (a bare code string,
/// an object with or without description). [`ErrorCodeRef::from_value`] is
/// the single point where those shapes are upgraded or rejected; everything
/// downstream of it, including the persisted queue, is uniform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodeRef {
    pub id: ErrorCodeId,
    pub code: String,
    pub description: String,
}

impl ErrorCodeRef {
    pub fn new(id: ErrorCodeId, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            description: description.into(),
        }
    }

    /// Upgrade a loosely-shaped error-code value into the normalized form.
    ///
    /// Accepts the object shape (`{id, code?, description?}`); missing text
    /// fields default to empty. A bare string is rejected: the backend keys
    /// error codes by numeric id, so a code without one cannot be delivered
    /// and must be resolved against `/ErrorCodes` first.
    pub fn from_value(value: &Value) -> DomainResult<Self> {
        match value {
            Value::Object(map) => {
                let id = map
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        DomainError::validation("error code object is missing a numeric id")
                    })?;
                let code = map
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let description = map
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Self {
                    id: ErrorCodeId::new(id),
                    code,
                    description,
                })
            }
            Value::String(code) => Err(DomainError::validation(format!(
                "bare error code '{code}' carries no backend id"
            ))),
            other => Err(DomainError::validation(format!(
                "unsupported error code shape: {other}"
            ))),
        }
    }
}

/// Reference to a report photo: either a file still on the device or a URL
/// the backend already hosts.
///
/// Persisted and transported as a plain string; classification happens once,
/// at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhotoRef {
    /// Local file URI (camera capture not yet uploaded).
    Local(String),
    /// Backend-hosted URL.
    Remote(String),
}

impl PhotoRef {
    pub fn parse(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Remote(s)
        } else {
            Self::Local(s)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Local(s) | Self::Remote(s) => s,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<String> for PhotoRef {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}

impl From<PhotoRef> for String {
    fn from(value: PhotoRef) -> Self {
        match value {
            PhotoRef::Local(s) | PhotoRef::Remote(s) => s,
        }
    }
}

/// A report as captured by the UI, before the queue enriches it with
/// identity and timing.
///
/// `line_number` is the human-readable station label shown on the report;
/// `line_id` is the backend key for the same line, resolved by the UI (via
/// `GET /Lines`) before the draft reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub barcode: String,
    pub product_type: String,
    pub line_number: String,
    pub line_id: LineId,
    pub error_code: ErrorCodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub photos: Vec<PhotoRef>,
}

impl ReportDraft {
    /// Attach the submitting user's identity, producing the payload shape
    /// the queue persists.
    pub fn with_user(self, user_id: UserId) -> ReportPayload {
        ReportPayload {
            barcode: self.barcode,
            product_type: self.product_type,
            line_number: self.line_number,
            line_id: self.line_id,
            error_code: self.error_code,
            note: self.note,
            photos: self.photos,
            user_id,
        }
    }
}

/// The domain submission as persisted in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub barcode: String,
    pub product_type: String,
    pub line_number: String,
    pub line_id: LineId,
    pub error_code: ErrorCodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub photos: Vec<PhotoRef>,
    pub user_id: UserId,
}

/// A durable queue record: one undelivered submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedReport {
    pub id: ReportId,
    pub payload: ReportPayload,
    /// Enqueue time, not delivery time. Preserved through eventual delivery
    /// so the delivered record's creation time reflects original intent.
    #[serde(rename = "createdAtISO")]
    pub created_at: DateTime<Utc>,
}

impl QueuedReport {
    /// Wrap a payload into a fresh queue record (new id, enqueue timestamp).
    pub fn new(payload: ReportPayload) -> Self {
        Self {
            id: ReportId::new(),
            payload,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_payload() -> ReportPayload {
        ReportPayload {
            barcode: "8690000000017".to_string(),
            product_type: "PumpHousing".to_string(),
            line_number: "Line 3".to_string(),
            line_id: LineId::new(3),
            error_code: ErrorCodeRef::new(ErrorCodeId::new(12), "E-12", "scratched surface"),
            note: Some("left flange".to_string()),
            photos: vec![
                PhotoRef::parse("file:///data/photos/a.jpg"),
                PhotoRef::parse("https://cdn.example.com/b.jpg"),
            ],
            user_id: UserId::new(2),
        }
    }

    #[test]
    fn photo_ref_classifies_local_and_remote() {
        assert!(PhotoRef::parse("file:///tmp/x.jpg").is_local());
        assert!(PhotoRef::parse("content://media/17").is_local());
        assert!(PhotoRef::parse("https://host/x.jpg").is_remote());
        assert!(PhotoRef::parse("http://host/x.jpg").is_remote());
    }

    #[test]
    fn photo_ref_round_trips_as_plain_string() {
        let refs = vec![
            PhotoRef::parse("file:///tmp/x.jpg"),
            PhotoRef::parse("https://host/x.jpg"),
        ];
        let encoded = serde_json::to_string(&refs).unwrap();
        assert_eq!(encoded, r#"["file:///tmp/x.jpg","https://host/x.jpg"]"#);
        let decoded: Vec<PhotoRef> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, refs);
    }

    #[test]
    fn error_code_from_object_value() {
        let value = json!({"id": 12, "code": "E-12", "description": "scratched"});
        let ec = ErrorCodeRef::from_value(&value).unwrap();
        assert_eq!(ec.id, ErrorCodeId::new(12));
        assert_eq!(ec.code, "E-12");
        assert_eq!(ec.description, "scratched");
    }

    #[test]
    fn error_code_defaults_missing_text_fields() {
        let value = json!({"id": 7});
        let ec = ErrorCodeRef::from_value(&value).unwrap();
        assert_eq!(ec.id, ErrorCodeId::new(7));
        assert_eq!(ec.code, "");
        assert_eq!(ec.description, "");
    }

    #[test]
    fn error_code_rejects_bare_string_and_missing_id() {
        assert!(ErrorCodeRef::from_value(&json!("E-12")).is_err());
        assert!(ErrorCodeRef::from_value(&json!({"code": "E-12"})).is_err());
        assert!(ErrorCodeRef::from_value(&json!(42)).is_err());
    }

    #[test]
    fn queued_report_persisted_field_names() {
        let report = QueuedReport::new(test_payload());
        let value = serde_json::to_value(&report).unwrap();

        assert!(value.get("id").is_some());
        assert!(value.get("createdAtISO").is_some());

        let payload = value.get("payload").unwrap();
        for key in [
            "barcode",
            "productType",
            "lineNumber",
            "lineId",
            "errorCode",
            "note",
            "photos",
            "userId",
        ] {
            assert!(payload.get(key).is_some(), "missing payload key {key}");
        }
        assert_eq!(
            payload["photos"][0],
            json!("file:///data/photos/a.jpg"),
            "photos persist as plain strings"
        );
    }

    #[test]
    fn queued_report_round_trips() {
        let report = QueuedReport::new(test_payload());
        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: QueuedReport = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn with_user_keeps_draft_fields() {
        let draft = ReportDraft {
            barcode: "123".to_string(),
            product_type: "Valve".to_string(),
            line_number: "Line 1".to_string(),
            line_id: LineId::new(1),
            error_code: ErrorCodeRef::new(ErrorCodeId::new(3), "E-3", "dent"),
            note: None,
            photos: vec![],
        };
        let payload = draft.clone().with_user(UserId::new(1));
        assert_eq!(payload.barcode, draft.barcode);
        assert_eq!(payload.line_id, draft.line_id);
        assert_eq!(payload.user_id, UserId::new(1));
    }
}
