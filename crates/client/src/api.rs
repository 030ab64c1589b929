//! Wire adapter for the backend forms API.
//!
//! Two delivery variants exist: a single multipart request carrying form
//! fields plus binary photo attachments, and a two-phase flow that first
//! uploads photos (`POST /PhotoUpload`, base64) to obtain hosted URLs and
//! then submits the form as JSON referencing them. The read endpoints used
//! by the surrounding UI (`/Forms`, `/Lines`, `/ErrorCodes`) live here too.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use linereport_core::{ErrorCodeId, LineId, PhotoRef, QueuedReport};

use crate::config::ClientConfig;

/// Delivery failure taxonomy for one submission attempt.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("photo error: {0}")]
    Photo(String),
}

/// Remote submission seam: converts one queued report into a backend form.
///
/// The flush coordinator treats any error as "not delivered"; an attempt
/// either fully succeeds (server record returned) or fully fails.
#[async_trait]
pub trait ReportSubmitter: Send + Sync {
    async fn submit(&self, report: &QueuedReport) -> Result<FormDto, SubmitError>;
}

/// Production line as served by `GET /Lines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Defect error code as served by `GET /ErrorCodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodeDto {
    pub id: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Hosted photo attached to a form record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDto {
    pub id: i64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    pub form_id: i64,
}

/// Server-side form record: the canonical delivered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDto {
    pub id: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub form_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product_error: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_code_id: Option<i64>,
    #[serde(default)]
    pub error_code: Option<ErrorCodeDto>,
    #[serde(default)]
    pub line_id: Option<i64>,
    #[serde(default)]
    pub line: Option<LineDto>,
    #[serde(default)]
    pub photos: Option<Vec<PhotoDto>>,
    #[serde(default)]
    pub form_date: Option<String>,
}

/// Form-creation payload (`POST /Forms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateForm {
    pub code: String,
    #[serde(rename = "type")]
    pub form_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_error: Option<String>,
    pub quantity: i64,
    pub error_code_id: ErrorCodeId,
    pub line_id: LineId,
    /// Original enqueue time. Keeps the delivered record's creation time
    /// honest when delivery happens long after capture.
    pub form_date: DateTime<Utc>,
    /// Hosted photo URLs (two-phase variant); empty for multipart delivery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<String>,
}

impl CreateForm {
    /// Map a queued report onto the backend's form fields.
    pub fn from_queued(report: &QueuedReport) -> Self {
        let payload = &report.payload;
        Self {
            code: payload.barcode.clone(),
            form_type: payload.product_type.clone(),
            name: payload.product_type.clone(),
            product_error: payload.note.clone(),
            quantity: 1,
            error_code_id: payload.error_code.id,
            line_id: payload.line_id,
            form_date: report.created_at,
            photos: Vec::new(),
        }
    }
}

/// `POST /PhotoUpload` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadRequest {
    pub serial_number: String,
    pub base64_images: Vec<String>,
    pub length_unit: String,
}

/// `POST /PhotoUpload` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_paths: Option<Vec<String>>,
    #[serde(default)]
    pub upload_id: Option<String>,
}

/// HTTP client for the backend forms API.
pub struct ApiClient {
    api_url: String,
    token: Option<String>,
    client: reqwest::Client,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::build(config, None)
    }

    /// Client carrying a bearer credential (supplied by the auth
    /// collaborator).
    pub fn with_token(config: &ClientConfig, token: impl Into<String>) -> Self {
        Self::build(config, Some(token.into()))
    }

    fn build(config: &ClientConfig, token: Option<String>) -> Self {
        Self {
            api_url: config.api_url.clone(),
            token,
            client: reqwest::Client::new(),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
        }
    }

    fn request(&self, method: Method, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self.client.request(method, url).timeout(timeout);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, SubmitError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SubmitError::Api(status, body));
        }
        resp.json().await.map_err(|e| SubmitError::Parse(e.to_string()))
    }

    /// Single-request variant: multipart form fields plus binary `photos`
    /// parts read from local file URIs.
    pub async fn create_form_multipart(
        &self,
        form: &CreateForm,
        photos: &[PhotoRef],
    ) -> Result<FormDto, SubmitError> {
        let mut multipart = reqwest::multipart::Form::new()
            .text("code", form.code.clone())
            .text("type", form.form_type.clone())
            .text("name", form.name.clone())
            .text("quantity", form.quantity.to_string())
            .text("errorCodeId", form.error_code_id.to_string())
            .text("lineId", form.line_id.to_string())
            .text("formDate", form.form_date.to_rfc3339());
        if let Some(note) = &form.product_error {
            multipart = multipart.text("productError", note.clone());
        }
        for photo in photos {
            multipart = multipart.part("photos", photo_part(photo).await?);
        }

        let resp = self
            .request(Method::POST, "/Forms", self.upload_timeout)
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// JSON variant: form referencing already-hosted photo URLs.
    pub async fn create_form(&self, form: &CreateForm) -> Result<FormDto, SubmitError> {
        let resp = self
            .request(Method::POST, "/Forms", self.request_timeout)
            .json(form)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// First phase of the two-phase variant: upload local photos as base64,
    /// returning their hosted paths.
    pub async fn upload_photos(
        &self,
        serial_number: &str,
        photos: &[PhotoRef],
    ) -> Result<Vec<String>, SubmitError> {
        let mut base64_images = Vec::with_capacity(photos.len());
        for photo in photos {
            let bytes = read_photo_bytes(photo).await?;
            base64_images.push(BASE64.encode(bytes));
        }

        let body = PhotoUploadRequest {
            serial_number: serial_number.to_string(),
            base64_images,
            length_unit: "mm".to_string(),
        };

        let resp = self
            .request(Method::POST, "/PhotoUpload", self.upload_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        let uploaded: PhotoUploadResponse = Self::read_json(resp).await?;

        if !uploaded.success {
            return Err(SubmitError::Photo(
                uploaded
                    .message
                    .unwrap_or_else(|| "photo upload rejected".to_string()),
            ));
        }
        Ok(uploaded.file_paths.unwrap_or_default())
    }

    /// Submitted forms (`GET /Forms`).
    pub async fn fetch_forms(&self) -> Result<Vec<FormDto>, SubmitError> {
        let resp = self
            .request(Method::GET, "/Forms", self.request_timeout)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// Production lines (`GET /Lines`), used to resolve `lineId` before a
    /// draft reaches the queue.
    pub async fn fetch_lines(&self) -> Result<Vec<LineDto>, SubmitError> {
        let resp = self
            .request(Method::GET, "/Lines", self.request_timeout)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// Defect error codes (`GET /ErrorCodes`).
    pub async fn fetch_error_codes(&self) -> Result<Vec<ErrorCodeDto>, SubmitError> {
        let resp = self
            .request(Method::GET, "/ErrorCodes", self.request_timeout)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }
}

#[async_trait]
impl ReportSubmitter for ApiClient {
    /// Deliver one queued report.
    ///
    /// All-local photo sets go out as a single multipart request. As soon as
    /// a hosted URL is involved, delivery switches to the two-phase variant:
    /// remaining local files are uploaded first, then the form references
    /// the full URL list, so no photo reference is dropped.
    async fn submit(&self, report: &QueuedReport) -> Result<FormDto, SubmitError> {
        let photos = &report.payload.photos;
        let mut form = CreateForm::from_queued(report);

        if photos.iter().all(PhotoRef::is_local) {
            return self.create_form_multipart(&form, photos).await;
        }

        let locals: Vec<PhotoRef> = photos.iter().filter(|p| p.is_local()).cloned().collect();
        let mut urls: Vec<String> = photos
            .iter()
            .filter(|p| p.is_remote())
            .map(|p| p.as_str().to_string())
            .collect();
        if !locals.is_empty() {
            urls.extend(self.upload_photos(&report.payload.barcode, &locals).await?);
        }

        form.photos = urls;
        self.create_form(&form).await
    }
}

/// Read the bytes behind a local photo URI.
async fn read_photo_bytes(photo: &PhotoRef) -> Result<Vec<u8>, SubmitError> {
    let PhotoRef::Local(uri) = photo else {
        return Err(SubmitError::Photo(format!(
            "'{}' is already hosted; nothing to read",
            photo.as_str()
        )));
    };
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    tokio::fs::read(path)
        .await
        .map_err(|e| SubmitError::Photo(format!("failed to read photo '{uri}': {e}")))
}

/// Turn a local photo URI into a multipart file part.
async fn photo_part(photo: &PhotoRef) -> Result<reqwest::multipart::Part, SubmitError> {
    let bytes = read_photo_bytes(photo).await?;
    let file_name = photo
        .as_str()
        .rsplit('/')
        .next()
        .unwrap_or("photo.jpg")
        .to_string();
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/jpeg")
        .map_err(|e| SubmitError::Photo(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linereport_core::{ErrorCodeRef, ReportPayload, UserId};
    use serde_json::json;

    fn test_report() -> QueuedReport {
        QueuedReport::new(ReportPayload {
            barcode: "8690000000017".to_string(),
            product_type: "PumpHousing".to_string(),
            line_number: "Line 3".to_string(),
            line_id: LineId::new(3),
            error_code: ErrorCodeRef::new(ErrorCodeId::new(12), "E-12", "scratched surface"),
            note: Some("left flange".to_string()),
            photos: vec![PhotoRef::parse("file:///photos/a.jpg")],
            user_id: UserId::new(2),
        })
    }

    #[test]
    fn create_form_maps_queued_report() {
        let report = test_report();
        let form = CreateForm::from_queued(&report);

        assert_eq!(form.code, "8690000000017");
        assert_eq!(form.form_type, "PumpHousing");
        assert_eq!(form.name, "PumpHousing");
        assert_eq!(form.product_error.as_deref(), Some("left flange"));
        assert_eq!(form.quantity, 1);
        assert_eq!(form.error_code_id, ErrorCodeId::new(12));
        assert_eq!(form.line_id, LineId::new(3));
        assert_eq!(form.form_date, report.created_at);
        assert!(form.photos.is_empty());
    }

    #[test]
    fn create_form_serializes_to_backend_contract() {
        let form = CreateForm::from_queued(&test_report());
        let value = serde_json::to_value(&form).unwrap();

        for key in [
            "code",
            "type",
            "name",
            "productError",
            "quantity",
            "errorCodeId",
            "lineId",
            "formDate",
        ] {
            assert!(value.get(key).is_some(), "missing wire key {key}");
        }
        // Empty photo list stays off the wire.
        assert!(value.get("photos").is_none());
    }

    #[test]
    fn photo_upload_request_serializes_to_backend_contract() {
        let body = PhotoUploadRequest {
            serial_number: "SN-1".to_string(),
            base64_images: vec!["aGVsbG8=".to_string()],
            length_unit: "mm".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["serialNumber"], json!("SN-1"));
        assert_eq!(value["base64Images"][0], json!("aGVsbG8="));
        assert_eq!(value["lengthUnit"], json!("mm"));
    }

    #[test]
    fn form_dto_deserializes_backend_response() {
        let body = json!({
            "id": 42,
            "code": "8690000000017",
            "type": "PumpHousing",
            "productError": "left flange",
            "errorCodeId": 12,
            "errorCode": {"id": 12, "code": "E-12", "description": "scratched surface"},
            "lineId": 3,
            "line": {"id": 3, "name": "Line 3"},
            "photos": [{"id": 7, "filePath": "/uploads/a.jpg", "formId": 42}],
            "formDate": "2026-08-01T06:30:00Z"
        });
        let form: FormDto = serde_json::from_value(body).unwrap();

        assert_eq!(form.id, 42);
        assert_eq!(form.form_type.as_deref(), Some("PumpHousing"));
        assert_eq!(form.error_code.unwrap().code.as_deref(), Some("E-12"));
        assert_eq!(
            form.photos.unwrap()[0].file_path.as_deref(),
            Some("/uploads/a.jpg")
        );
        // Fields the backend omits default to None.
        assert!(form.quantity.is_none());
        assert!(form.status.is_none());
    }
}
