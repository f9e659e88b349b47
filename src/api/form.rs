//! Profile form extraction
//!
//! Registration and update accept either `multipart/form-data` (with an
//! optional `profilePhoto` part) or a JSON object of the same field names.

use axum::{
    async_trait,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::domain::{FieldViolation, FormFields};
use crate::error::ApiError;
use crate::services::files::{Upload, UploadRejection};

pub const PHOTO_FIELD: &str = "profilePhoto";

/// Submitted text fields plus the optional photo upload.
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub fields: FormFields,
    pub photo: Option<Upload>,
}

#[async_trait]
impl FromRequest<Arc<AppState>> for ProfileForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        let max_bytes = state.files.policy().max_bytes;

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            read_multipart(multipart, max_bytes).await
        } else {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(Self {
                fields: json_fields(body),
                photo: None,
            })
        }
    }
}

async fn read_multipart(mut multipart: Multipart, max_bytes: usize) -> Result<ProfileForm, ApiError> {
    let mut form = ProfileForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name != PHOTO_FIELD {
            let value = field.text().await.map_err(|e| multipart_error(e, max_bytes))?;
            form.fields.insert(name, value);
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let mut bytes = Vec::new();
        // Stop buffering once over the limit; the store rejects it by size.
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_bytes))? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > max_bytes {
                break;
            }
        }

        // An empty file input still sends a part, without filename or bytes.
        if bytes.is_empty() && field.file_name().map_or(true, str::is_empty) {
            continue;
        }

        form.photo = Some(Upload {
            content_type,
            bytes,
        });
    }

    Ok(form)
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let reason = UploadRejection::TooLarge { max_bytes };
        return ApiError::Validation(vec![FieldViolation::new(PHOTO_FIELD, reason.to_string())]);
    }
    ApiError::bad_request(e.body_text())
}

fn json_fields(body: Map<String, Value>) -> FormFields {
    body.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}
