//! Image upload handler.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde_json::json;
use std::sync::Arc;

use crate::audit::action;
use crate::upload::{UploadFile, UploadReport};
use crate::web::error::ApiError;
use crate::web::middleware::OptionalAdminUser;
use crate::web::state::AppState;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Fields collected from the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<UploadFile>,
    single: Option<UploadFile>,
    bucket: Option<String>,
    folder: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "files" | "file" => {
                    let file = UploadFile {
                        name: field.file_name().unwrap_or("image").to_string(),
                        content_type: field
                            .content_type()
                            .unwrap_or(FALLBACK_CONTENT_TYPE)
                            .to_string(),
                        bytes: field.bytes().await.map_err(multipart_error)?,
                    };
                    if name == "files" {
                        form.files.push(file);
                    } else if form.single.is_none() {
                        form.single = Some(file);
                    }
                }
                "bucket" => form.bucket = Some(field.text().await.map_err(multipart_error)?),
                "folder" => form.folder = Some(field.text().await.map_err(multipart_error)?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// `files` entries, or the single `file` when there are none.
    fn into_files(self) -> Vec<UploadFile> {
        if self.files.is_empty() {
            self.single.into_iter().collect()
        } else {
            self.files
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body too large")
    } else {
        ApiError::bad_request(e.body_text())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /api/admin/images/upload - Upload images to storage.
///
/// Accepts repeated `files` fields or one `file`, plus optional `bucket` and
/// `folder`. Responds 200 when at least one file was stored, else 400.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    OptionalAdminUser(admin): OptionalAdminUser,
    user_agent: Option<TypedHeader<UserAgent>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadReport>), ApiError> {
    let Some(admin) = admin else {
        let agent = user_agent.map(|TypedHeader(ua)| ua.as_str().to_string());
        state
            .audit
            .record(
                action::UNAUTHORIZED_UPLOAD,
                "image",
                None,
                json!({ "userAgent": agent }),
            )
            .await;
        return Err(ApiError::unauthorized("Unauthorized"));
    };

    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = UploadForm::read(multipart).await?;

    let bucket = non_blank(form.bucket.clone())
        .unwrap_or_else(|| state.config.upload.default_bucket.clone());
    let folder = non_blank(form.folder.clone());
    let files = form.into_files();
    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    let pipeline = state.upload_pipeline()?;
    let report = pipeline.run(&bucket, folder.as_deref(), files).await;
    tracing::info!(
        user = %admin.username,
        bucket = %bucket,
        uploaded = report.uploaded,
        failed = report.failed,
        "Image upload finished"
    );

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(report)))
}
