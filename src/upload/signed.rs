//! Signed direct-upload tickets for leadership profile pictures.
//!
//! Instead of proxying the bytes, the server validates the declared file,
//! picks the storage path and asks the storage service for a short-lived
//! signed upload URL. The browser then uploads straight to storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::path::{profile_path, PositionFolder};
use crate::backend::{Backends, ImageTransform};
use crate::Result;

/// Bucket holding profile pictures.
pub const LEADERS_BUCKET: &str = "leaders";

/// Accepted MIME types for profile pictures.
pub const PROFILE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Maximum profile picture size.
pub const MAX_PROFILE_SIZE: u64 = 5 * 1024 * 1024;

/// Declared properties of the file the client is about to upload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUploadRequest {
    /// Leadership entry the picture belongs to.
    #[serde(default)]
    pub leader_id: Option<String>,
    /// Position title, used to pick the folder.
    #[serde(default)]
    pub position: Option<String>,
    /// Client-side file name.
    #[serde(default)]
    pub filename: Option<String>,
    /// Declared size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Declared MIME type.
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

/// Why a ticket request was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileUploadError {
    /// No leader id.
    #[error("Missing leaderId")]
    MissingLeaderId,
    /// No file name.
    #[error("Missing filename")]
    MissingFilename,
    /// MIME type not accepted.
    #[error("Invalid file type")]
    InvalidType,
    /// Declared size over the limit.
    #[error("File too large (max 5MB)")]
    TooLarge,
}

/// A validated ticket request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTicket {
    /// Leader id.
    pub leader_id: String,
    /// Folder derived from the position.
    pub folder: PositionFolder,
    /// File name.
    pub filename: String,
}

impl ProfileUploadRequest {
    /// Check the request in the order leader id, file name, type, size.
    pub fn validate(&self) -> std::result::Result<ProfileTicket, ProfileUploadError> {
        let leader_id = non_empty(&self.leader_id).ok_or(ProfileUploadError::MissingLeaderId)?;
        let filename = non_empty(&self.filename).ok_or(ProfileUploadError::MissingFilename)?;

        let content_type = self.content_type.as_deref().unwrap_or_default();
        if !PROFILE_TYPES.contains(&content_type) {
            return Err(ProfileUploadError::InvalidType);
        }
        if self.size.unwrap_or(0) > MAX_PROFILE_SIZE {
            return Err(ProfileUploadError::TooLarge);
        }

        Ok(ProfileTicket {
            leader_id: leader_id.to_string(),
            folder: PositionFolder::from_position(self.position.as_deref().unwrap_or_default()),
            filename: filename.to_string(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Everything the client needs to upload and later display the picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedProfileUpload {
    /// Bucket name.
    pub bucket: String,
    /// Object path.
    pub path: String,
    /// Time-limited upload URL.
    pub signed_url: String,
    /// Public URL of the resized picture.
    pub public_url: String,
}

/// Ask storage for a signed upload URL for `ticket`.
pub async fn issue_profile_upload(
    backends: &Backends,
    ticket: &ProfileTicket,
    epoch_ms: i64,
) -> Result<SignedProfileUpload> {
    let storage = backends.storage()?;
    let path = profile_path(ticket.folder, &ticket.leader_id, &ticket.filename, epoch_ms);
    let signed_url = backends
        .call(storage.create_signed_upload_url(LEADERS_BUCKET, &path))
        .await?;
    let public_url = storage.public_url(LEADERS_BUCKET, &path, Some(ImageTransform::PROFILE));

    Ok(SignedProfileUpload {
        bucket: LEADERS_BUCKET.to_string(),
        path,
        signed_url,
        public_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProfileUploadRequest {
        serde_json::from_value(serde_json::json!({
            "leaderId": "17",
            "position": "Board Chairman",
            "filename": "portrait.webp",
            "size": 1024,
            "type": "image/webp"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        let ticket = request().validate().unwrap();
        assert_eq!(ticket.leader_id, "17");
        assert_eq!(ticket.folder, PositionFolder::Chairman);
        assert_eq!(ticket.filename, "portrait.webp");
    }

    #[test]
    fn test_validation_order() {
        let mut req = ProfileUploadRequest::default();
        assert_eq!(req.validate(), Err(ProfileUploadError::MissingLeaderId));

        req.leader_id = Some("  ".into());
        assert_eq!(req.validate(), Err(ProfileUploadError::MissingLeaderId));

        req.leader_id = Some("1".into());
        assert_eq!(req.validate(), Err(ProfileUploadError::MissingFilename));

        req.filename = Some("a.gif".into());
        req.content_type = Some("image/gif".into());
        assert_eq!(req.validate(), Err(ProfileUploadError::InvalidType));

        req.content_type = Some("image/png".into());
        req.size = Some(MAX_PROFILE_SIZE + 1);
        assert_eq!(req.validate(), Err(ProfileUploadError::TooLarge));

        req.size = Some(MAX_PROFILE_SIZE);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_position_maps_to_other() {
        let mut req = request();
        req.position = None;
        assert_eq!(req.validate().unwrap().folder, PositionFolder::Other);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ProfileUploadError::InvalidType.to_string(), "Invalid file type");
        assert_eq!(
            ProfileUploadError::TooLarge.to_string(),
            "File too large (max 5MB)"
        );
    }

    #[tokio::test]
    async fn test_issue_without_storage_is_unavailable() {
        let backends = Backends::none(std::time::Duration::from_secs(1));
        let ticket = request().validate().unwrap();
        let err = issue_profile_upload(&backends, &ticket, 1).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
