//! Multi-file image upload pipeline.
//!
//! Files are validated one by one, given a collision-resistant path and sent
//! to object storage in groups of `concurrency`. Every upload of a group is in
//! flight at the same time and the whole group finishes before the next one
//! starts. A failing file yields an error entry; it never aborts the batch.

pub mod path;
pub mod signed;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use futures::future::join_all;
use serde::Serialize;

use crate::auth::token::now_millis;
use crate::backend::{with_deadline, ImageTransform, ObjectStore};
use crate::config::UploadConfig;

pub use path::{sanitize_filename, unique_object_path, PositionFolder};
pub use signed::{
    issue_profile_upload, ProfileTicket, ProfileUploadError, ProfileUploadRequest,
    SignedProfileUpload,
};

/// One file taken from the multipart form.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Client-side file name.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Bytes,
}

impl UploadFile {
    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Result for a single file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    /// Stored successfully.
    Stored {
        /// Object path in the bucket.
        path: String,
        /// Public URL.
        url: String,
        /// Thumbnail URL.
        #[serde(rename = "thumbUrl")]
        thumb_url: String,
        /// Size in bytes.
        size: u64,
    },
    /// Rejected or failed.
    Failed {
        /// What went wrong.
        error: String,
        /// Client-side file name.
        name: String,
    },
}

impl UploadOutcome {
    /// Whether the file was stored.
    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored { .. })
    }
}

/// Summary of a whole request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    /// Per-file results, in input order.
    pub files: Vec<UploadOutcome>,
    /// Number of stored files.
    pub uploaded: usize,
    /// Number of failed files.
    pub failed: usize,
    /// Whether at least one file was stored.
    pub success: bool,
}

impl UploadReport {
    fn from_outcomes(files: Vec<UploadOutcome>) -> Self {
        let uploaded = files.iter().filter(|f| f.is_stored()).count();
        Self {
            failed: files.len() - uploaded,
            success: uploaded > 0,
            uploaded,
            files,
        }
    }
}

/// Per-file acceptance rules.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Accepted MIME types.
    pub allowed_types: Vec<String>,
    /// Maximum size in bytes.
    pub max_file_size: u64,
}

impl UploadPolicy {
    /// Check one file, returning the user-facing rejection message.
    pub fn check(&self, file: &UploadFile) -> Result<(), String> {
        if !self.allowed_types.iter().any(|t| *t == file.content_type) {
            return Err("Unsupported file type. Allowed: JPG, PNG, GIF, WEBP".to_string());
        }
        if file.size() > self.max_file_size {
            return Err(format!(
                "File too large. Max {}MB",
                self.max_file_size / (1024 * 1024)
            ));
        }
        Ok(())
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            allowed_types: config.allowed_types.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// Validates files and stores them in bounded-concurrency groups.
#[derive(Clone)]
pub struct UploadPipeline {
    storage: Arc<dyn ObjectStore>,
    policy: UploadPolicy,
    concurrency: usize,
    timeout: Duration,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("policy", &self.policy)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl UploadPipeline {
    /// Create a pipeline over `storage`.
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        policy: UploadPolicy,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            policy,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Upload `files` to `bucket`, optionally under `folder`.
    pub async fn run(
        &self,
        bucket: &str,
        folder: Option<&str>,
        files: Vec<UploadFile>,
    ) -> UploadReport {
        let mut outcomes = Vec::with_capacity(files.len());
        for group in files.chunks(self.concurrency) {
            let uploads = group.iter().map(|file| self.upload_one(bucket, folder, file));
            outcomes.extend(join_all(uploads).await);
        }
        UploadReport::from_outcomes(outcomes)
    }

    async fn upload_one(
        &self,
        bucket: &str,
        folder: Option<&str>,
        file: &UploadFile,
    ) -> UploadOutcome {
        if let Err(error) = self.policy.check(file) {
            return UploadOutcome::Failed {
                error,
                name: file.name.clone(),
            };
        }

        let path = unique_object_path(folder, &file.name, now_millis());
        let stored = with_deadline(
            self.timeout,
            self.storage
                .upload(bucket, &path, file.bytes.clone(), &file.content_type),
        )
        .await;

        match stored {
            Ok(()) => {
                tracing::debug!(bucket, path = %path, size = file.size(), "Stored upload");
                UploadOutcome::Stored {
                    url: self.storage.public_url(bucket, &path, None),
                    thumb_url: self
                        .storage
                        .public_url(bucket, &path, Some(ImageTransform::THUMBNAIL)),
                    size: file.size(),
                    path,
                }
            }
            Err(e) => {
                tracing::warn!(bucket, path = %path, error = %e, "Upload failed");
                UploadOutcome::Failed {
                    error: format!("Upload failed: {e}"),
                    name: file.name.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HavenError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records the order of upload starts and ends and the peak concurrency.
    #[derive(Default)]
    struct TracingStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for TracingStore {
        async fn upload(&self, _bucket: &str, path: &str, _bytes: Bytes, _ct: &str) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let name = path.rsplit('-').next().unwrap_or_default().to_string();
            self.events.lock().unwrap().push(format!("start:{name}"));
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.events.lock().unwrap().push(format!("end:{name}"));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if name.starts_with("broken") {
                return Err(HavenError::Backend("bucket not found".into()));
            }
            Ok(())
        }

        fn public_url(
            &self,
            bucket: &str,
            path: &str,
            transform: Option<ImageTransform>,
        ) -> String {
            match transform {
                Some(_) => format!("https://cdn/{bucket}/{path}?thumb"),
                None => format!("https://cdn/{bucket}/{path}"),
            }
        }

        async fn create_signed_upload_url(&self, _bucket: &str, _path: &str) -> Result<String> {
            unreachable!()
        }

        async fn remove(&self, _bucket: &str, _paths: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn png(name: &str, size: usize) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: Bytes::from(vec![0u8; size]),
        }
    }

    fn pipeline(store: Arc<TracingStore>) -> UploadPipeline {
        UploadPipeline::new(
            store,
            UploadPolicy::from(&UploadConfig::default()),
            4,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_groups_of_four() {
        let store = Arc::new(TracingStore::default());
        let files = (1..=6).map(|i| png(&format!("f{i}.png"), 10)).collect();
        let report = pipeline(store.clone()).run("gallery", None, files).await;

        assert_eq!(report.uploaded, 6);
        assert!(report.success);
        assert_eq!(store.peak.load(Ordering::SeqCst), 4);

        let events = store.events.lock().unwrap();
        let last_end_of_first_group = (1..=4)
            .map(|i| events.iter().position(|e| *e == format!("end:f{i}.png")).unwrap())
            .max()
            .unwrap();
        for i in 5..=6 {
            let start = events
                .iter()
                .position(|e| *e == format!("start:f{i}.png"))
                .unwrap();
            assert!(start > last_end_of_first_group, "f{i} started early");
        }
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let store = Arc::new(TracingStore::default());
        let files = vec![png("a.png", 1), png("b.png", 1), png("c.png", 1)];
        let report = pipeline(store).run("gallery", Some("events"), files).await;

        let paths: Vec<&str> = report
            .files
            .iter()
            .map(|f| match f {
                UploadOutcome::Stored { path, .. } => path.as_str(),
                UploadOutcome::Failed { .. } => panic!("unexpected failure"),
            })
            .collect();
        assert!(paths[0].starts_with("events/") && paths[0].ends_with("-a.png"));
        assert!(paths[1].ends_with("-b.png"));
        assert!(paths[2].ends_with("-c.png"));
    }

    #[tokio::test]
    async fn test_invalid_files_do_not_abort_batch() {
        let store = Arc::new(TracingStore::default());
        let mut pdf = png("doc.pdf", 10);
        pdf.content_type = "application/pdf".to_string();
        let files = vec![
            pdf,
            png("huge.png", 5 * 1024 * 1024 + 1),
            png("ok.png", 5 * 1024 * 1024),
            png("broken.png", 10),
        ];
        let report = pipeline(store).run("gallery", None, files).await;

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 3);
        assert!(report.success);
        assert_eq!(
            report.files[0],
            UploadOutcome::Failed {
                error: "Unsupported file type. Allowed: JPG, PNG, GIF, WEBP".into(),
                name: "doc.pdf".into()
            }
        );
        assert_eq!(
            report.files[1],
            UploadOutcome::Failed {
                error: "File too large. Max 5MB".into(),
                name: "huge.png".into()
            }
        );
        assert!(report.files[2].is_stored());
        match &report.files[3] {
            UploadOutcome::Failed { error, .. } => {
                assert!(error.starts_with("Upload failed: "), "{error}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_failed_report() {
        let store = Arc::new(TracingStore::default());
        let report = pipeline(store).run("gallery", None, vec![png("broken.png", 1)]).await;
        assert!(!report.success);
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let stored = UploadOutcome::Stored {
            path: "p".into(),
            url: "u".into(),
            thumb_url: "t".into(),
            size: 3,
        };
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            serde_json::json!({"path": "p", "url": "u", "thumbUrl": "t", "size": 3})
        );
        let failed = UploadOutcome::Failed {
            error: "e".into(),
            name: "n".into(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"error": "e", "name": "n"})
        );
    }
}
