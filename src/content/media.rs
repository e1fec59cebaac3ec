//! Media references stored in content rows.
//!
//! A row's media column holds either a path inside the kind's bucket or an
//! absolute URL. Absolute URLs that point into one of our buckets can be
//! turned back into an object path, which is what deletion and resizing need.

use serde_json::Value;

use super::ContentKind;
use crate::backend::{ImageTransform, ObjectStore};

/// Bucket used by profile pictures uploaded before the `leaders` bucket.
pub const LEGACY_LEADERSHIP_BUCKET: &str = "leadership";

/// Locate the object a media reference points to.
///
/// Relative references are paths in `bucket`. Absolute URLs are searched for a
/// `/{bucket}/` segment; everything after it (minus any query string) is the
/// path. Returns `None` for URLs elsewhere.
pub fn storage_object(reference: &str, bucket: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if !is_absolute(reference) {
        return Some(reference.trim_start_matches('/').to_string());
    }

    let url = url::Url::parse(reference).ok()?;
    let marker = format!("/{bucket}/");
    let path = url.path();
    let start = path.find(&marker)? + marker.len();
    let object = urlencoding::decode(&path[start..]).ok()?.into_owned();
    (!object.is_empty()).then_some(object)
}

fn is_absolute(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Public URL for a media reference of `kind`.
pub fn media_url(storage: &dyn ObjectStore, kind: ContentKind, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if kind != ContentKind::Leadership {
        if is_absolute(reference) {
            return Some(reference.to_string());
        }
        return storage_object(reference, kind.bucket())
            .map(|path| storage.public_url(kind.bucket(), &path, None));
    }

    // Profile pictures are always served as square thumbnails.
    let transform = Some(ImageTransform::AVATAR);
    if is_absolute(reference) {
        for bucket in [kind.bucket(), LEGACY_LEADERSHIP_BUCKET] {
            if let Some(path) = storage_object(reference, bucket) {
                return Some(storage.public_url(bucket, &path, transform));
            }
        }
        return Some(reference.to_string());
    }
    let bucket = if reference.starts_with("leaders/") {
        kind.bucket()
    } else {
        LEGACY_LEADERSHIP_BUCKET
    };
    Some(storage.public_url(bucket, reference, transform))
}

/// Copy of `row` with the kind's media URL field filled in.
pub fn public_row(storage: &dyn ObjectStore, kind: ContentKind, mut row: Value) -> Value {
    let url = row
        .get(kind.media_field())
        .and_then(Value::as_str)
        .and_then(|reference| media_url(storage, kind, reference));
    if let Some(object) = row.as_object_mut() {
        object.insert(
            kind.media_url_field().to_string(),
            url.map(Value::String).unwrap_or(Value::Null),
        );
    }
    row
}

/// Display rank of a leadership position on the about page.
pub fn position_rank(position: &str) -> u32 {
    const RANKS: &[(&str, u32)] = &[
        ("Project Director", 1),
        ("Project Accountant", 2),
        ("Project Social Worker", 3),
        ("Chairman", 4),
        ("Patron / Pastor", 5),
    ];
    RANKS
        .iter()
        .find(|(name, _)| *name == position.trim())
        .map(|(_, rank)| *rank)
        .unwrap_or(99)
}

/// Whether a leadership row belongs on the public page at `today`.
pub fn is_current_leader(row: &Value, today: chrono::NaiveDate) -> bool {
    if row.get("is_active").and_then(Value::as_bool) == Some(false) {
        return false;
    }
    match row.get("end_date").and_then(Value::as_str) {
        Some(end) if !end.is_empty() => {
            let day = end.get(..10).unwrap_or(end);
            match chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                Ok(end) => end > today,
                Err(_) => true,
            }
        }
        _ => true,
    }
}
