//! Storage path derivation for uploaded images.

use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random component in gallery paths.
pub const RANDOM_TOKEN_LEN: usize = 6;

/// Name used when sanitizing leaves nothing.
pub const FALLBACK_NAME: &str = "image";

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// # Examples
///
/// ```
/// use haven::upload::path::sanitize_filename;
///
/// assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
/// assert_eq!(sanitize_filename(""), "image");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Random lowercase base36 string.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

/// Normalise a caller-supplied folder: no empty, `.` or `..` segments.
pub fn normalize_folder(folder: &str) -> Option<String> {
    let segments: Vec<&str> = folder
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Collision-resistant gallery path: `[{folder}/]{epoch_ms}-{token}-{safe_name}`.
pub fn unique_object_path(folder: Option<&str>, name: &str, epoch_ms: i64) -> String {
    let unique = format!(
        "{epoch_ms}-{}-{}",
        random_token(RANDOM_TOKEN_LEN),
        sanitize_filename(name)
    );
    match folder.and_then(normalize_folder) {
        Some(folder) => format!("{folder}/{unique}"),
        None => unique,
    }
}

/// Leadership folder for a position title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFolder {
    /// Directors.
    Director,
    /// Accountants.
    Accountant,
    /// Pastors and patrons.
    Pastor,
    /// Social workers.
    SocialWorker,
    /// Chairpersons.
    Chairman,
    /// Everyone else.
    Other,
}

/// Keyword lookup, checked in order against the lower-cased position.
const POSITION_KEYWORDS: &[(&str, PositionFolder)] = &[
    ("director", PositionFolder::Director),
    ("account", PositionFolder::Accountant),
    ("pastor", PositionFolder::Pastor),
    ("patron", PositionFolder::Pastor),
    ("social", PositionFolder::SocialWorker),
    ("chairman", PositionFolder::Chairman),
];

impl PositionFolder {
    /// Classify a free-form position title.
    pub fn from_position(position: &str) -> Self {
        let position = position.to_lowercase();
        POSITION_KEYWORDS
            .iter()
            .find(|(keyword, _)| position.contains(keyword))
            .map(|(_, folder)| *folder)
            .unwrap_or(PositionFolder::Other)
    }

    /// Folder name in the bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionFolder::Director => "Director",
            PositionFolder::Accountant => "Accountant",
            PositionFolder::Pastor => "Pastor",
            PositionFolder::SocialWorker => "Social worker",
            PositionFolder::Chairman => "Chairman",
            PositionFolder::Other => "Other",
        }
    }
}

impl std::fmt::Display for PositionFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension of a sanitized filename, `img` if it has none.
pub fn file_extension(filename: &str) -> String {
    let safe = sanitize_filename(filename);
    match safe.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "img".to_string(),
    }
}

/// Profile picture path: `{folder}/{leader_id}/profile-{epoch_ms}.{ext}`.
pub fn profile_path(
    folder: PositionFolder,
    leader_id: &str,
    filename: &str,
    epoch_ms: i64,
) -> String {
    format!(
        "{folder}/{}/profile-{epoch_ms}.{}",
        sanitize_filename(leader_id),
        file_extension(filename)
    )
}
