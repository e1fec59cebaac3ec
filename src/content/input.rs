//! Create and update bodies for the admin content endpoints.

use serde::Deserialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors};

use super::{derive_excerpt, ContentKind};

/// Accepted story statuses.
pub const STORY_STATUSES: &[&str] = &["draft", "published"];

/// A validated body for one content kind.
pub trait ContentInput: Validate + Send {
    /// Which kind this body creates.
    const KIND: ContentKind;

    /// The title-like field, if supplied.
    fn title(&self) -> Option<&str>;

    /// Row to insert.
    fn create_row(&self) -> Value;

    /// Columns to patch: only the supplied fields.
    fn update_patch(&self) -> Value;

    /// Field rules plus the required title.
    fn validate_for_create(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.title().map(str::trim).filter(|t| !t.is_empty()).is_none() {
            errors.add(
                Self::KIND.title_field(),
                ValidationError::new("required").with_message("Must not be empty".into()),
            );
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Field rules; a supplied title must not be blank.
    fn validate_for_update(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.title().is_some_and(|t| t.trim().is_empty()) {
            errors.add(
                Self::KIND.title_field(),
                ValidationError::new("required").with_message("Must not be empty".into()),
            );
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Reject control characters other than line breaks and tabs.
fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

fn story_status(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || STORY_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("status").with_message("Must be draft or published".into()))
    }
}

/// Trimmed string or null.
fn text_or_null(value: &Option<String>) -> Value {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Value::String(s.to_string()),
        _ => Value::Null,
    }
}

/// Insert `key` into `patch` when `value` was supplied; blank clears it.
fn patch_field(patch: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if value.is_some() {
        patch.insert(key.to_string(), text_or_null(value));
    }
}

fn content_and_excerpt(content: &Option<String>, excerpt: &Option<String>) -> (Value, Value) {
    let content = content.clone().unwrap_or_default();
    let excerpt = match text_or_null(excerpt) {
        Value::Null if !content.is_empty() => Value::String(derive_excerpt(&content)),
        other => other,
    };
    (Value::String(content), excerpt)
}

/// Story body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StoryInput {
    /// Headline.
    #[validate(length(max = 200), custom(function = "no_control_chars"))]
    pub title: Option<String>,
    /// Body text.
    pub content: Option<String>,
    /// Teaser; derived from the content when absent.
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    /// Date shown on the story.
    pub story_date: Option<String>,
    /// Category tag.
    #[validate(length(max = 50))]
    pub tag: Option<String>,
    /// `draft` or `published`.
    #[validate(custom(function = "story_status"))]
    pub status: Option<String>,
    /// Storage path of the cover image.
    pub image_path: Option<String>,
}

impl ContentInput for StoryInput {
    const KIND: ContentKind = ContentKind::Stories;

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn create_row(&self) -> Value {
        let (content, excerpt) = content_and_excerpt(&self.content, &self.excerpt);
        serde_json::json!({
            "title": text_or_null(&self.title),
            "content": content,
            "excerpt": excerpt,
            "story_date": text_or_null(&self.story_date),
            "tag": text_or_null(&self.tag),
            "status": text_or_null(&self.status),
            "image_path": text_or_null(&self.image_path),
        })
    }

    fn update_patch(&self) -> Value {
        let mut patch = Map::new();
        patch_field(&mut patch, "title", &self.title);
        if let Some(content) = &self.content {
            patch.insert("content".into(), Value::String(content.clone()));
        }
        patch_field(&mut patch, "excerpt", &self.excerpt);
        patch_field(&mut patch, "story_date", &self.story_date);
        patch_field(&mut patch, "tag", &self.tag);
        patch_field(&mut patch, "status", &self.status);
        patch_field(&mut patch, "image_path", &self.image_path);
        Value::Object(patch)
    }
}

/// Event body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventInput {
    /// Event name.
    #[validate(length(max = 200), custom(function = "no_control_chars"))]
    pub title: Option<String>,
    /// Description.
    pub content: Option<String>,
    /// Teaser; derived from the content when absent.
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    /// Day of the event.
    pub event_date: Option<String>,
    /// Start time.
    pub event_time: Option<String>,
    /// Venue.
    #[validate(length(max = 200))]
    pub location: Option<String>,
    /// Storage path of the event image.
    pub media_path: Option<String>,
}

impl ContentInput for EventInput {
    const KIND: ContentKind = ContentKind::Events;

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn create_row(&self) -> Value {
        let (content, excerpt) = content_and_excerpt(&self.content, &self.excerpt);
        serde_json::json!({
            "title": text_or_null(&self.title),
            "content": content,
            "excerpt": excerpt,
            "event_date": text_or_null(&self.event_date),
            "event_time": text_or_null(&self.event_time),
            "location": text_or_null(&self.location),
            "media_path": text_or_null(&self.media_path),
        })
    }

    fn update_patch(&self) -> Value {
        let mut patch = Map::new();
        patch_field(&mut patch, "title", &self.title);
        if let Some(content) = &self.content {
            patch.insert("content".into(), Value::String(content.clone()));
        }
        patch_field(&mut patch, "excerpt", &self.excerpt);
        patch_field(&mut patch, "event_date", &self.event_date);
        patch_field(&mut patch, "event_time", &self.event_time);
        patch_field(&mut patch, "location", &self.location);
        patch_field(&mut patch, "media_path", &self.media_path);
        Value::Object(patch)
    }
}

/// Leadership body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LeaderInput {
    /// Person's name.
    #[validate(length(max = 120), custom(function = "no_control_chars"))]
    pub full_name: Option<String>,
    /// Position title.
    #[validate(length(max = 120))]
    pub position: Option<String>,
    /// Short biography.
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
    /// Start of term.
    pub start_date: Option<String>,
    /// End of term.
    pub end_date: Option<String>,
    /// Whether the person currently serves.
    pub is_active: Option<bool>,
    /// Profile picture path or URL.
    pub image_path: Option<String>,
}

impl ContentInput for LeaderInput {
    const KIND: ContentKind = ContentKind::Leadership;

    fn title(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    fn create_row(&self) -> Value {
        let start_date = match text_or_null(&self.start_date) {
            Value::Null => Value::String(chrono::Utc::now().date_naive().to_string()),
            date => date,
        };
        serde_json::json!({
            "full_name": text_or_null(&self.full_name),
            "position": text_or_null(&self.position),
            "bio": text_or_null(&self.bio),
            "start_date": start_date,
            "end_date": text_or_null(&self.end_date),
            "is_active": self.is_active.unwrap_or(true),
            "image_path": text_or_null(&self.image_path),
        })
    }

    fn update_patch(&self) -> Value {
        let mut patch = Map::new();
        patch_field(&mut patch, "full_name", &self.full_name);
        patch_field(&mut patch, "position", &self.position);
        patch_field(&mut patch, "bio", &self.bio);
        patch_field(&mut patch, "start_date", &self.start_date);
        patch_field(&mut patch, "end_date", &self.end_date);
        if let Some(active) = self.is_active {
            patch.insert("is_active".into(), Value::Bool(active));
        }
        patch_field(&mut patch, "image_path", &self.image_path);
        Value::Object(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_story_row_derives_excerpt() {
        let input = StoryInput {
            title: Some("  Clean water  ".into()),
            content: Some("a".repeat(300)),
            status: Some("published".into()),
            ..Default::default()
        };
        assert!(input.validate_for_create().is_ok());

        let row = input.create_row();
        assert_eq!(row["title"], "Clean water");
        assert_eq!(row["excerpt"].as_str().unwrap().len(), 160);
        assert_eq!(row["tag"], Value::Null);
        assert_eq!(row["image_path"], Value::Null);
    }

    #[test]
    fn test_explicit_excerpt_wins() {
        let input = StoryInput {
            title: Some("t".into()),
            content: Some("long content".into()),
            excerpt: Some("teaser".into()),
            ..Default::default()
        };
        assert_eq!(input.create_row()["excerpt"], "teaser");
    }

    #[test]
    fn test_missing_content_gives_empty_string() {
        let row = EventInput {
            title: Some("Fundraiser".into()),
            ..Default::default()
        }
        .create_row();
        assert_eq!(row["content"], "");
        assert_eq!(row["excerpt"], Value::Null);
        assert_eq!(row["event_date"], Value::Null);
    }

    #[test]
    fn test_create_requires_title() {
        let errors = StoryInput::default().validate_for_create().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));

        let errors = LeaderInput {
            full_name: Some("   ".into()),
            ..Default::default()
        }
        .validate_for_create()
        .unwrap_err();
        assert!(errors.field_errors().contains_key("full_name"));
    }

    #[test]
    fn test_field_rules() {
        let input = StoryInput {
            title: Some("x".repeat(201)),
            status: Some("archived".into()),
            ..Default::default()
        };
        let errors = input.validate_for_create().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("status"));

        let input = EventInput {
            title: Some("bad\u{0007}title".into()),
            ..Default::default()
        };
        assert!(input.validate_for_create().is_err());
    }

    #[test]
    fn test_update_patch_only_supplied_fields() {
        let input: StoryInput =
            serde_json::from_value(json!({"status": "draft", "tag": ""})).unwrap();
        assert!(input.validate_for_update().is_ok());
        assert_eq!(
            input.update_patch(),
            json!({"status": "draft", "tag": null})
        );
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let input: EventInput = serde_json::from_value(json!({"title": " "})).unwrap();
        assert!(input.validate_for_update().is_err());
    }

    #[test]
    fn test_leader_row_defaults() {
        let row = LeaderInput {
            full_name: Some("Jane Doe".into()),
            position: Some("Project Director".into()),
            ..Default::default()
        }
        .create_row();
        assert_eq!(row["is_active"], true);
        assert!(row["start_date"].as_str().is_some());
        assert_eq!(row["end_date"], Value::Null);

        let patch = LeaderInput {
            is_active: Some(false),
            end_date: Some("2024-12-31".into()),
            ..Default::default()
        }
        .update_patch();
        assert_eq!(patch, json!({"is_active": false, "end_date": "2024-12-31"}));
    }
}
