//! Site content: stories, events and leadership entries.
//!
//! Rows live in the backend's content store. This module knows, for each
//! kind, which table and bucket it uses, how admin lists are ordered and
//! searched, and how create/update bodies become rows.

pub mod input;
pub mod media;

use serde::Deserialize;

use crate::backend::{Filter, Order, RowQuery};

pub use input::{ContentInput, EventInput, LeaderInput, StoryInput};
pub use media::{public_row, storage_object};

/// Characters kept when an excerpt is derived from the content.
pub const EXCERPT_CHARS: usize = 160;

/// Default page size for admin lists.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Largest page size a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// The kinds of content the site manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// News stories.
    Stories,
    /// Upcoming and past events.
    Events,
    /// Leadership profiles.
    Leadership,
}

impl ContentKind {
    /// Backend table.
    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Stories => "stories",
            ContentKind::Events => "events",
            ContentKind::Leadership => "leadership",
        }
    }

    /// Storage bucket holding the kind's media.
    pub fn bucket(&self) -> &'static str {
        match self {
            ContentKind::Stories => "stories",
            ContentKind::Events => "events",
            ContentKind::Leadership => crate::upload::signed::LEADERS_BUCKET,
        }
    }

    /// Field that must be present and non-empty on create.
    pub fn title_field(&self) -> &'static str {
        match self {
            ContentKind::Leadership => "full_name",
            _ => "title",
        }
    }

    /// Column holding the media path.
    pub fn media_field(&self) -> &'static str {
        match self {
            ContentKind::Events => "media_path",
            _ => "image_path",
        }
    }

    /// Field added to public rows with the resolved media URL.
    pub fn media_url_field(&self) -> &'static str {
        match self {
            ContentKind::Events => "media_url",
            _ => "image_url",
        }
    }

    /// Columns searched by the `q` parameter.
    pub fn search_columns(&self) -> &'static [&'static str] {
        match self {
            ContentKind::Stories => &["title", "content"],
            ContentKind::Events => &["title", "content", "location"],
            ContentKind::Leadership => &["full_name", "position"],
        }
    }

    /// Sort order for listings.
    pub fn order(&self) -> Vec<Order> {
        match self {
            ContentKind::Stories => vec![Order::desc("story_date"), Order::desc("created_at")],
            ContentKind::Events => vec![Order::asc("event_date")],
            ContentKind::Leadership => vec![Order::asc("position")],
        }
    }

    /// Whether rows carry a publication `status`.
    pub fn has_status(&self) -> bool {
        matches!(self, ContentKind::Stories)
    }

    /// Selection with the kind's ordering and nothing else.
    pub fn base_query(&self) -> RowQuery {
        self.order()
            .into_iter()
            .fold(RowQuery::new(), RowQuery::order_by)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Query string of an admin list request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    /// Case-insensitive search text.
    #[serde(default)]
    pub q: Option<String>,
    /// Exact status (stories only).
    #[serde(default)]
    pub status: Option<String>,
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<u64>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<u64>,
}

impl ListParams {
    /// Effective page, at least 1.
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, between 1 and [`MAX_PAGE_SIZE`].
    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Build the selection for `kind`.
    pub fn to_query(&self, kind: ContentKind) -> RowQuery {
        let mut query = kind.base_query().with_count();

        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let columns = kind.search_columns().iter().map(|c| c.to_string()).collect();
            query = query.filter(Filter::ContainsAny(columns, q.to_string()));
        }
        if kind.has_status() {
            if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
                query = query.filter(Filter::eq("status", status));
            }
        }

        let limit = self.limit();
        query.window((self.page() - 1).saturating_mul(limit), limit)
    }
}

/// First [`EXCERPT_CHARS`] characters of `content`.
///
/// # Examples
///
/// ```
/// use haven::content::derive_excerpt;
///
/// assert_eq!(derive_excerpt("Short story"), "Short story");
/// assert_eq!(derive_excerpt(&"x".repeat(500)).len(), 160);
/// ```
pub fn derive_excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHARS).collect()
}
