use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::slug::{is_valid_slug, slugify};
use crate::error::ValidationError;

/// Maximum number of characters in a post title.
pub const TITLE_MAX_LEN: usize = 250;
/// Maximum number of characters in a post slug.
pub const SLUG_MAX_LEN: usize = 250;

/// Current time truncated to the microsecond precision of the backing store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a modification made at `now` to a record last updated at
/// `previous`. Always strictly greater than `previous`.
pub fn next_updated(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Publication status of a post.
///
/// Stored as a two-letter code (`DF`, `PB`), displayed with its label.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub const ALL: [PostStatus; 2] = [PostStatus::Draft, PostStatus::Published];

    /// Storage code.
    pub fn code(self) -> &'static str {
        match self {
            PostStatus::Draft => "DF",
            PostStatus::Published => "PB",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            PostStatus::Draft => "Draft",
            PostStatus::Published => "Published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PostStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PostStatus::ALL
            .into_iter()
            .find(|status| {
                status.code().eq_ignore_ascii_case(s) || status.label().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

impl TryFrom<String> for PostStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PostStatus> for &'static str {
    fn from(status: PostStatus) -> Self {
        status.code()
    }
}

/// Post entity - a blog post owned by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub publish: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub status: PostStatus,
    pub author_id: Uuid,
}

impl Post {
    /// Check the field constraints that every stored post must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.title, &self.slug, &self.body)
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Apply a partial update and bump `updated`.
    ///
    /// The result is validated; on error the post is left untouched.
    pub fn apply(&mut self, changes: PostChanges, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let mut next = self.clone();
        if let Some(title) = changes.title {
            next.title = title;
        }
        if let Some(slug) = changes.slug {
            next.slug = slug;
        }
        if let Some(body) = changes.body {
            next.body = body;
        }
        if let Some(publish) = changes.publish {
            next.publish = publish;
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        if let Some(author_id) = changes.author_id {
            next.author_id = author_id;
        }
        next.validate()?;

        next.created = self.created;
        next.updated = next_updated(self.updated, now);
        *self = next;
        Ok(())
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Input for creating a post. The store assigns `id`, `created` and `updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub author_id: Uuid,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
}

impl NewPost {
    pub fn new(
        author_id: Uuid,
        title: impl Into<String>,
        slug: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            body: body.into(),
            author_id,
            status: None,
            publish: None,
        }
    }

    /// Create a post whose slug is derived from its title.
    pub fn from_title(author_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
        let title = title.into();
        let slug = slugify(&title);
        Self::new(author_id, title, slug, body)
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_publish(mut self, publish: DateTime<Utc>) -> Self {
        self.publish = Some(publish);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.title, &self.slug, &self.body)
    }

    /// Materialize the stored record, applying defaults.
    pub fn into_post(self, id: i64, now: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title,
            slug: self.slug,
            body: self.body,
            publish: self.publish.unwrap_or(now),
            created: now,
            updated: now,
            status: self.status.unwrap_or_default(),
            author_id: self.author_id,
        }
    }
}

/// Partial update of a post. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub author_id: Option<Uuid>,
}

impl PostChanges {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn publish(mut self, publish: DateTime<Utc>) -> Self {
        self.publish = Some(publish);
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }
}

fn validate_fields(title: &str, slug: &str, body: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::Required { field: "title" });
    }
    let title_len = title.chars().count();
    if title_len > TITLE_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "title",
            max: TITLE_MAX_LEN,
            actual: title_len,
        });
    }

    if slug.is_empty() {
        return Err(ValidationError::Required { field: "slug" });
    }
    let slug_len = slug.chars().count();
    if slug_len > SLUG_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "slug",
            max: SLUG_MAX_LEN,
            actual: slug_len,
        });
    }
    if !is_valid_slug(slug) {
        return Err(ValidationError::InvalidSlug(slug.to_string()));
    }

    if body.trim().is_empty() {
        return Err(ValidationError::Required { field: "body" });
    }

    Ok(())
}
