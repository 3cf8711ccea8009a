//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to register an author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

/// Response containing an author's public information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Request to create a post.
///
/// `slug` defaults to the slugified title; `status` accepts a code (`DF`,
/// `PB`) or a label (`Draft`, `Published`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub body: String,
    pub author_id: Uuid,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
}

/// Partial update of a post. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub publish: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Stored code, `DF` or `PB`.
    pub status: String,
    pub status_label: String,
    pub author_id: Uuid,
}

/// A window of posts and the number of posts matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_post_request_optional_fields() {
        let json = r#"{
            "title": "Hello World",
            "body": "Body",
            "author_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"
        }"#;
        let req: CreatePostRequest = serde_json::from_str(json).unwrap();
        assert!(req.slug.is_none());
        assert!(req.status.is_none());
        assert!(req.publish.is_none());
    }

    #[test]
    fn test_update_request_defaults_to_no_changes() {
        let req: UpdatePostRequest = serde_json::from_str("{}").unwrap();
        assert!(req.title.is_none() && req.status.is_none() && req.author_id.is_none());
    }
}
