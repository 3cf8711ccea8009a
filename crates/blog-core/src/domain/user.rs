use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum number of characters in a username.
pub const USERNAME_MAX_LEN: usize = 150;

/// User entity - the author a post belongs to.
///
/// Identity is owned elsewhere; the post store only needs the id, the
/// username for relationship lookups and the cascade hook on deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with generated ID and timestamps.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::Required { field: "username" });
        }
        let len = self.username.chars().count();
        if len > USERNAME_MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: USERNAME_MAX_LEN,
                actual: len,
            });
        }
        Ok(())
    }
}
