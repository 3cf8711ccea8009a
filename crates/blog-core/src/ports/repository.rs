use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{NewPost, Post, PostChanges, User};
use crate::error::RepoError;
use crate::query::{DateKind, PostField, PostQuery, Q};

/// Generic repository trait defining the operations shared by every entity.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync
where
    T: Send + 'static,
    ID: Send + 'static,
{
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Like `find_by_id`, but a missing entity is an error.
    async fn get(&self, id: ID) -> Result<T, RepoError> {
        self.find_by_id(id).await?.ok_or(RepoError::NotFound)
    }

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// Author store. Deleting a user removes all of their posts first, in the
/// same transaction.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Insert a new user. Usernames are unique.
    async fn create(&self, user: User) -> Result<User, RepoError>;

    /// Find a user by their username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
}

/// Post store.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, i64> {
    /// Validate and insert a post. The store assigns the id and timestamps.
    async fn create(&self, post: NewPost) -> Result<Post, RepoError>;

    /// Apply `changes`, validate the result and bump `updated`.
    async fn update(&self, id: i64, changes: PostChanges) -> Result<Post, RepoError>;

    /// Remove every post written by `author_id`. Returns the number removed.
    async fn delete_by_author(&self, author_id: Uuid) -> Result<u64, RepoError>;

    /// Materialize the posts selected by `query`.
    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError>;

    /// Number of posts selected by `query`, window included.
    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError>;

    /// Whether `query` selects at least one post.
    async fn exists(&self, query: &PostQuery) -> Result<bool, RepoError> {
        let probe = query.clone().first();
        Ok(!self.list(&probe).await?.is_empty())
    }

    /// Delete every post selected by `query`. Sliced queries are rejected.
    async fn delete_matching(&self, query: &PostQuery) -> Result<u64, RepoError>;

    /// Distinct `kind` buckets of `field` across posts matching the filter,
    /// ascending. The window is ignored.
    async fn dates(
        &self,
        query: &PostQuery,
        field: PostField,
        kind: DateKind,
    ) -> Result<Vec<NaiveDate>, RepoError>;

    /// Posts per author across posts matching the filter, ordered by author
    /// id. The window is ignored.
    async fn author_counts(&self, query: &PostQuery) -> Result<Vec<(Uuid, u64)>, RepoError>;

    /// Find a post by its slug.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let query = PostQuery::all()
            .filter(Q::exact(PostField::Slug, slug))
            .first();
        Ok(self.list(&query).await?.into_iter().next())
    }
}
