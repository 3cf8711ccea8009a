//! In-memory blog store - used when no database is configured and in tests.
//!
//! Posts and users share one state behind an async `RwLock`, so the
//! author relationship and cascade delete behave like the SQL schema.
//! Note: Data is lost on process restart.

mod eval;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use blog_core::domain::{NewPost, Post, PostChanges, User, now};
use blog_core::error::RepoError;
use blog_core::ports::{BaseRepository, PostRepository, UserRepository};
use blog_core::query::{DateKind, FieldKind, PostField, PostQuery};

use eval::{Matcher, Row, sort_rows};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    posts: BTreeMap<i64, Post>,
    last_post_id: i64,
}

impl State {
    fn ensure_author(&self, author_id: Uuid) -> Result<(), RepoError> {
        if self.users.contains_key(&author_id) {
            Ok(())
        } else {
            Err(RepoError::Constraint(format!(
                "author {author_id} does not exist"
            )))
        }
    }

    fn ensure_unique_slug(&self, slug: &str, except: Option<i64>) -> Result<(), RepoError> {
        let taken = self
            .posts
            .values()
            .any(|p| p.slug == slug && Some(p.id) != except);
        if taken {
            Err(RepoError::Constraint(format!("slug '{slug}' already exists")))
        } else {
            Ok(())
        }
    }

    fn row<'a>(&'a self, post: &'a Post) -> Row<'a> {
        Row {
            post,
            author: self.users.get(&post.author_id),
        }
    }

    /// Posts matching the filter, in id order.
    fn matching<'a>(&'a self, matcher: &Matcher<'_>) -> Vec<Row<'a>> {
        self.posts
            .values()
            .map(|p| self.row(p))
            .filter(|row| matcher.matches(row))
            .collect()
    }

    /// Posts selected by `query`: filtered, ordered and windowed.
    fn select<'a>(&'a self, query: &PostQuery) -> Result<Vec<&'a Post>, RepoError> {
        let matcher = Matcher::new(&query.filter)?;
        let mut rows: Vec<_> = self
            .matching(&matcher)
            .into_iter()
            .map(|row| (row, rand::random::<u64>()))
            .collect();
        sort_rows(&mut rows, query.effective_ordering());

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(row, _)| row.post)
            .collect())
    }
}

/// Shared in-memory storage for posts and users.
#[derive(Clone, Default)]
pub struct InMemoryBlogStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post repository over this store.
    pub fn posts(&self) -> InMemoryPostRepository {
        InMemoryPostRepository {
            state: Arc::clone(&self.state),
        }
    }

    /// User repository over this store.
    pub fn users(&self) -> InMemoryUserRepository {
        InMemoryUserRepository {
            state: Arc::clone(&self.state),
        }
    }
}

/// In-memory [`PostRepository`].
#[derive(Clone)]
pub struct InMemoryPostRepository {
    state: Arc<RwLock<State>>,
}

/// In-memory [`UserRepository`].
#[derive(Clone)]
pub struct InMemoryUserRepository {
    state: Arc<RwLock<State>>,
}

#[async_trait]
impl BaseRepository<Post, i64> for InMemoryPostRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.posts.remove(&id).ok_or(RepoError::NotFound)?;
        tracing::debug!(post_id = id, "Deleted post");
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, RepoError> {
        post.validate()?;

        let mut state = self.state.write().await;
        state.ensure_author(post.author_id)?;
        state.ensure_unique_slug(&post.slug, None)?;

        state.last_post_id += 1;
        let post = post.into_post(state.last_post_id, now());
        state.posts.insert(post.id, post.clone());

        tracing::debug!(post_id = post.id, slug = %post.slug, "Created post");
        Ok(post)
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        let mut post = state.posts.get(&id).cloned().ok_or(RepoError::NotFound)?;

        if let Some(author_id) = changes.author_id {
            state.ensure_author(author_id)?;
        }
        post.apply(changes, now())?;
        state.ensure_unique_slug(&post.slug, Some(id))?;

        state.posts.insert(id, post.clone());
        tracing::debug!(post_id = id, "Updated post");
        Ok(post)
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let before = state.posts.len();
        state.posts.retain(|_, p| p.author_id != author_id);
        Ok((before - state.posts.len()) as u64)
    }

    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError> {
        let state = self.state.read().await;
        Ok(state.select(query)?.into_iter().cloned().collect())
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.select(query)?.len() as u64)
    }

    async fn delete_matching(&self, query: &PostQuery) -> Result<u64, RepoError> {
        if query.is_sliced() {
            return Err(RepoError::InvalidQuery(
                "cannot delete a sliced query".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let ids: Vec<i64> = state.select(query)?.into_iter().map(|p| p.id).collect();
        for id in &ids {
            state.posts.remove(id);
        }

        tracing::info!(rows = ids.len(), "Deleted matching posts");
        Ok(ids.len() as u64)
    }

    async fn dates(
        &self,
        query: &PostQuery,
        field: PostField,
        kind: DateKind,
    ) -> Result<Vec<NaiveDate>, RepoError> {
        if field.kind() != FieldKind::Timestamp {
            return Err(RepoError::InvalidQuery(format!(
                "'{field}' is not a timestamp field"
            )));
        }

        let state = self.state.read().await;
        let matcher = Matcher::new(&query.filter)?;
        let buckets: BTreeSet<NaiveDate> = state
            .matching(&matcher)
            .into_iter()
            .map(|row| {
                let ts = match field {
                    PostField::Created => row.post.created,
                    PostField::Updated => row.post.updated,
                    _ => row.post.publish,
                };
                kind.truncate(ts.date_naive())
            })
            .collect();
        Ok(buckets.into_iter().collect())
    }

    async fn author_counts(&self, query: &PostQuery) -> Result<Vec<(Uuid, u64)>, RepoError> {
        let state = self.state.read().await;
        let matcher = Matcher::new(&query.filter)?;
        let mut counts: BTreeMap<Uuid, u64> = BTreeMap::new();
        for row in state.matching(&matcher) {
            *counts.entry(row.post.author_id).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }

        let before = state.posts.len();
        state.posts.retain(|_, p| p.author_id != id);
        let removed = before - state.posts.len();
        state.users.remove(&id);

        tracing::info!(user_id = %id, posts = removed, "Deleted user and their posts");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepoError> {
        user.validate()?;

        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::Constraint(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        state.users.insert(user.id, user.clone());
        tracing::debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }
}

#[cfg(test)]
mod tests;
