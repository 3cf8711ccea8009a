//! PostgreSQL repository implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
};
use uuid::Uuid;

use blog_core::domain::{NewPost, Post, PostChanges, User, now};
use blog_core::error::RepoError;
use blog_core::ports::{BaseRepository, PostRepository, UserRepository};
use blog_core::query::{DateKind, PostField, PostQuery};

use super::condition::{select_matching, select_window};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL user repository. Deleting a user removes their posts in the
/// same transaction.
pub struct PostgresUserRepository {
    base: PostgresBaseRepository<UserEntity>,
}

impl PostgresUserRepository {
    pub fn new(db: DbConn) -> Self {
        Self {
            base: PostgresBaseRepository::new(db),
        }
    }

    pub fn shared(db: Arc<DbConn>) -> Self {
        Self {
            base: PostgresBaseRepository::shared(db),
        }
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for PostgresUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        BaseRepository::<User, Uuid>::find_by_id(&self.base, id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let txn = self.base.conn().begin().await.map_err(map_db_err)?;

        let posts = PostEntity::delete_many()
            .filter(post::Column::AuthorId.eq(id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        let user = UserEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        if user.rows_affected == 0 {
            txn.rollback().await.map_err(map_db_err)?;
            return Err(RepoError::NotFound);
        }
        txn.commit().await.map_err(map_db_err)?;

        tracing::info!(user_id = %id, posts = posts.rows_affected, "Deleted user and their posts");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, RepoError> {
        user.validate()?;
        let model = user::ActiveModel::from(user)
            .insert(self.base.conn())
            .await
            .map_err(map_db_err)?;
        tracing::debug!(user_id = %model.id, "Created user");
        Ok(model.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.base.conn())
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, RepoError> {
        post.validate()?;
        let model = post::insert_model(post, now())
            .insert(self.conn())
            .await
            .map_err(map_db_err)?;
        tracing::debug!(post_id = model.id, slug = %model.slug, "Created post");
        Ok(model.into())
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Post, RepoError> {
        let mut post: Post = PostEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(map_db_err)?
            .ok_or(RepoError::NotFound)?
            .into();
        post.apply(changes, now())?;

        let model = post::ActiveModel::from(post)
            .update(self.conn())
            .await
            .map_err(map_db_err)?;
        tracing::debug!(post_id = id, "Updated post");
        Ok(model.into())
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let result = PostEntity::delete_many()
            .filter(post::Column::AuthorId.eq(author_id))
            .exec(self.conn())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected)
    }

    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError> {
        let result = select_window(query)?
            .all(self.conn())
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, RepoError> {
        // Counting wraps the windowed select, so limit and offset apply.
        select_window(query)?
            .count(self.conn())
            .await
            .map_err(map_db_err)
    }

    async fn delete_matching(&self, query: &PostQuery) -> Result<u64, RepoError> {
        if query.is_sliced() {
            return Err(RepoError::InvalidQuery(
                "cannot delete a sliced query".to_string(),
            ));
        }

        let ids = select_matching(query)?
            .select_only()
            .column(post::Column::Id)
            .into_query();
        let result = PostEntity::delete_many()
            .filter(post::Column::Id.in_subquery(ids))
            .exec(self.conn())
            .await
            .map_err(map_db_err)?;

        tracing::info!(rows = result.rows_affected, "Deleted matching posts");
        Ok(result.rows_affected)
    }

    async fn dates(
        &self,
        query: &PostQuery,
        field: PostField,
        kind: DateKind,
    ) -> Result<Vec<NaiveDate>, RepoError> {
        let column = match field {
            PostField::Publish => post::Column::Publish,
            PostField::Created => post::Column::Created,
            PostField::Updated => post::Column::Updated,
            _ => {
                return Err(RepoError::InvalidQuery(format!(
                    "'{field}' is not a timestamp field"
                )));
            }
        };
        let bucket = Expr::cust_with_exprs(
            format!(
                "DATE_TRUNC('{}', $1 AT TIME ZONE 'UTC')::date",
                kind.name()
            ),
            [Expr::col((PostEntity, column)).into()],
        );

        select_matching(query)?
            .select_only()
            .column_as(bucket, "bucket")
            .distinct()
            .order_by(SimpleExpr::from(Expr::col(Alias::new("bucket"))), Order::Asc)
            .into_tuple::<NaiveDate>()
            .all(self.conn())
            .await
            .map_err(map_db_err)
    }

    async fn author_counts(&self, query: &PostQuery) -> Result<Vec<(Uuid, u64)>, RepoError> {
        let rows = select_matching(query)?
            .select_only()
            .column(post::Column::AuthorId)
            .column_as(Expr::col((PostEntity, post::Column::Id)).count(), "posts")
            .group_by(post::Column::AuthorId)
            .order_by_asc(post::Column::AuthorId)
            .into_tuple::<(Uuid, i64)>()
            .all(self.conn())
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|(author_id, n)| (author_id, n.max(0) as u64))
            .collect())
    }
}
