//! Post handlers.
//!
//! Listing endpoints read filters from the query string as
//! `field__lookup=value` pairs (`title__istartswith=Hello`,
//! `publish__year=2025`, `!status=PB` to exclude) plus the reserved keys
//! `ordering`, `offset` and `limit`.

use actix_web::{HttpResponse, web};

use blog_core::domain::{NewPost, Post, PostChanges, PostStatus, slugify};
use blog_core::error::RepoError;
use blog_core::query::PostQuery;
use blog_shared::dto::{
    CountResponse, CreatePostRequest, ExistsResponse, PostListResponse, PostResponse,
    UpdatePostRequest,
};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

type Pairs = web::Query<Vec<(String, String)>>;

pub(super) fn post_response(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title,
        slug: post.slug,
        body: post.body,
        publish: post.publish,
        created: post.created,
        updated: post.updated,
        status: post.status.code().to_string(),
        status_label: post.status.label().to_string(),
        author_id: post.author_id,
    }
}

fn parse_query(pairs: &Pairs) -> Result<PostQuery, RepoError> {
    PostQuery::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

fn parse_status(raw: Option<String>) -> AppResult<Option<PostStatus>> {
    Ok(raw.map(|s| s.parse::<PostStatus>()).transpose()?)
}

fn not_found(id: i64) -> impl FnOnce(RepoError) -> AppError {
    move |err| match err {
        RepoError::NotFound => AppError::NotFound(format!("Post {id} not found")),
        other => other.into(),
    }
}

/// GET /api/posts
pub async fn list_posts(state: web::Data<AppState>, query: Pairs) -> AppResult<HttpResponse> {
    let query = parse_query(&query)?;
    let posts = state.posts.list(&query).await?;
    let total = state.posts.count(&query.unsliced()).await?;

    Ok(HttpResponse::Ok().json(PostListResponse {
        posts: posts.into_iter().map(post_response).collect(),
        total,
    }))
}

/// GET /api/posts/count
pub async fn count_posts(state: web::Data<AppState>, query: Pairs) -> AppResult<HttpResponse> {
    let count = state.posts.count(&parse_query(&query)?).await?;
    Ok(HttpResponse::Ok().json(CountResponse { count }))
}

/// GET /api/posts/exists
pub async fn posts_exist(state: web::Data<AppState>, query: Pairs) -> AppResult<HttpResponse> {
    let exists = state.posts.exists(&parse_query(&query)?).await?;
    Ok(HttpResponse::Ok().json(ExistsResponse { exists }))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let status = parse_status(req.status)?;
    let slug = req
        .slug
        .or_else(|| state.admin.prepopulate_slug(&req.title))
        .unwrap_or_else(|| slugify(&req.title));

    let mut post = NewPost::new(req.author_id, req.title, slug, req.body);
    post.status = status;
    post.publish = req.publish;

    let post = state.posts.create(post).await?;
    tracing::info!(post_id = post.id, author_id = %post.author_id, "Created post");
    Ok(HttpResponse::Created().json(post_response(post)))
}

/// GET /api/posts/{id}
pub async fn get_post(state: web::Data<AppState>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let post = state.posts.get(id).await.map_err(not_found(id))?;
    Ok(HttpResponse::Ok().json(post_response(post)))
}

/// PATCH /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let req = body.into_inner();
    let changes = PostChanges {
        status: parse_status(req.status)?,
        title: req.title,
        slug: req.slug,
        body: req.body,
        publish: req.publish,
        author_id: req.author_id,
    };

    let post = state.posts.update(id, changes).await.map_err(not_found(id))?;
    tracing::info!(post_id = id, "Updated post");
    Ok(HttpResponse::Ok().json(post_response(post)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    state.posts.delete(id).await.map_err(not_found(id))?;
    tracing::info!(post_id = id, "Deleted post");
    Ok(HttpResponse::NoContent().finish())
}
