//! Application state - shared across all handlers.

use std::sync::Arc;

use blog_core::admin::PostAdmin;
use blog_core::ports::{PostRepository, UserRepository};
use blog_infra::database::InMemoryBlogStore;

#[cfg(feature = "postgres")]
use blog_infra::database::DatabaseConnections;

use crate::config::AppConfig;

type Repositories = (Arc<dyn PostRepository>, Arc<dyn UserRepository>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub users: Arc<dyn UserRepository>,
    pub admin: Arc<PostAdmin>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let admin = PostAdmin {
            list_per_page: config.admin_list_per_page,
            ..PostAdmin::default()
        };

        match connect(config).await {
            Some((posts, users)) => {
                tracing::info!("Application state initialized (postgres)");
                Self {
                    posts,
                    users,
                    admin: Arc::new(admin),
                }
            }
            None => {
                tracing::info!("Application state initialized (in-memory)");
                Self::in_memory(InMemoryBlogStore::new(), admin)
            }
        }
    }

    /// State backed by an in-memory store.
    pub fn in_memory(store: InMemoryBlogStore, admin: PostAdmin) -> Self {
        Self {
            posts: Arc::new(store.posts()),
            users: Arc::new(store.users()),
            admin: Arc::new(admin),
        }
    }
}

#[cfg(feature = "postgres")]
async fn connect(config: &AppConfig) -> Option<Repositories> {
    let Some(db_config) = &config.database else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return None;
    };

    match DatabaseConnections::init(db_config).await {
        Ok(connections) => {
            let posts: Arc<dyn PostRepository> = Arc::new(connections.post_repository());
            let users: Arc<dyn UserRepository> = Arc::new(connections.user_repository());
            Some((posts, users))
        }
        Err(e) => {
            tracing::error!(
                "Failed to connect to database: {}. Using in-memory fallback.",
                e
            );
            None
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn connect(config: &AppConfig) -> Option<Repositories> {
    if config.database.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without postgres feature");
    }
    None
}
