//! HTTP handlers and route configuration.

mod admin;
mod health;
mod posts;
mod users;

use actix_web::web;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/users")
                    .route("", web::post().to(users::create_user))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}", web::delete().to(users::delete_user)),
            )
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    .route("/count", web::get().to(posts::count_posts))
                    .route("/exists", web::get().to(posts::posts_exist))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}", web::patch().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post)),
            )
            .route("/admin/posts", web::get().to(admin::changelist)),
    );
}

/// Malformed query strings become RFC 7807 bad requests.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| AppError::BadRequest(err.to_string()).into())
}

/// Malformed JSON bodies become RFC 7807 bad requests.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::BadRequest(err.to_string()).into())
}
