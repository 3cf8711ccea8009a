//! Domain entities - the core business objects.

mod post;
mod slug;
mod user;

pub use post::{
    NewPost, Post, PostChanges, PostStatus, SLUG_MAX_LEN, TITLE_MAX_LEN, next_updated, now,
};
pub use slug::{is_valid_slug, slugify};
pub use user::{USERNAME_MAX_LEN, User};
