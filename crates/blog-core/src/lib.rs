//! # Blog Core
//!
//! The domain layer of the blog post store.
//! This crate contains the post model, its validation rules, the query model
//! and the repository ports. It has zero infrastructure dependencies.

pub mod admin;
pub mod domain;
pub mod error;
pub mod ports;
pub mod query;

pub use error::{RepoError, ValidationError};
