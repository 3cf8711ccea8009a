//! # Blog Shared
//!
//! Wire types of the blog HTTP API.
//! Kept free of domain dependencies so clients can compile it on its own.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
