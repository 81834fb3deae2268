//! HTTP surface of the sequence service.
//!
//! ## Structure
//!
//! - [`handler`] - axum routes over a shared [`handler::AppState`].
//! - [`error`] - [`error::ApiError`] and its HTTP mapping.

pub mod error;
pub mod handler;
