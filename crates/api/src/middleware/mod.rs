//! Middleware and request extractors.

pub mod auth;

pub use auth::RequireAuth;
