//! Authenticated principal.

use gerai_core::UserId;

/// The authenticated user resolved from a bearer token.
///
/// Threaded explicitly through handlers via the
/// [`crate::middleware::auth`] extractor - never merged into request
/// payloads.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}
