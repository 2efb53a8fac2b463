//! Authentication extractor.
//!
//! Every order endpoint requires a bearer token backed by an active row
//! in `user_sessions`. The resolved principal is an explicit
//! [`CurrentUser`] value handed to handlers as a typed extractor - auth
//! context is never smuggled through the request body.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::db::sessions;
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?;

        let user = sessions::find_user_by_token(state.pool(), token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid or expired session".to_owned()))?;

        Ok(Self(user))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/orders");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with_auth(Some("Bearer abc123"));
        assert_eq!(bearer_token(&parts), Some("abc123"));
    }

    #[test]
    fn test_missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_wrong_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic abc123"));
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_empty_token_yields_none() {
        let parts = parts_with_auth(Some("Bearer "));
        assert_eq!(bearer_token(&parts), None);
    }
}
