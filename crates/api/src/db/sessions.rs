//! Bearer-token principal lookup.
//!
//! Token issuance is handled elsewhere; this module only resolves an
//! opaque token from the `Authorization` header into a user row.

use sqlx::{PgPool, Row};

use gerai_core::UserId;

use super::RepositoryError;
use crate::models::CurrentUser;

/// Resolve an active session token to its user.
///
/// Returns `None` for unknown or deactivated tokens.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_user_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<CurrentUser>, RepositoryError> {
    let row = sqlx::query(
        r"
        SELECT u.id, u.email
        FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1 AND s.is_active
        ",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(CurrentUser {
            id: UserId::new(row.try_get("id")?),
            email: row.try_get("email")?,
        })),
        None => Ok(None),
    }
}
