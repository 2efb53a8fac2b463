//! Seed command: sample catalog and a test account.
//!
//! Intended for local development only; every insert is keyed so
//! re-running the command is harmless.

use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{CommandError, connect};

/// Seed the database with a small catalog and a test user.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or an insert
/// fails.
pub async fn run() -> Result<(), CommandError> {
    tracing::info!("Connecting to database...");
    let pool = connect().await?;

    seed_catalog(&pool).await?;
    seed_test_user(&pool).await?;

    tracing::info!("Seed complete!");
    Ok(())
}

async fn seed_catalog(pool: &PgPool) -> Result<(), CommandError> {
    tracing::info!("Seeding catalog...");

    let colour_id: i64 = sqlx::query_scalar(
        r"
        INSERT INTO product_colours (name, hex)
        VALUES ('Charcoal', '#36454F')
        ON CONFLICT (name) DO UPDATE SET hex = EXCLUDED.hex
        RETURNING id
        ",
    )
    .fetch_one(pool)
    .await?;

    let product_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO products (title, description, base_price, category, gender, tags)
        VALUES ('Batik Overshirt', 'Hand-stamped batik overshirt', $1, 'tops', 'unisex', '["batik", "casual"]')
        ON CONFLICT (title) DO UPDATE SET base_price = EXCLUDED.base_price
        RETURNING id
        "#,
    )
    .bind(Decimal::from(250_000))
    .fetch_one(pool)
    .await?;

    for (size, stock, price) in [
        ("S", 10, Decimal::from(250_000)),
        ("M", 15, Decimal::from(250_000)),
        ("L", 5, Decimal::from(265_000)),
    ] {
        sqlx::query(
            r"
            INSERT INTO product_variants (product_id, colour_id, size, stock, price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id, colour_id, size) DO UPDATE SET price = EXCLUDED.price
            ",
        )
        .bind(product_id)
        .bind(colour_id)
        .bind(size)
        .bind(stock)
        .bind(price)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_test_user(pool: &PgPool) -> Result<(), CommandError> {
    tracing::info!("Seeding test user...");

    let user_id: i64 = sqlx::query_scalar(
        r"
        INSERT INTO users (username, password, email, is_verified)
        VALUES ('dev', 'not-a-real-hash', 'dev@example.test', TRUE)
        ON CONFLICT (email) DO UPDATE SET username = EXCLUDED.username
        RETURNING id
        ",
    )
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r"
        INSERT INTO user_addresses
            (user_id, name, phone, address, postal_code, district, city, province, is_default)
        SELECT $1, 'Dev Tester', '+620000000000', 'Jl. Contoh No. 1', '55281',
               'Depok', 'Sleman', 'DI Yogyakarta', TRUE
        WHERE NOT EXISTS (SELECT 1 FROM user_addresses WHERE user_id = $1)
        ",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        INSERT INTO user_sessions (user_id, token, user_agent, ip_address, is_active)
        VALUES ($1, 'dev-token', 'gerai-cli', '127.0.0.1', TRUE)
        ON CONFLICT (token) DO UPDATE SET is_active = TRUE
        ",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id, "test user ready (bearer token: dev-token)");
    Ok(())
}
