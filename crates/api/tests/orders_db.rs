//! Database-backed integration tests for the order workflow.
//!
//! These tests need a migrated `PostgreSQL` database and are ignored by
//! default. Run them with:
//!
//! ```bash
//! GERAI_DATABASE_URL=postgres://localhost/gerai_test \
//!     cargo test -p gerai-api -- --ignored --test-threads=1
//! ```
//!
//! The queue tests claim from the shared `payment_checks` table, so the
//! suite must run single-threaded.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;

use gerai_api::db::{orders, sessions, variants};
use gerai_api::queue::{PaymentCheckConsumer, PaymentCheckQueue, Reconciliation};
use gerai_core::{AddressId, OrderStatus, UserId, VariantId};

async fn test_pool() -> PgPool {
    let url = std::env::var("GERAI_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set GERAI_DATABASE_URL to run database tests");
    PgPool::connect(&url).await.expect("connect test database")
}

/// A seeded user with one address and one fresh variant.
struct Fixture {
    user_id: UserId,
    address_id: AddressId,
    variant_id: VariantId,
    price: Decimal,
}

/// Seed an isolated user/address/product/variant combination. Unique
/// suffixes keep concurrent test runs from colliding.
async fn seed(pool: &PgPool, tag: &str, stock: i32) -> Fixture {
    let suffix = format!("{tag}-{}", chrono_nanos());

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, password, email)
         VALUES ($1, 'x', $2) RETURNING id",
    )
    .bind(format!("u-{suffix}"))
    .bind(format!("u-{suffix}@test.invalid"))
    .fetch_one(pool)
    .await
    .unwrap();

    let address_id: i64 = sqlx::query_scalar(
        "INSERT INTO user_addresses
             (user_id, name, phone, address, postal_code, district, city, province)
         VALUES ($1, 'T', '0', 'st', '55281', 'd', 'c', 'p') RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let colour_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_colours (name, hex) VALUES ($1, '#000') RETURNING id",
    )
    .bind(format!("colour-{suffix}"))
    .fetch_one(pool)
    .await
    .unwrap();

    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (title, base_price, category, gender)
         VALUES ($1, 100, 'tops', 'unisex') RETURNING id",
    )
    .bind(format!("product-{suffix}"))
    .fetch_one(pool)
    .await
    .unwrap();

    let price = Decimal::from(16_000);
    let variant_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_variants (product_id, colour_id, size, stock, price)
         VALUES ($1, $2, 'M', $3, $4) RETURNING id",
    )
    .bind(product_id)
    .bind(colour_id)
    .bind(stock)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap();

    Fixture {
        user_id: UserId::new(user_id),
        address_id: AddressId::new(address_id),
        variant_id: VariantId::new(variant_id),
        price,
    }
}

/// Add a second variant (different size) to the product behind an
/// existing variant.
async fn seed_second_variant(pool: &PgPool, sibling: VariantId, stock: i32) -> VariantId {
    let variant_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_variants (product_id, colour_id, size, stock, price)
         SELECT product_id, colour_id, 'L', $2, 19000
         FROM product_variants WHERE id = $1
         RETURNING id",
    )
    .bind(sibling)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap();

    VariantId::new(variant_id)
}

fn chrono_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

async fn stock_of(pool: &PgPool, variant_id: VariantId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn shipping_detail() -> gerai_api::models::ShippingDetail {
    gerai_api::models::ShippingDetail {
        name: "Jalur Nugraha Ekakurir (JNE)".into(),
        code: "jne".into(),
        service: "REG".into(),
        description: "Layanan Reguler".into(),
        etd: "2-3 day".into(),
    }
}

/// A payment-check delay far enough out that only tests which opt in to
/// `Duration::ZERO` ever see their message become due.
const NEVER_DUE: Duration = Duration::from_secs(3600);

/// Place an order directly through the repositories: reserve, insert,
/// enqueue, commit. Mirrors the service's transaction shape without the
/// outbound HTTP calls.
async fn place_order(pool: &PgPool, fixture: &Fixture, quantity: i32, check_delay: Duration) {
    let queue = PaymentCheckQueue::new(pool.clone(), Duration::from_secs(60));
    let mut tx = pool.begin().await.unwrap();

    let price = variants::reserve(&mut tx, fixture.variant_id, quantity)
        .await
        .unwrap();
    let item = orders::NewOrderItem {
        variant_id: fixture.variant_id,
        quantity,
        price,
    };
    let order = orders::create(
        &mut tx,
        fixture.user_id,
        fixture.address_id,
        price * Decimal::from(quantity),
        Decimal::from(18_000),
        &shipping_detail(),
        &[item],
    )
    .await
    .unwrap();
    queue
        .enqueue(&mut tx, order.order.id, check_delay)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_place_order_decrements_stock_and_snapshots_total() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "roundtrip", 5).await;

    place_order(&pool, &fixture, 3, NEVER_DUE).await;

    assert_eq!(stock_of(&pool, fixture.variant_id).await, 2);

    let (placed, total) = orders::list_for_user(&pool, fixture.user_id, None, 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
    let order = &placed[0];
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.total, fixture.price * Decimal::from(3));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(order.items[0].price, fixture.price);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_insufficient_stock_leaves_stock_unchanged() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "insufficient", 2).await;

    let mut tx = pool.begin().await.unwrap();
    let result = variants::reserve(&mut tx, fixture.variant_id, 3).await;
    assert!(matches!(
        result,
        Err(variants::LedgerError::Insufficient {
            requested: 3,
            available: 2,
            ..
        })
    ));
    drop(tx);

    assert_eq!(stock_of(&pool, fixture.variant_id).await, 2);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_concurrent_reservations_for_last_unit() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "race", 1).await;

    let (a, b) = tokio::join!(
        async {
            let mut tx = pool.begin().await.unwrap();
            let result = variants::reserve(&mut tx, fixture.variant_id, 1).await;
            if result.is_ok() {
                tx.commit().await.unwrap();
            }
            result
        },
        async {
            let mut tx = pool.begin().await.unwrap();
            let result = variants::reserve(&mut tx, fixture.variant_id, 1).await;
            if result.is_ok() {
                tx.commit().await.unwrap();
            }
            result
        }
    );

    assert_eq!(
        u8::from(a.is_ok()) + u8::from(b.is_ok()),
        1,
        "exactly one of two racing reservations must win"
    );
    assert_eq!(stock_of(&pool, fixture.variant_id).await, 0);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_reconciliation_releases_stock_and_cancels() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "reconcile", 5).await;
    let queue = PaymentCheckQueue::new(pool.clone(), Duration::from_secs(60));

    place_order(&pool, &fixture, 2, Duration::ZERO).await;
    assert_eq!(stock_of(&pool, fixture.variant_id).await, 3);

    // The payment check was enqueued with zero delay, so it is claimable.
    let message = queue.claim().await.unwrap().expect("due message");

    let consumer =
        PaymentCheckConsumer::new(pool.clone(), queue.clone(), Duration::from_secs(1));
    let outcome = consumer.reconcile(message.order_id).await.unwrap();
    assert_eq!(outcome, Reconciliation::Released { items: 1 });
    queue.ack(message.id).await.unwrap();

    assert_eq!(stock_of(&pool, fixture.variant_id).await, 5);

    // A duplicate delivery now fails the status guard, so no extra credit.
    let outcome = consumer.reconcile(message.order_id).await.unwrap();
    assert_eq!(
        outcome,
        Reconciliation::AlreadySettled(OrderStatus::Cancelled)
    );
    assert_eq!(stock_of(&pool, fixture.variant_id).await, 5);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_reconciliation_releases_every_line_item() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "multi", 5).await;
    let second_variant = seed_second_variant(&pool, fixture.variant_id, 4).await;
    let queue = PaymentCheckQueue::new(pool.clone(), Duration::from_secs(60));

    // Two line items across two variants: qty 2 and qty 1.
    let mut tx = pool.begin().await.unwrap();
    let price_a = variants::reserve(&mut tx, fixture.variant_id, 2)
        .await
        .unwrap();
    let price_b = variants::reserve(&mut tx, second_variant, 1).await.unwrap();
    let order = orders::create(
        &mut tx,
        fixture.user_id,
        fixture.address_id,
        price_a * Decimal::from(2) + price_b,
        Decimal::from(18_000),
        &shipping_detail(),
        &[
            orders::NewOrderItem {
                variant_id: fixture.variant_id,
                quantity: 2,
                price: price_a,
            },
            orders::NewOrderItem {
                variant_id: second_variant,
                quantity: 1,
                price: price_b,
            },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stock_of(&pool, fixture.variant_id).await, 3);
    assert_eq!(stock_of(&pool, second_variant).await, 3);

    let consumer =
        PaymentCheckConsumer::new(pool.clone(), queue.clone(), Duration::from_secs(1));
    let outcome = consumer.reconcile(order.order.id).await.unwrap();
    assert_eq!(outcome, Reconciliation::Released { items: 2 });

    // Both variants get their respective quantities back.
    assert_eq!(stock_of(&pool, fixture.variant_id).await, 5);
    assert_eq!(stock_of(&pool, second_variant).await, 4);

    let reloaded = orders::get_for_user(&pool, fixture.user_id, order.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.order.status, OrderStatus::Cancelled);

    // Redelivery credits nothing further.
    let outcome = consumer.reconcile(order.order.id).await.unwrap();
    assert_eq!(
        outcome,
        Reconciliation::AlreadySettled(OrderStatus::Cancelled)
    );
    assert_eq!(stock_of(&pool, fixture.variant_id).await, 5);
    assert_eq!(stock_of(&pool, second_variant).await, 4);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_paid_order_is_not_reconciled() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "paid", 4).await;

    place_order(&pool, &fixture, 1, NEVER_DUE).await;

    let (placed, _) = orders::list_for_user(&pool, fixture.user_id, None, 1, 10)
        .await
        .unwrap();
    let order_id = placed[0].order.id;

    let mut conn = pool.acquire().await.unwrap();
    orders::set_status(&mut conn, order_id, OrderStatus::Paid)
        .await
        .unwrap();
    drop(conn);

    let mut tx = pool.begin().await.unwrap();
    let status = orders::lock_status(&mut tx, order_id).await.unwrap().unwrap();
    assert_eq!(status, OrderStatus::Paid);
    assert!(!status.holds_reservation(), "paid orders keep their stock");
    drop(tx);

    assert_eq!(stock_of(&pool, fixture.variant_id).await, 3);
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_queue_nack_delays_redelivery() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "nack", 3).await;
    let queue = PaymentCheckQueue::new(pool.clone(), Duration::from_secs(60));

    place_order(&pool, &fixture, 1, Duration::ZERO).await;

    let message = queue.claim().await.unwrap().expect("due message");
    assert_eq!(message.attempts, 1);

    queue.nack(message.id, message.attempts).await.unwrap();

    // The backoff pushed deliver_after into the future.
    let due: bool = sqlx::query_scalar(
        "SELECT deliver_after <= now() FROM payment_checks WHERE id = $1",
    )
    .bind(message.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!due, "nacked message must not be immediately redeliverable");

    queue.ack(message.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_session_token_lookup() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "session", 1).await;
    let token = format!("token-{}", chrono_nanos());

    sqlx::query(
        "INSERT INTO user_sessions (user_id, token, is_active) VALUES ($1, $2, TRUE)",
    )
    .bind(fixture.user_id)
    .bind(&token)
    .execute(&pool)
    .await
    .unwrap();

    let user = sessions::find_user_by_token(&pool, &token)
        .await
        .unwrap()
        .expect("active session resolves");
    assert_eq!(user.id, fixture.user_id);

    sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE token = $1")
        .bind(&token)
        .execute(&pool)
        .await
        .unwrap();

    let user = sessions::find_user_by_token(&pool, &token).await.unwrap();
    assert!(user.is_none(), "deactivated tokens must not resolve");
}

#[tokio::test]
#[ignore = "requires a migrated PostgreSQL database"]
async fn test_order_listing_filters_by_status_and_owner() {
    let pool = test_pool().await;
    let fixture = seed(&pool, "listing", 10).await;
    let stranger = seed(&pool, "stranger", 1).await;

    place_order(&pool, &fixture, 1, NEVER_DUE).await;
    place_order(&pool, &fixture, 2, NEVER_DUE).await;

    let (all, total) = orders::list_for_user(&pool, fixture.user_id, None, 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);

    let (pending, _) =
        orders::list_for_user(&pool, fixture.user_id, Some(OrderStatus::Pending), 1, 10)
            .await
            .unwrap();
    assert_eq!(pending.len(), 2);

    let (paid, _) = orders::list_for_user(&pool, fixture.user_id, Some(OrderStatus::Paid), 1, 10)
        .await
        .unwrap();
    assert!(paid.is_empty());

    // Another user's order is invisible.
    let other = orders::get_for_user(&pool, stranger.user_id, all[0].order.id)
        .await
        .unwrap();
    assert!(other.is_none());
}
