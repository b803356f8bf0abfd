use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::auth::new_id;
use crate::db;

// In-memory SQLite gives every connection its own database, so the pool is
// pinned to a single connection.
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub(crate) async fn insert_service(pool: &SqlitePool, name: &str, duration: i64) -> String {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO services (id, name, description, price, duration, image_url, active, created_at)
           VALUES (?, ?, '', 100.0, ?, '', 1, ?)"#,
    )
    .bind(&id)
    .bind(name)
    .bind(duration)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub(crate) async fn insert_barber(pool: &SqlitePool, name: &str) -> String {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO barbers (id, name, title, description, image_url, active, created_at)
           VALUES (?, ?, 'Stylist', '', '', 1, ?)"#,
    )
    .bind(&id)
    .bind(name)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
    id
}

pub(crate) async fn insert_booking(
    pool: &SqlitePool,
    service_id: &str,
    barber_id: &str,
    date: &str,
    time_slot_id: &str,
    status: &str,
) -> String {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings (id, customer_name, customer_phone, customer_email,
                                 service_id, barber_id, date, time_slot_id, status,
                                 notes, created_at, completed_at)
           VALUES (?, 'Jane Doe', '5551234', 'jane@example.com', ?, ?, ?, ?, ?, '', ?, NULL)"#,
    )
    .bind(&id)
    .bind(service_id)
    .bind(barber_id)
    .bind(date)
    .bind(time_slot_id)
    .bind(status)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
    id
}
