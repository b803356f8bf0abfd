use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{BookingDetailRow, ROLE_ADMIN},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    if env::var("SEED_DEMO_DATA").unwrap_or_default() == "true" {
        seed_demo(pool).await?;
    }
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let result = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;

    if let Err(err) = result {
        log::warn!("activity log failed: {err}");
    }
}

pub async fn fetch_booking_detail(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Option<BookingDetailRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingDetailRow>(
        r#"SELECT b.id, b.customer_name, b.customer_phone, b.customer_email,
                  b.service_id, b.barber_id, b.date, b.time_slot_id, b.status,
                  b.notes, b.created_at, b.completed_at,
                  s.name AS service_name,
                  br.name AS barber_name
           FROM bookings b
           LEFT JOIN services s ON b.service_id = s.id
           LEFT JOIN barbers br ON b.barber_id = br.id
           WHERE b.id = ?
           LIMIT 1"#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_ADMIN)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@hairsalon.com".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let name = env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());

    if password == "admin123" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin123'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_demo(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM services LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let now = Utc::now().to_rfc3339();

    let services = [
        ("Haircut", "Classic cut with wash and styling", 128.0_f64, 45_i64),
        ("Perm", "Full perm with wash and aftercare", 388.0, 120),
        ("Hair Coloring", "Single-process color with treatment", 488.0, 150),
    ];
    for (name, description, price, duration) in services {
        sqlx::query(
            r#"INSERT INTO services (id, name, description, price, duration, image_url, active, created_at)
               VALUES (?, ?, ?, ?, ?, '', 1, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(duration)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    let barbers = [
        ("Tony", "Creative Director", "Fifteen years behind the chair, precision cuts"),
        ("Kevin", "Senior Stylist", "Color and perm specialist"),
        ("Alex", "Stylist", "Fades and modern styles"),
    ];
    for (name, title, description) in barbers {
        sqlx::query(
            r#"INSERT INTO barbers (id, name, title, description, image_url, active, created_at)
               VALUES (?, ?, ?, ?, '', 1, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(title)
        .bind(description)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    log::info!("seeded demo services and barbers");
    Ok(())
}
