use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::auth::new_id;
use crate::db::{fetch_booking_detail, log_activity};
use crate::errors::ApiError;
use crate::models::{BookingDetailRow, BookingStatus};
use crate::notify;
use crate::slots::{day_key, parse_day};
use crate::state::AppState;

pub const SLOT_TAKEN: &str = "This time slot is already booked";

/// Booking submission. Struct-level default so a missing field reads as
/// empty and shows up in the collected validation errors instead of a
/// deserializer rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBooking {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub service_id: String,
    pub barber_id: String,
    pub date: String,
    pub time_slot_id: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusChange {
    pub status: String,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingFilters {
    pub status: Option<String>,
    pub date: Option<String>,
    pub barber_id: Option<String>,
    pub service_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub barber_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barber_name: Option<String>,
    pub date: String,
    pub time_slot_id: String,
    pub status: String,
    pub notes: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<BookingDetailRow> for BookingView {
    fn from(row: BookingDetailRow) -> Self {
        BookingView {
            id: row.id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            service_id: row.service_id,
            service_name: row.service_name,
            barber_id: row.barber_id,
            barber_name: row.barber_name,
            date: row.date,
            time_slot_id: row.time_slot_id,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn validate(input: &NewBooking) -> Vec<String> {
    let mut errors = Vec::new();
    if input.customer_name.trim().chars().count() < 2 {
        errors.push("Name must be at least 2 characters".to_string());
    }
    if !looks_like_email(input.customer_email.trim()) {
        errors.push("Please provide a valid email address".to_string());
    }
    if input.customer_phone.trim().chars().count() < 6 {
        errors.push("Phone number must be at least 6 characters".to_string());
    }
    if input.service_id.trim().is_empty() {
        errors.push("Please select a service".to_string());
    }
    if input.barber_id.trim().is_empty() {
        errors.push("Please select a barber".to_string());
    }
    if input.date.trim().is_empty() {
        errors.push("Please pick a date".to_string());
    }
    if input.time_slot_id.trim().is_empty() {
        errors.push("Please pick a time slot".to_string());
    }
    errors
}

async fn slot_is_taken(
    pool: &SqlitePool,
    barber_id: &str,
    day: &str,
    time_slot_id: &str,
) -> Result<bool, sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>(
        r#"SELECT id FROM bookings
           WHERE barber_id = ? AND substr(date, 1, 10) = ? AND time_slot_id = ? AND status <> ?
           LIMIT 1"#,
    )
    .bind(barber_id)
    .bind(day)
    .bind(time_slot_id)
    .bind(BookingStatus::Cancelled.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(existing.is_some())
}

/// Creates a booking in PENDING state. The friendly conflict answer comes
/// from the pre-check; the unique index on (barber, day, slot) closes the
/// race the pre-check leaves open, and a violation maps to the same 409.
pub async fn create_booking(
    state: &AppState,
    input: NewBooking,
) -> Result<BookingDetailRow, ApiError> {
    let errors = validate(&input);
    if !errors.is_empty() {
        return Err(ApiError::validation_all(errors));
    }

    let day = parse_day(&input.date).ok_or_else(|| ApiError::validation("Invalid date format"))?;
    if !state.slots.contains(&input.time_slot_id) {
        return Err(ApiError::validation("Unknown time slot"));
    }

    sqlx::query_as::<_, (String,)>("SELECT id FROM services WHERE id = ? LIMIT 1")
        .bind(&input.service_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;
    sqlx::query_as::<_, (String,)>("SELECT id FROM barbers WHERE id = ? LIMIT 1")
        .bind(&input.barber_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Barber not found"))?;

    let day = day_key(day);
    if slot_is_taken(&state.db, &input.barber_id, &day, &input.time_slot_id).await? {
        return Err(ApiError::conflict(SLOT_TAKEN));
    }

    let booking_id = new_id();
    let insert = sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_name, customer_phone, customer_email, service_id, barber_id,
            date, time_slot_id, status, notes, created_at, completed_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)"#,
    )
    .bind(&booking_id)
    .bind(input.customer_name.trim())
    .bind(input.customer_phone.trim())
    .bind(input.customer_email.trim())
    .bind(&input.service_id)
    .bind(&input.barber_id)
    .bind(&input.date)
    .bind(&input.time_slot_id)
    .bind(BookingStatus::Pending.as_str())
    .bind(&input.notes)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        return Err(match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::conflict(SLOT_TAKEN),
            _ => ApiError::Store(err),
        });
    }

    log_activity(
        &state.db,
        "booking_created",
        &format!(
            "New booking from {} ({} slot {})",
            input.customer_name.trim(),
            day,
            input.time_slot_id
        ),
        None,
        Some(&booking_id),
    )
    .await;

    let row = fetch_booking_detail(&state.db, &booking_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    notify::booking_created(state, &row);
    Ok(row)
}

/// Moves a booking along the legal transition table and applies the target
/// state's side effects. The UPDATE is guarded on the status we read, so a
/// concurrent writer makes it a 409 instead of a lost update.
pub async fn transition_status(
    state: &AppState,
    booking_id: &str,
    change: &StatusChange,
    actor: Option<&str>,
) -> Result<BookingDetailRow, ApiError> {
    let next = BookingStatus::parse(&change.status)
        .ok_or_else(|| ApiError::validation("Invalid booking status"))?;

    let row = fetch_booking_detail(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    let current = BookingStatus::parse(&row.status)
        .ok_or_else(|| ApiError::invalid_state("Booking is in an unknown state"))?;

    if !current.can_transition_to(next) {
        return Err(ApiError::invalid_state(format!(
            "Cannot change booking status from {current} to {next}"
        )));
    }

    let completed_at = match next {
        BookingStatus::Completed => Some(Utc::now().to_rfc3339()),
        _ => None,
    };

    let mut notes = row.notes.clone();
    if next == BookingStatus::Cancelled {
        if let Some(reason) = change
            .cancel_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        {
            if !notes.is_empty() {
                notes.push('\n');
            }
            notes.push_str(&format!("Cancellation reason: {reason}"));
        }
    }

    let updated = sqlx::query(
        r#"UPDATE bookings
           SET status = ?, notes = ?, completed_at = COALESCE(?, completed_at)
           WHERE id = ? AND status = ?"#,
    )
    .bind(next.as_str())
    .bind(&notes)
    .bind(&completed_at)
    .bind(booking_id)
    .bind(current.as_str())
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Booking was modified concurrently"));
    }

    log_activity(
        &state.db,
        "booking_updated",
        &format!("Booking for {} moved to {next}", row.customer_name),
        actor,
        Some(booking_id),
    )
    .await;

    let row = fetch_booking_detail(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    notify::booking_updated(state, &row);
    Ok(row)
}

/// Removes a booking for good. Only terminal bookings qualify; active ones
/// have to be cancelled first.
pub async fn delete_booking(
    state: &AppState,
    booking_id: &str,
    actor: Option<&str>,
) -> Result<(), ApiError> {
    let row = fetch_booking_detail(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    let status = BookingStatus::parse(&row.status)
        .ok_or_else(|| ApiError::invalid_state("Booking is in an unknown state"))?;

    if !status.is_terminal() {
        return Err(ApiError::invalid_state(
            "Only completed or cancelled bookings can be deleted",
        ));
    }

    let deleted = sqlx::query("DELETE FROM bookings WHERE id = ? AND status = ?")
        .bind(booking_id)
        .bind(status.as_str())
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::conflict("Booking was modified concurrently"));
    }

    log_activity(
        &state.db,
        "booking_deleted",
        &format!("Booking for {} deleted", row.customer_name),
        actor,
        Some(booking_id),
    )
    .await;
    notify::booking_deleted(state, booking_id);
    Ok(())
}

/// Filtered read over bookings joined with service and barber names.
/// Ordering direction is the caller's concern.
pub async fn list_bookings(
    pool: &SqlitePool,
    filters: &BookingFilters,
    order: DateOrder,
) -> Result<Vec<BookingDetailRow>, ApiError> {
    let mut query = QueryBuilder::<Sqlite>::new(
        r#"SELECT b.id, b.customer_name, b.customer_phone, b.customer_email,
                  b.service_id, b.barber_id, b.date, b.time_slot_id, b.status,
                  b.notes, b.created_at, b.completed_at,
                  s.name AS service_name,
                  br.name AS barber_name
           FROM bookings b
           LEFT JOIN services s ON b.service_id = s.id
           LEFT JOIN barbers br ON b.barber_id = br.id
           WHERE 1 = 1"#,
    );

    if let Some(raw) = filters.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let status = BookingStatus::parse(raw)
            .ok_or_else(|| ApiError::validation("Invalid booking status"))?;
        query.push(" AND b.status = ").push_bind(status.as_str());
    }
    if let Some(raw) = filters.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let day = parse_day(raw).ok_or_else(|| ApiError::validation("Invalid date format"))?;
        query
            .push(" AND substr(b.date, 1, 10) = ")
            .push_bind(day_key(day));
    }
    if let Some(barber_id) = filters.barber_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.push(" AND b.barber_id = ").push_bind(barber_id.to_string());
    }
    if let Some(service_id) = filters.service_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.push(" AND b.service_id = ").push_bind(service_id.to_string());
    }

    match order {
        DateOrder::Ascending => {
            query.push(" ORDER BY b.date ASC, CAST(b.time_slot_id AS INTEGER) ASC")
        }
        DateOrder::Descending => {
            query.push(" ORDER BY b.date DESC, CAST(b.time_slot_id AS INTEGER) ASC")
        }
    };

    let rows = query
        .build_query_as::<BookingDetailRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
