use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::BookingDetailRow;
use crate::slots::SlotCatalog;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub slots: SlotCatalog,
    pub events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub fn new(db: SqlitePool, slots: SlotCatalog) -> Self {
        let (events, _) = broadcast::channel(64);
        AppState { db, slots, events }
    }
}

/// Payload fanned out to admin console listeners whenever a booking changes.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    pub kind: String,
    pub booking_id: Option<String>,
    pub status: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub service_name: Option<String>,
    pub barber_name: Option<String>,
    pub date: Option<String>,
    pub time_slot_id: Option<String>,
    pub notes: Option<String>,
}

impl ServerEvent {
    pub fn deleted(booking_id: &str) -> Self {
        Self {
            kind: "deleted".to_string(),
            booking_id: Some(booking_id.to_string()),
            status: None,
            customer_name: None,
            customer_phone: None,
            customer_email: None,
            service_name: None,
            barber_name: None,
            date: None,
            time_slot_id: None,
            notes: None,
        }
    }

    pub fn from_row(kind: &str, row: BookingDetailRow) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(row.id),
            status: Some(row.status),
            customer_name: Some(row.customer_name),
            customer_phone: Some(row.customer_phone),
            customer_email: Some(row.customer_email),
            service_name: row.service_name,
            barber_name: row.barber_name,
            date: Some(row.date),
            time_slot_id: Some(row.time_slot_id),
            notes: Some(row.notes),
        }
    }
}
