use crate::models::BookingDetailRow;
use crate::state::{AppState, ServerEvent};

/// Outbound delivery (SMS, mail) is not wired up. Each hook logs what would
/// be sent and fans the change out to admin console listeners over the
/// broadcast channel.
pub fn booking_created(state: &AppState, row: &BookingDetailRow) {
    log::info!(
        "notify: new booking {} for {} ({} {} slot {})",
        row.id,
        row.customer_name,
        row.barber_name.as_deref().unwrap_or("unassigned"),
        row.date,
        row.time_slot_id
    );
    let _ = state
        .events
        .send(ServerEvent::from_row("created", row.clone()));
}

pub fn booking_updated(state: &AppState, row: &BookingDetailRow) {
    log::info!(
        "notify: booking {} for {} is now {}",
        row.id,
        row.customer_name,
        row.status
    );
    let _ = state
        .events
        .send(ServerEvent::from_row("updated", row.clone()));
}

pub fn booking_deleted(state: &AppState, booking_id: &str) {
    log::info!("notify: booking {booking_id} removed");
    let _ = state.events.send(ServerEvent::deleted(booking_id));
}
