use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    bookings::{self, BookingFilters, BookingView, DateOrder, NewBooking, StatusChange},
    errors::ApiError,
    models::{BarberDto, BarberRow, ServiceDto, ServiceRow},
    slots,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/api/services").route(web::get().to(list_services)))
        .service(web::resource("/api/barbers").route(web::get().to(list_barbers)))
        .service(web::resource("/api/time-slots").route(web::get().to(time_slots)))
        .service(
            web::resource("/api/bookings")
                .route(web::get().to(list_bookings))
                .route(web::post().to(create_booking)),
        )
        .service(web::resource("/api/bookings/{id}").route(web::patch().to(update_booking)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, description, price, duration, image_url, active, created_at
           FROM services
           WHERE active = 1
           ORDER BY price ASC"#,
    )
    .fetch_all(&state.db)
    .await?;

    let services: Vec<ServiceDto> = rows.into_iter().map(ServiceDto::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "services": services })))
}

async fn list_barbers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, BarberRow>(
        r#"SELECT id, name, title, description, image_url, active, created_at
           FROM barbers
           WHERE active = 1
           ORDER BY name ASC"#,
    )
    .fetch_all(&state.db)
    .await?;

    let barbers: Vec<BarberDto> = rows.into_iter().map(BarberDto::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "barbers": barbers })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AvailabilityQuery {
    date: Option<String>,
    service_id: Option<String>,
    barber_id: Option<String>,
}

async fn time_slots(
    state: web::Data<AppState>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let date = query
        .date
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing date parameter"))?;
    let service_id = query.service_id.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let barber_id = query.barber_id.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let (service_id, barber_id) = match (service_id, barber_id) {
        (Some(service_id), Some(barber_id)) => (service_id, barber_id),
        _ => {
            return Err(ApiError::validation(
                "Missing serviceId or barberId parameter",
            ))
        }
    };

    let availability =
        slots::resolve_available_slots(&state.db, &state.slots, date, service_id, barber_id)
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "timeSlots": availability.time_slots,
        "meta": availability.meta,
    })))
}

async fn create_booking(
    state: web::Data<AppState>,
    payload: web::Json<NewBooking>,
) -> Result<HttpResponse, ApiError> {
    let row = bookings::create_booking(&state, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking received",
        "booking": BookingView::from(row),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PublicBookingQuery {
    date: Option<String>,
    barber_id: Option<String>,
}

async fn list_bookings(
    state: web::Data<AppState>,
    query: web::Query<PublicBookingQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let filters = BookingFilters {
        status: None,
        date: query.date,
        barber_id: query.barber_id,
        service_id: None,
    };
    let rows = bookings::list_bookings(&state.db, &filters, DateOrder::Ascending).await?;
    let bookings: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "bookings": bookings })))
}

async fn update_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusChange>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let row = bookings::transition_status(&state, &booking_id, &payload, None).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "booking": BookingView::from(row),
    })))
}
