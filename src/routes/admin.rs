use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    auth::{admin_validator, authenticate_credentials, hash_password, new_id, staff_validator, AuthUser},
    bookings::{self, looks_like_email, BookingFilters, BookingView, DateOrder, StatusChange},
    db::log_activity,
    errors::ApiError,
    models::{
        ActivityDto, ActivityRow, BarberDto, BarberRow, BookingStatus, ServiceDto, ServiceRow,
        UserDto, UserRow, ROLE_ADMIN, ROLE_STAFF,
    },
    routes::events,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(
                web::scope("/bookings")
                    .wrap(HttpAuthentication::basic(staff_validator))
                    .service(web::resource("").route(web::get().to(list_bookings)))
                    .service(
                        web::resource("/{id}")
                            .route(web::patch().to(update_booking))
                            .route(web::delete().to(delete_booking)),
                    ),
            )
            .service(
                web::resource("/stats")
                    .wrap(HttpAuthentication::basic(staff_validator))
                    .route(web::get().to(stats)),
            )
            .service(
                web::resource("/events")
                    .wrap(HttpAuthentication::basic(staff_validator))
                    .route(web::get().to(events::stream_events)),
            )
            .service(
                web::scope("/services")
                    .wrap(HttpAuthentication::basic(admin_validator))
                    .service(
                        web::resource("")
                            .route(web::get().to(list_services))
                            .route(web::post().to(create_service)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::patch().to(update_service))
                            .route(web::delete().to(delete_service)),
                    ),
            )
            .service(
                web::scope("/barbers")
                    .wrap(HttpAuthentication::basic(admin_validator))
                    .service(
                        web::resource("")
                            .route(web::get().to(list_barbers))
                            .route(web::post().to(create_barber)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::patch().to(update_barber))
                            .route(web::delete().to(delete_barber)),
                    ),
            )
            .service(
                web::scope("/users")
                    .wrap(HttpAuthentication::basic(admin_validator))
                    .service(
                        web::resource("")
                            .route(web::get().to(list_users))
                            .route(web::post().to(create_user)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::patch().to(update_user))
                            .route(web::delete().to(delete_user)),
                    ),
            ),
    );
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Please provide an email and password"));
    }

    let user = authenticate_credentials(&state, payload.email.trim(), &payload.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    log_activity(
        &state.db,
        "login",
        &format!("{} signed in", user.name),
        Some(&user.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
        },
    })))
}

async fn list_bookings(
    state: web::Data<AppState>,
    query: web::Query<BookingFilters>,
) -> Result<HttpResponse, ApiError> {
    let mut filters = query.into_inner();
    // The console sends status=all for the unfiltered view.
    if filters
        .status
        .as_deref()
        .map(|s| s.trim().eq_ignore_ascii_case("all"))
        .unwrap_or(false)
    {
        filters.status = None;
    }

    let rows = bookings::list_bookings(&state.db, &filters, DateOrder::Descending).await?;
    let bookings: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "bookings": bookings })))
}

async fn update_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusChange>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let row = bookings::transition_status(&state, &booking_id, &payload, Some(&auth.id)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking status updated",
        "booking": BookingView::from(row),
    })))
}

async fn delete_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    bookings::delete_booking(&state, &booking_id, Some(&auth.id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Booking deleted" })))
}

async fn count_rows(pool: &SqlitePool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

async fn count_bookings_with(pool: &SqlitePool, status: BookingStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
}

async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let total = count_rows(&state.db, "SELECT COUNT(*) FROM bookings").await?;
    let pending = count_bookings_with(&state.db, BookingStatus::Pending).await?;
    let confirmed = count_bookings_with(&state.db, BookingStatus::Confirmed).await?;
    let completed = count_bookings_with(&state.db, BookingStatus::Completed).await?;
    let cancelled = count_bookings_with(&state.db, BookingStatus::Cancelled).await?;
    let services = count_rows(&state.db, "SELECT COUNT(*) FROM services WHERE active = 1").await?;
    let barbers = count_rows(&state.db, "SELECT COUNT(*) FROM barbers WHERE active = 1").await?;
    let users = count_rows(&state.db, "SELECT COUNT(*) FROM users").await?;

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await?;
    let activities: Vec<ActivityDto> = activity_rows.into_iter().map(ActivityDto::from).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "stats": {
            "totalBookings": total,
            "pendingBookings": pending,
            "confirmedBookings": confirmed,
            "completedBookings": completed,
            "cancelledBookings": cancelled,
            "activeServices": services,
            "activeBarbers": barbers,
            "totalUsers": users,
        },
        "activities": activities,
    })))
}

async fn fetch_service(pool: &SqlitePool, id: &str) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, description, price, duration, image_url, active, created_at
           FROM services WHERE id = ? LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, description, price, duration, image_url, active, created_at
           FROM services ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await?;
    let services: Vec<ServiceDto> = rows.into_iter().map(ServiceDto::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "services": services })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ServiceInput {
    name: String,
    description: String,
    price: Option<f64>,
    duration: Option<i64>,
    image_url: String,
    active: Option<bool>,
}

async fn create_service(
    state: web::Data<AppState>,
    payload: web::Json<ServiceInput>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push("Service name is required".to_string());
    }
    match input.price {
        None => errors.push("Price is required".to_string()),
        Some(price) if price < 0.0 => errors.push("Price cannot be negative".to_string()),
        _ => {}
    }
    match input.duration {
        None => errors.push("Duration is required".to_string()),
        Some(duration) if duration < 5 => {
            errors.push("Duration must be at least 5 minutes".to_string())
        }
        _ => {}
    }
    if !errors.is_empty() {
        return Err(ApiError::validation_all(errors));
    }
    // Both checked above.
    let (Some(price), Some(duration)) = (input.price, input.duration) else {
        return Err(ApiError::validation("Price and duration are required"));
    };

    let name = input.name.trim();
    let existing =
        sqlx::query_as::<_, (String,)>("SELECT id FROM services WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A service with this name already exists"));
    }

    let service_id = new_id();
    let insert = sqlx::query(
        r#"INSERT INTO services (id, name, description, price, duration, image_url, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&service_id)
    .bind(name)
    .bind(input.description.trim())
    .bind(price)
    .bind(duration)
    .bind(input.image_url.trim())
    .bind(if input.active.unwrap_or(true) { 1_i64 } else { 0 })
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        return Err(match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::conflict("A service with this name already exists")
            }
            _ => ApiError::Store(err),
        });
    }

    log_activity(
        &state.db,
        "service_created",
        &format!("{} created service {}", auth.name, name),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_service(&state.db, &service_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Service created",
        "service": ServiceDto::from(row),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ServiceUpdate {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    duration: Option<i64>,
    image_url: Option<String>,
    active: Option<bool>,
}

async fn update_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ServiceUpdate>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();
    let update = payload.into_inner();

    let mut errors = Vec::new();
    if update.name.as_deref().map(str::trim) == Some("") {
        errors.push("Service name is required".to_string());
    }
    if update.price.map(|p| p < 0.0).unwrap_or(false) {
        errors.push("Price cannot be negative".to_string());
    }
    if update.duration.map(|d| d < 5).unwrap_or(false) {
        errors.push("Duration must be at least 5 minutes".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation_all(errors));
    }

    let existing = fetch_service(&state.db, &service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    if let Some(name) = update.name.as_deref().map(str::trim) {
        if name != existing.name {
            let taken = sqlx::query_as::<_, (String,)>(
                "SELECT id FROM services WHERE name = ? AND id <> ? LIMIT 1",
            )
            .bind(name)
            .bind(&service_id)
            .fetch_optional(&state.db)
            .await?;
            if taken.is_some() {
                return Err(ApiError::conflict("A service with this name already exists"));
            }
        }
    }

    let name = update
        .name
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or(existing.name);
    let description = update.description.unwrap_or(existing.description);
    let price = update.price.unwrap_or(existing.price);
    let duration = update.duration.unwrap_or(existing.duration);
    let image_url = update.image_url.unwrap_or(existing.image_url);
    let active = update
        .active
        .map(|flag| if flag { 1_i64 } else { 0 })
        .unwrap_or(existing.active);

    sqlx::query(
        r#"UPDATE services
           SET name = ?, description = ?, price = ?, duration = ?, image_url = ?, active = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&description)
    .bind(price)
    .bind(duration)
    .bind(&image_url)
    .bind(active)
    .bind(&service_id)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        "service_updated",
        &format!("{} updated service {}", auth.name, name),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_service(&state.db, &service_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Service updated",
        "service": ServiceDto::from(row),
    })))
}

async fn delete_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();
    let existing = fetch_service(&state.db, &service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    let referenced =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE service_id = ?")
            .bind(&service_id)
            .fetch_one(&state.db)
            .await?;

    if referenced > 0 {
        sqlx::query("UPDATE services SET active = 0 WHERE id = ?")
            .bind(&service_id)
            .execute(&state.db)
            .await?;
        log_activity(
            &state.db,
            "service_deactivated",
            &format!("{} deactivated service {}", auth.name, existing.name),
            Some(&auth.id),
            None,
        )
        .await;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Service marked inactive because bookings reference it",
            "soft_delete": true,
        })));
    }

    sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(&service_id)
        .execute(&state.db)
        .await?;
    log_activity(
        &state.db,
        "service_deleted",
        &format!("{} deleted service {}", auth.name, existing.name),
        Some(&auth.id),
        None,
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Service deleted" })))
}

async fn fetch_barber(pool: &SqlitePool, id: &str) -> Result<Option<BarberRow>, sqlx::Error> {
    sqlx::query_as::<_, BarberRow>(
        r#"SELECT id, name, title, description, image_url, active, created_at
           FROM barbers WHERE id = ? LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn list_barbers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, BarberRow>(
        r#"SELECT id, name, title, description, image_url, active, created_at
           FROM barbers ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await?;
    let barbers: Vec<BarberDto> = rows.into_iter().map(BarberDto::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "barbers": barbers })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BarberInput {
    name: String,
    title: String,
    description: String,
    image_url: String,
    active: Option<bool>,
}

async fn create_barber(
    state: web::Data<AppState>,
    payload: web::Json<BarberInput>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let input = payload.into_inner();
    if input.name.trim().is_empty() {
        return Err(ApiError::validation("Barber name is required"));
    }

    let name = input.name.trim();
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM barbers WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A barber with this name already exists"));
    }

    let barber_id = new_id();
    let insert = sqlx::query(
        r#"INSERT INTO barbers (id, name, title, description, image_url, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&barber_id)
    .bind(name)
    .bind(input.title.trim())
    .bind(input.description.trim())
    .bind(input.image_url.trim())
    .bind(if input.active.unwrap_or(true) { 1_i64 } else { 0 })
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        return Err(match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::conflict("A barber with this name already exists")
            }
            _ => ApiError::Store(err),
        });
    }

    log_activity(
        &state.db,
        "barber_created",
        &format!("{} created barber {}", auth.name, name),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_barber(&state.db, &barber_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Barber created",
        "barber": BarberDto::from(row),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BarberUpdate {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    active: Option<bool>,
}

async fn update_barber(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<BarberUpdate>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let update = payload.into_inner();

    if update.name.as_deref().map(str::trim) == Some("") {
        return Err(ApiError::validation("Barber name is required"));
    }

    let existing = fetch_barber(&state.db, &barber_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Barber not found"))?;

    if let Some(name) = update.name.as_deref().map(str::trim) {
        if name != existing.name {
            let taken = sqlx::query_as::<_, (String,)>(
                "SELECT id FROM barbers WHERE name = ? AND id <> ? LIMIT 1",
            )
            .bind(name)
            .bind(&barber_id)
            .fetch_optional(&state.db)
            .await?;
            if taken.is_some() {
                return Err(ApiError::conflict("A barber with this name already exists"));
            }
        }
    }

    let name = update
        .name
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or(existing.name);
    let title = update.title.unwrap_or(existing.title);
    let description = update.description.unwrap_or(existing.description);
    let image_url = update.image_url.unwrap_or(existing.image_url);
    let active = update
        .active
        .map(|flag| if flag { 1_i64 } else { 0 })
        .unwrap_or(existing.active);

    sqlx::query(
        r#"UPDATE barbers
           SET name = ?, title = ?, description = ?, image_url = ?, active = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&title)
    .bind(&description)
    .bind(&image_url)
    .bind(active)
    .bind(&barber_id)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        "barber_updated",
        &format!("{} updated barber {}", auth.name, name),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_barber(&state.db, &barber_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Barber updated",
        "barber": BarberDto::from(row),
    })))
}

async fn delete_barber(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let existing = fetch_barber(&state.db, &barber_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Barber not found"))?;

    let referenced =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE barber_id = ?")
            .bind(&barber_id)
            .fetch_one(&state.db)
            .await?;

    if referenced > 0 {
        sqlx::query("UPDATE barbers SET active = 0 WHERE id = ?")
            .bind(&barber_id)
            .execute(&state.db)
            .await?;
        log_activity(
            &state.db,
            "barber_deactivated",
            &format!("{} deactivated barber {}", auth.name, existing.name),
            Some(&auth.id),
            None,
        )
        .await;
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Barber marked inactive because bookings reference it",
            "soft_delete": true,
        })));
    }

    sqlx::query("DELETE FROM barbers WHERE id = ?")
        .bind(&barber_id)
        .execute(&state.db)
        .await?;
    log_activity(
        &state.db,
        "barber_deleted",
        &format!("{} deleted barber {}", auth.name, existing.name),
        Some(&auth.id),
        None,
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Barber deleted" })))
}

async fn fetch_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, created_at, updated_at
           FROM users WHERE id = ? LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, created_at, updated_at
           FROM users ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await?;
    let users: Vec<UserDto> = rows.into_iter().map(UserDto::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "users": users })))
}

fn valid_role(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_STAFF
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserInput {
    name: String,
    email: String,
    password: String,
    role: Option<String>,
}

async fn create_user(
    state: web::Data<AppState>,
    payload: web::Json<UserInput>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let input = payload.into_inner();
    let role = input
        .role
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(ROLE_STAFF)
        .to_string();

    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push("Name is required".to_string());
    }
    if !looks_like_email(input.email.trim()) {
        errors.push("Please provide a valid email address".to_string());
    }
    if input.password.len() < 6 {
        errors.push("Password must be at least 6 characters".to_string());
    }
    if !valid_role(&role) {
        errors.push("Role must be admin or staff".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation_all(errors));
    }

    let email = input.email.trim();
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email = ? LIMIT 1")
        .bind(email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("This email is already registered"));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|_| ApiError::Store(sqlx::Error::Protocol("password hash failed".into())))?;
    let user_id = new_id();
    let now = Utc::now().to_rfc3339();

    let insert = sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(input.name.trim())
    .bind(email)
    .bind(&password_hash)
    .bind(&role)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        return Err(match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::conflict("This email is already registered")
            }
            _ => ApiError::Store(err),
        });
    }

    log_activity(
        &state.db,
        "user_created",
        &format!("{} created user {}", auth.name, email),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User created",
        "user": UserDto::from(row),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserUpdate {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UserUpdate>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let update = payload.into_inner();

    let mut errors = Vec::new();
    if update.name.as_deref().map(str::trim) == Some("") {
        errors.push("Name is required".to_string());
    }
    if let Some(email) = update.email.as_deref().map(str::trim) {
        if !looks_like_email(email) {
            errors.push("Please provide a valid email address".to_string());
        }
    }
    if let Some(password) = update.password.as_deref() {
        if password.len() < 6 {
            errors.push("Password must be at least 6 characters".to_string());
        }
    }
    if let Some(role) = update.role.as_deref().map(str::trim) {
        if !valid_role(role) {
            errors.push("Role must be admin or staff".to_string());
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::validation_all(errors));
    }

    let existing = fetch_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(email) = update.email.as_deref().map(str::trim) {
        if email != existing.email {
            let taken = sqlx::query_as::<_, (String,)>(
                "SELECT id FROM users WHERE email = ? AND id <> ? LIMIT 1",
            )
            .bind(email)
            .bind(&user_id)
            .fetch_optional(&state.db)
            .await?;
            if taken.is_some() {
                return Err(ApiError::conflict("This email is already registered"));
            }
        }
    }

    let name = update
        .name
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or(existing.name);
    let email = update
        .email
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or(existing.email);
    let role = update
        .role
        .as_deref()
        .map(str::trim)
        .map(str::to_string)
        .unwrap_or(existing.role);
    let password_hash = match update.password.as_deref() {
        Some(password) => hash_password(password)
            .map_err(|_| ApiError::Store(sqlx::Error::Protocol("password hash failed".into())))?,
        None => existing.password_hash,
    };

    sqlx::query(
        r#"UPDATE users
           SET name = ?, email = ?, password_hash = ?, role = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&role)
    .bind(Utc::now().to_rfc3339())
    .bind(&user_id)
    .execute(&state.db)
    .await?;

    log_activity(
        &state.db,
        "user_updated",
        &format!("{} updated user {}", auth.name, email),
        Some(&auth.id),
        None,
    )
    .await;

    let row = fetch_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::Store(sqlx::Error::RowNotFound))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User updated",
        "user": UserDto::from(row),
    })))
}

async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let existing = fetch_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&user_id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        "user_deleted",
        &format!("{} deleted user {}", auth.name, existing.email),
        Some(&auth.id),
        None,
    )
    .await;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User deleted" })))
}
