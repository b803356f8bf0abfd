use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::{UserRow, ROLE_ADMIN};
use crate::state::AppState;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, created_at, updated_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Looks the user up by email and checks the password. `Ok(None)` covers both
/// unknown email and wrong password so callers cannot tell them apart.
pub async fn authenticate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<AuthUser>, sqlx::Error> {
    let user = match find_user_by_email(&state.db, email).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }

    Ok(Some(AuthUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();
    match authenticate_credentials(state, email, password).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::Unauthorized("Unauthorized".to_string()).into()),
        Err(err) => Err(ApiError::Store(err).into()),
    }
}

pub async fn staff_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if user.role != ROLE_ADMIN {
                return Err((
                    ApiError::Unauthorized("Admin access required".to_string()).into(),
                    req,
                ));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn round_trips_a_password() {
        let hash = hash_password("sw0rdfish").unwrap();
        assert!(verify_password("sw0rdfish", &hash));
        assert!(!verify_password("swordfish", &hash));
    }

    #[test]
    fn rejects_garbage_hashes() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }
}
