use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{lookup, roles};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::routes::departments::resolve_department;
use crate::utils::{hash_password, required_text, utc_now, verify_password};

pub(crate) const USER_SELECT: &str = "SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash, \
     u.department_id, d.name AS department_name, u.is_kpi_owner, u.created_at, u.updated_at, u.deleted_at \
     FROM users u LEFT JOIN departments d ON d.id = u.department_id";

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let first_name = required_text("first_name", &payload.first_name)?;
    let last_name = required_text("last_name", &payload.last_name)?;
    let email = normalize_email(&payload.email)?;
    resolve_department(&state.pool, payload.department_id).await?;
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_hash, department_id, is_kpi_owner, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(user_id)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&email)
    .bind(password_hash)
    .bind(payload.department_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| conflict_on_unique(err, "email already in use"))?;

    // every account starts with the baseline role
    sqlx::query("INSERT INTO user_roles (user_id, role_name, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(roles::USER)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let user = load_user(&state.pool, user_id).await?;
    let token = state.jwt.encode(user.id)?;

    log_activity(
        &state.event_bus,
        "registered",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();

    let db_user = sqlx::query_as::<_, DbUser>(&format!("{USER_SELECT} WHERE u.email = ? AND u.deleted_at IS NULL"))
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(user_id = %db_user.id, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state.jwt.encode(db_user.id)?;
    let roles = lookup::fetch_roles(&state.pool, db_user.id).await?;
    let user = User::from_db(db_user, roles);

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user with roles", body = User), (status = 401, description = "Missing or invalid token"))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    Ok(Json(load_user(&state.pool, auth.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    // tokens are stateless; the client discards its copy
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::bad_request("email is not valid")),
    }
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

/// Loads a live user together with their role names.
pub(crate) async fn load_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    let db_user = sqlx::query_as::<_, DbUser>(&format!("{USER_SELECT} WHERE u.id = ? AND u.deleted_at IS NULL"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let roles = lookup::fetch_roles(pool, db_user.id).await?;
    Ok(User::from_db(db_user, roles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "ada", "@example.com", "ada@localhost"] {
            assert!(matches!(normalize_email(email), Err(AppError::BadRequest(_))), "{email}");
        }
    }
}
