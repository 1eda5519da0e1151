use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_administrator, roles, CurrentPrincipal};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::models::user::{AssignRoleRequest, DbUser, User, UserProfileUpdateRequest};
use crate::routes::auth::{load_user, USER_SELECT};
use crate::routes::departments::resolve_department;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "All live users with their roles", body = [User]), (status = 403, description = "Administrator role required"))
)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Vec<User>>> {
    require_administrator(&principal)?;

    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "{USER_SELECT} WHERE u.deleted_at IS NULL ORDER BY u.last_name, u.first_name"
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        let roles = crate::authz::lookup::fetch_roles(&state.pool, row.id).await?;
        users.push(User::from_db(row, roles));
    }

    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/users/{id}/roles",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = User),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Role already assigned")
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> AppResult<Json<User>> {
    require_administrator(&principal)?;
    let role = canonical_role(&payload.role)?;
    let old = load_user(&state.pool, id).await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_name, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(role)
        .bind(utc_now())
        .execute(&state.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "role already assigned"))?;

    let user = load_user(&state.pool, id).await?;
    tracing::info!(user_id = %id, role, granted_by = %principal.user_id, "role assigned");
    log_activity(
        &state.event_bus,
        "role_assigned",
        Some(principal.user_id),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/roles/{role}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id"), ("role" = String, Path, description = "Role name")),
    responses(
        (status = 200, description = "Role revoked", body = User),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Role not assigned")
    )
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path((id, role)): Path<(Uuid, String)>,
) -> AppResult<Json<User>> {
    require_administrator(&principal)?;
    let role = canonical_role(&role)?;

    if id == principal.user_id && role == roles::ADMINISTRATOR {
        return Err(AppError::bad_request("administrators cannot revoke their own administrator role"));
    }

    let old = load_user(&state.pool, id).await?;

    let affected = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_name = ?")
        .bind(id)
        .bind(role)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("role not assigned"));
    }

    let user = load_user(&state.pool, id).await?;
    tracing::info!(user_id = %id, role, revoked_by = %principal.user_id, "role revoked");
    log_activity(
        &state.event_bus,
        "role_revoked",
        Some(principal.user_id),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}/profile",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserProfileUpdateRequest,
    responses(
        (status = 200, description = "Department or KPI-owner flag updated", body = User),
        (status = 400, description = "Unknown department"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserProfileUpdateRequest>,
) -> AppResult<Json<User>> {
    require_administrator(&principal)?;
    let old = load_user(&state.pool, id).await?;

    let department_id = match payload.department_id {
        Some(Some(department_id)) => {
            resolve_department(&state.pool, Some(department_id)).await?;
            Some(department_id)
        }
        Some(None) => None,
        None => old.department_id,
    };
    let is_kpi_owner = payload.is_kpi_owner.unwrap_or(old.is_kpi_owner);

    sqlx::query("UPDATE users SET department_id = ?, is_kpi_owner = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(department_id)
        .bind(is_kpi_owner)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let user = load_user(&state.pool, id).await?;
    log_activity(
        &state.event_bus,
        "profile_updated",
        Some(principal.user_id),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(user))
}

/// Checks that `user_id`, when given, names a live user; anything else is a 400.
pub(crate) async fn resolve_user(pool: &SqlitePool, user_id: Option<Uuid>) -> AppResult<()> {
    let Some(user_id) = user_id else {
        return Ok(());
    };

    let live = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if live == 0 {
        return Err(AppError::bad_request("unknown responsible user"));
    }
    Ok(())
}

/// Matches `name` case-insensitively against the known roles.
fn canonical_role(name: &str) -> AppResult<&'static str> {
    let name = name.trim();
    roles::ALL
        .iter()
        .copied()
        .find(|role| role.eq_ignore_ascii_case(name))
        .ok_or_else(|| AppError::bad_request(format!("unknown role: {name}")))
}
