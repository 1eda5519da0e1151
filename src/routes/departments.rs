use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_administrator, CurrentPrincipal};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::models::department::{Department, DepartmentCreateRequest};
use crate::utils::{required_text, utc_now};

#[utoipa::path(
    get,
    path = "/departments",
    tag = "Departments",
    responses((status = 200, description = "List departments", body = [Department]))
)]
pub async fn list_departments(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> AppResult<Json<Vec<Department>>> {
    let departments = sqlx::query_as::<_, Department>("SELECT id, name, created_at FROM departments ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(departments))
}

#[utoipa::path(
    post,
    path = "/departments",
    tag = "Departments",
    request_body = DepartmentCreateRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Department name already exists")
    )
)]
pub async fn create_department(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<DepartmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    require_administrator(&principal)?;
    let name = required_text("name", &payload.name)?;

    let department = Department {
        id: Uuid::new_v4(),
        name,
        created_at: utc_now(),
    };

    sqlx::query("INSERT INTO departments (id, name, created_at) VALUES (?, ?, ?)")
        .bind(department.id)
        .bind(&department.name)
        .bind(department.created_at)
        .execute(&state.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "department name already exists"))?;

    log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &department,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(department)))
}

/// Name of the department `department_id` points at; unknown ids are a 400.
pub(crate) async fn resolve_department(pool: &SqlitePool, department_id: Option<Uuid>) -> AppResult<Option<String>> {
    let Some(department_id) = department_id else {
        return Ok(None);
    };

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM departments WHERE id = ?")
        .bind(department_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::bad_request("unknown department"))?;

    Ok(Some(name))
}
