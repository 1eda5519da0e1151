use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, AuthorizedResource, CurrentPrincipal, Operation, ResourceAttributes, ResourceKind};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::models::indicator::{
    DbIndicator, Indicator, IndicatorCreateRequest, IndicatorType, IndicatorUpdateRequest,
};
use crate::models::kpi::ValueUpdateRequest;
use crate::routes::departments::resolve_department;
use crate::routes::users::resolve_user;
use crate::utils::{optional_text, required_text, utc_now};

pub(crate) const INDICATOR_SELECT: &str = "SELECT i.id, i.indicator_type, i.parent_id, i.name, i.description, i.unit, \
     i.target_value, i.actual_value, i.department_id, d.name AS department_name, i.responsible_user_id, i.owner, \
     i.created_by, i.created_at, i.updated_at, i.deleted_at \
     FROM indicators i LEFT JOIN departments d ON d.id = i.department_id";

#[derive(Debug, Deserialize, IntoParams)]
pub struct IndicatorListQuery {
    /// `kri`, `ri` or `pi`
    pub indicator_type: Option<String>,
    pub department_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/indicators",
    tag = "Indicators",
    params(IndicatorListQuery),
    responses((status = 200, description = "List indicators", body = [Indicator]), (status = 400, description = "Unknown indicator type"))
)]
pub async fn list_indicators(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Query(query): Query<IndicatorListQuery>,
) -> AppResult<Json<Vec<Indicator>>> {
    let indicator_type = query
        .indicator_type
        .as_deref()
        .map(str::parse::<IndicatorType>)
        .transpose()?;

    let mut sql = format!("{INDICATOR_SELECT} WHERE i.deleted_at IS NULL");
    if indicator_type.is_some() {
        sql.push_str(" AND i.indicator_type = ?");
    }
    if query.department_id.is_some() {
        sql.push_str(" AND i.department_id = ?");
    }
    sql.push_str(" ORDER BY i.indicator_type, i.name");

    let mut q = sqlx::query_as::<_, DbIndicator>(&sql);
    if let Some(indicator_type) = indicator_type {
        q = q.bind(indicator_type.as_str());
    }
    if let Some(department_id) = query.department_id {
        q = q.bind(department_id);
    }

    let rows = q.fetch_all(&state.pool).await?;
    let indicators = rows
        .into_iter()
        .map(Indicator::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(indicators))
}

#[utoipa::path(
    post,
    path = "/indicators",
    tag = "Indicators",
    request_body = IndicatorCreateRequest,
    responses(
        (status = 201, description = "Indicator created", body = Indicator),
        (status = 400, description = "Hierarchy violation"),
        (status = 403, description = "Caller may not create indicators")
    )
)]
pub async fn create_indicator(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<IndicatorCreateRequest>,
) -> AppResult<(StatusCode, Json<Indicator>)> {
    let name = required_text("name", &payload.name)?;

    let department_id = payload.department_id.or(principal.department_id);
    let department_name = resolve_department(&state.pool, department_id).await?;
    let owner = optional_text(payload.owner);

    let prospective = ResourceAttributes::new(ResourceKind::Indicator)
        .with_department(department_id, department_name)
        .with_creator(Some(principal.user_id))
        .with_responsible_user(payload.responsible_user_id)
        .with_owner_display(owner.clone());
    authorize(&state, &principal, &prospective, Operation::Create).await?;
    resolve_user(&state.pool, payload.responsible_user_id).await?;

    let parent_type = match payload.parent_id {
        Some(parent_id) => {
            let parent = fetch_indicator(&state.pool, parent_id)
                .await
                .map_err(|err| match err {
                    AppError::NotFound(_) => AppError::bad_request("parent indicator not found"),
                    other => other,
                })?;
            Some(parent.indicator_type.parse::<IndicatorType>()?)
        }
        None => None,
    };
    payload.indicator_type.validate_parent(parent_type)?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO indicators (id, indicator_type, parent_id, name, description, unit, target_value, actual_value, \
         department_id, responsible_user_id, owner, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(payload.indicator_type.as_str())
    .bind(payload.parent_id)
    .bind(&name)
    .bind(optional_text(payload.description))
    .bind(optional_text(payload.unit))
    .bind(payload.target_value)
    .bind(payload.actual_value)
    .bind(department_id)
    .bind(payload.responsible_user_id)
    .bind(&owner)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let indicator = Indicator::try_from(fetch_indicator(&state.pool, id).await?)?;
    log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &indicator,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(indicator)))
}

#[utoipa::path(
    get,
    path = "/indicators/{id}",
    tag = "Indicators",
    params(("id" = Uuid, Path, description = "Indicator id")),
    responses((status = 200, description = "Indicator detail", body = Indicator), (status = 404, description = "Indicator not found"))
)]
pub async fn get_indicator(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Indicator>> {
    let row = fetch_indicator(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;
    Ok(Json(Indicator::try_from(row)?))
}

#[utoipa::path(
    get,
    path = "/indicators/{id}/children",
    tag = "Indicators",
    params(("id" = Uuid, Path, description = "Indicator id")),
    responses((status = 200, description = "Direct children of the indicator", body = [Indicator]))
)]
pub async fn list_children(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Indicator>>> {
    let row = fetch_indicator(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;

    let children = sqlx::query_as::<_, DbIndicator>(&format!(
        "{INDICATOR_SELECT} WHERE i.parent_id = ? AND i.deleted_at IS NULL ORDER BY i.name"
    ))
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let children = children
        .into_iter()
        .map(Indicator::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(children))
}

#[utoipa::path(
    put,
    path = "/indicators/{id}",
    tag = "Indicators",
    params(("id" = Uuid, Path, description = "Indicator id")),
    request_body = IndicatorUpdateRequest,
    responses((status = 200, description = "Indicator updated", body = Indicator), (status = 403, description = "Update not permitted"))
)]
pub async fn update_indicator(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<IndicatorUpdateRequest>,
) -> AppResult<Json<Indicator>> {
    let mut row = fetch_indicator(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Update).await?;
    let old = Indicator::try_from(row.clone())?;

    if let Some(name) = payload.name.as_deref() {
        row.name = required_text("name", name)?;
    }
    if payload.description.is_some() {
        row.description = optional_text(payload.description);
    }
    if payload.unit.is_some() {
        row.unit = optional_text(payload.unit);
    }
    if payload.target_value.is_some() {
        row.target_value = payload.target_value;
    }
    if payload.owner.is_some() {
        row.owner = optional_text(payload.owner);
    }
    if payload.responsible_user_id.is_some() {
        resolve_user(&state.pool, payload.responsible_user_id).await?;
        row.responsible_user_id = payload.responsible_user_id;
    }
    if let Some(department_id) = payload.department_id {
        row.department_name = resolve_department(&state.pool, Some(department_id)).await?;
        row.department_id = Some(department_id);
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE indicators SET name = ?, description = ?, unit = ?, target_value = ?, department_id = ?, \
         responsible_user_id = ?, owner = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.unit)
    .bind(row.target_value)
    .bind(row.department_id)
    .bind(row.responsible_user_id)
    .bind(&row.owner)
    .bind(now)
    .bind(row.id)
    .execute(&state.pool)
    .await?;

    row.updated_at = now;
    let indicator = Indicator::try_from(row)?;
    log_activity(
        &state.event_bus,
        "updated",
        Some(principal.user_id),
        &indicator,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(indicator))
}

#[utoipa::path(
    put,
    path = "/indicators/{id}/value",
    tag = "Indicators",
    params(("id" = Uuid, Path, description = "Indicator id")),
    request_body = ValueUpdateRequest,
    responses((status = 200, description = "Actual value recorded", body = Indicator), (status = 403, description = "Value update not permitted"))
)]
pub async fn update_indicator_value(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ValueUpdateRequest>,
) -> AppResult<Json<Indicator>> {
    if !payload.actual_value.is_finite() {
        return Err(AppError::bad_request("actual_value must be a finite number"));
    }

    let mut row = fetch_indicator(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::UpdateValue).await?;
    let old = Indicator::try_from(row.clone())?;

    let now = utc_now();
    sqlx::query("UPDATE indicators SET actual_value = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(payload.actual_value)
        .bind(now)
        .bind(row.id)
        .execute(&state.pool)
        .await?;

    row.actual_value = Some(payload.actual_value);
    row.updated_at = now;
    let indicator = Indicator::try_from(row)?;
    log_activity(
        &state.event_bus,
        "value_updated",
        Some(principal.user_id),
        &indicator,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(indicator))
}

#[utoipa::path(
    delete,
    path = "/indicators/{id}",
    tag = "Indicators",
    params(("id" = Uuid, Path, description = "Indicator id")),
    responses(
        (status = 204, description = "Indicator soft deleted"),
        (status = 403, description = "Delete not permitted"),
        (status = 409, description = "Indicator still has children")
    )
)]
pub async fn delete_indicator(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let row = fetch_indicator(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Delete).await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let children: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM indicators WHERE parent_id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    if children > 0 {
        return Err(AppError::conflict(format!(
            "indicator has {children} child indicator(s); delete them first"
        )));
    }

    let affected = sqlx::query("UPDATE indicators SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("indicator not found"));
    }

    tx.commit().await?;

    let indicator = Indicator::try_from(row)?;
    log_activity(
        &state.event_bus,
        "deleted",
        Some(principal.user_id),
        &indicator,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_indicator(pool: &SqlitePool, id: Uuid) -> AppResult<DbIndicator> {
    sqlx::query_as::<_, DbIndicator>(&format!("{INDICATOR_SELECT} WHERE i.id = ? AND i.deleted_at IS NULL"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("indicator not found"))
}
