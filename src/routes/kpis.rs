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
use crate::models::kpi::{DbKpi, Kpi, KpiCreateRequest, KpiUpdateRequest, ValueUpdateRequest};
use crate::routes::departments::resolve_department;
use crate::utils::{optional_text, required_text, utc_now};

pub(crate) const KPI_SELECT: &str = "SELECT k.id, k.name, k.description, k.unit, k.target_value, k.actual_value, \
     k.department_id, d.name AS department_name, k.responsible_person, k.created_by, \
     k.created_at, k.updated_at, k.deleted_at \
     FROM kpis k LEFT JOIN departments d ON d.id = k.department_id";

#[derive(Debug, Deserialize, IntoParams)]
pub struct KpiListQuery {
    pub department_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/kpis",
    tag = "KPIs",
    params(KpiListQuery),
    responses((status = 200, description = "List KPIs", body = [Kpi]))
)]
pub async fn list_kpis(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Query(query): Query<KpiListQuery>,
) -> AppResult<Json<Vec<Kpi>>> {
    // Reads are open to every authenticated user, so the list is not filtered per caller.
    let rows = match query.department_id {
        Some(department_id) => {
            sqlx::query_as::<_, DbKpi>(&format!(
                "{KPI_SELECT} WHERE k.deleted_at IS NULL AND k.department_id = ? ORDER BY k.name"
            ))
            .bind(department_id)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbKpi>(&format!("{KPI_SELECT} WHERE k.deleted_at IS NULL ORDER BY k.name"))
                .fetch_all(&state.pool)
                .await?
        }
    };

    Ok(Json(rows.into_iter().map(Kpi::from).collect()))
}

#[utoipa::path(
    post,
    path = "/kpis",
    tag = "KPIs",
    request_body = KpiCreateRequest,
    responses(
        (status = 201, description = "KPI created", body = Kpi),
        (status = 403, description = "Caller may not create KPIs")
    )
)]
pub async fn create_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<KpiCreateRequest>,
) -> AppResult<(StatusCode, Json<Kpi>)> {
    let name = required_text("name", &payload.name)?;
    let department_id = payload.department_id.or(principal.department_id);
    let department_name = resolve_department(&state.pool, department_id).await?;
    let responsible_person = optional_text(payload.responsible_person);

    let prospective = ResourceAttributes::new(ResourceKind::Kpi)
        .with_department(department_id, department_name)
        .with_creator(Some(principal.user_id))
        .with_responsible_person(responsible_person.clone());
    authorize(&state, &principal, &prospective, Operation::Create).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO kpis (id, name, description, unit, target_value, actual_value, department_id, responsible_person, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&name)
    .bind(optional_text(payload.description))
    .bind(optional_text(payload.unit))
    .bind(payload.target_value)
    .bind(payload.actual_value)
    .bind(department_id)
    .bind(&responsible_person)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let kpi: Kpi = fetch_kpi(&state.pool, id).await?.into();
    log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &kpi,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(kpi)))
}

#[utoipa::path(
    get,
    path = "/kpis/{id}",
    tag = "KPIs",
    params(("id" = Uuid, Path, description = "KPI id")),
    responses((status = 200, description = "KPI detail", body = Kpi), (status = 404, description = "KPI not found"))
)]
pub async fn get_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Kpi>> {
    let row = fetch_kpi(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;
    Ok(Json(row.into()))
}

#[utoipa::path(
    put,
    path = "/kpis/{id}",
    tag = "KPIs",
    params(("id" = Uuid, Path, description = "KPI id")),
    request_body = KpiUpdateRequest,
    responses((status = 200, description = "KPI updated", body = Kpi), (status = 403, description = "Update not permitted"))
)]
pub async fn update_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<KpiUpdateRequest>,
) -> AppResult<Json<Kpi>> {
    let mut row = fetch_kpi(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Update).await?;
    let old: Kpi = row.clone().into();

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
    if payload.responsible_person.is_some() {
        row.responsible_person = optional_text(payload.responsible_person);
    }
    if let Some(department_id) = payload.department_id {
        row.department_name = resolve_department(&state.pool, Some(department_id)).await?;
        row.department_id = Some(department_id);
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE kpis SET name = ?, description = ?, unit = ?, target_value = ?, department_id = ?, responsible_person = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.unit)
    .bind(row.target_value)
    .bind(row.department_id)
    .bind(&row.responsible_person)
    .bind(now)
    .bind(row.id)
    .execute(&state.pool)
    .await?;

    row.updated_at = now;
    let kpi: Kpi = row.into();
    log_activity(
        &state.event_bus,
        "updated",
        Some(principal.user_id),
        &kpi,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(kpi))
}

#[utoipa::path(
    put,
    path = "/kpis/{id}/value",
    tag = "KPIs",
    params(("id" = Uuid, Path, description = "KPI id")),
    request_body = ValueUpdateRequest,
    responses((status = 200, description = "Actual value recorded", body = Kpi), (status = 403, description = "Value update not permitted"))
)]
pub async fn update_kpi_value(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ValueUpdateRequest>,
) -> AppResult<Json<Kpi>> {
    if !payload.actual_value.is_finite() {
        return Err(AppError::bad_request("actual_value must be a finite number"));
    }

    let mut row = fetch_kpi(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::UpdateValue).await?;
    let old: Kpi = row.clone().into();

    let now = utc_now();
    sqlx::query("UPDATE kpis SET actual_value = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(payload.actual_value)
        .bind(now)
        .bind(row.id)
        .execute(&state.pool)
        .await?;

    row.actual_value = Some(payload.actual_value);
    row.updated_at = now;
    let kpi: Kpi = row.into();
    log_activity(
        &state.event_bus,
        "value_updated",
        Some(principal.user_id),
        &kpi,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(kpi))
}

#[utoipa::path(
    delete,
    path = "/kpis/{id}",
    tag = "KPIs",
    params(("id" = Uuid, Path, description = "KPI id")),
    responses((status = 204, description = "KPI soft deleted"), (status = 403, description = "Delete not permitted"))
)]
pub async fn delete_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let row = fetch_kpi(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Delete).await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let affected = sqlx::query("UPDATE kpis SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("kpi not found"));
    }

    sqlx::query("DELETE FROM csf_kpis WHERE kpi_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let kpi: Kpi = row.into();
    log_activity(
        &state.event_bus,
        "deleted",
        Some(principal.user_id),
        &kpi,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_kpi(pool: &SqlitePool, id: Uuid) -> AppResult<DbKpi> {
    sqlx::query_as::<_, DbKpi>(&format!("{KPI_SELECT} WHERE k.id = ? AND k.deleted_at IS NULL"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("kpi not found"))
}
