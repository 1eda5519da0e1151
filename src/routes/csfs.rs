use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, AuthorizedResource, CurrentPrincipal, Operation, ResourceAttributes, ResourceKind};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::models::csf::{Csf, DbCsf, FactorCreateRequest, FactorUpdateRequest, LinkKpiRequest};
use crate::models::kpi::{DbKpi, Kpi};
use crate::routes::departments::resolve_department;
use crate::routes::kpis::{fetch_kpi, KPI_SELECT};
use crate::routes::users::resolve_user;
use crate::utils::{optional_text, required_text, utc_now};

pub(crate) const CSF_SELECT: &str = "SELECT c.id, c.name, c.description, c.department_id, d.name AS department_name, \
     c.responsible_user_id, c.owner, c.created_by, c.created_at, c.updated_at, c.deleted_at \
     FROM csfs c LEFT JOIN departments d ON d.id = c.department_id";

#[derive(Debug, Deserialize, IntoParams)]
pub struct CsfListQuery {
    pub department_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/csfs",
    tag = "CSFs",
    params(CsfListQuery),
    responses((status = 200, description = "List critical success factors", body = [Csf]))
)]
pub async fn list_csfs(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Query(query): Query<CsfListQuery>,
) -> AppResult<Json<Vec<Csf>>> {
    let rows = match query.department_id {
        Some(department_id) => {
            sqlx::query_as::<_, DbCsf>(&format!(
                "{CSF_SELECT} WHERE c.deleted_at IS NULL AND c.department_id = ? ORDER BY c.name"
            ))
            .bind(department_id)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbCsf>(&format!("{CSF_SELECT} WHERE c.deleted_at IS NULL ORDER BY c.name"))
                .fetch_all(&state.pool)
                .await?
        }
    };

    Ok(Json(rows.into_iter().map(Csf::from).collect()))
}

#[utoipa::path(
    post,
    path = "/csfs",
    tag = "CSFs",
    request_body = FactorCreateRequest,
    responses((status = 201, description = "CSF created", body = Csf), (status = 403, description = "Caller may not create CSFs"))
)]
pub async fn create_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<FactorCreateRequest>,
) -> AppResult<(StatusCode, Json<Csf>)> {
    let name = required_text("name", &payload.name)?;
    let department_id = payload.department_id.or(principal.department_id);
    let department_name = resolve_department(&state.pool, department_id).await?;
    let owner = optional_text(payload.owner);

    let prospective = ResourceAttributes::new(ResourceKind::Csf)
        .with_department(department_id, department_name)
        .with_creator(Some(principal.user_id))
        .with_responsible_user(payload.responsible_user_id)
        .with_owner_display(owner.clone());
    authorize(&state, &principal, &prospective, Operation::Create).await?;
    resolve_user(&state.pool, payload.responsible_user_id).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO csfs (id, name, description, department_id, responsible_user_id, owner, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&name)
    .bind(optional_text(payload.description))
    .bind(department_id)
    .bind(payload.responsible_user_id)
    .bind(&owner)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let csf: Csf = fetch_csf(&state.pool, id).await?.into();
    log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &csf,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(csf)))
}

#[utoipa::path(
    get,
    path = "/csfs/{id}",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id")),
    responses((status = 200, description = "CSF detail", body = Csf), (status = 404, description = "CSF not found"))
)]
pub async fn get_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Csf>> {
    let row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;
    Ok(Json(row.into()))
}

#[utoipa::path(
    put,
    path = "/csfs/{id}",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id")),
    request_body = FactorUpdateRequest,
    responses((status = 200, description = "CSF updated", body = Csf), (status = 403, description = "Update not permitted"))
)]
pub async fn update_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<FactorUpdateRequest>,
) -> AppResult<Json<Csf>> {
    let mut row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Update).await?;
    let old: Csf = row.clone().into();

    if let Some(name) = payload.name.as_deref() {
        row.name = required_text("name", name)?;
    }
    if payload.description.is_some() {
        row.description = optional_text(payload.description);
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
        "UPDATE csfs SET name = ?, description = ?, department_id = ?, responsible_user_id = ?, owner = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(row.department_id)
    .bind(row.responsible_user_id)
    .bind(&row.owner)
    .bind(now)
    .bind(row.id)
    .execute(&state.pool)
    .await?;

    row.updated_at = now;
    let csf: Csf = row.into();
    log_activity(
        &state.event_bus,
        "updated",
        Some(principal.user_id),
        &csf,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(csf))
}

#[utoipa::path(
    delete,
    path = "/csfs/{id}",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id")),
    responses((status = 204, description = "CSF soft deleted"), (status = 403, description = "Delete not permitted"))
)]
pub async fn delete_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Delete).await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let affected = sqlx::query("UPDATE csfs SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("csf not found"));
    }

    sqlx::query("DELETE FROM csf_kpis WHERE csf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM success_factor_csfs WHERE csf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let csf: Csf = row.into();
    log_activity(
        &state.event_bus,
        "deleted",
        Some(principal.user_id),
        &csf,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/csfs/{id}/kpis",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id")),
    responses((status = 200, description = "KPIs linked to the CSF", body = [Kpi]))
)]
pub async fn list_linked_kpis(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Kpi>>> {
    let row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;

    let kpis = sqlx::query_as::<_, DbKpi>(&format!(
        "{KPI_SELECT} INNER JOIN csf_kpis ck ON ck.kpi_id = k.id WHERE ck.csf_id = ? AND k.deleted_at IS NULL ORDER BY k.name"
    ))
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(kpis.into_iter().map(Kpi::from).collect()))
}

#[utoipa::path(
    post,
    path = "/csfs/{id}/kpis",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id")),
    request_body = LinkKpiRequest,
    responses(
        (status = 201, description = "KPI linked", body = [Kpi]),
        (status = 403, description = "Linking not permitted"),
        (status = 409, description = "KPI already linked")
    )
)]
pub async fn link_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<LinkKpiRequest>,
) -> AppResult<(StatusCode, Json<Vec<Kpi>>)> {
    let row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::LinkKpi).await?;
    let _ = fetch_kpi(&state.pool, payload.kpi_id).await?;

    sqlx::query("INSERT INTO csf_kpis (csf_id, kpi_id, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(payload.kpi_id)
        .bind(utc_now())
        .execute(&state.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "kpi already linked to this csf"))?;

    let csf: Csf = row.into();
    log_activity(
        &state.event_bus,
        "kpi_linked",
        Some(principal.user_id),
        &csf,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let Json(kpis) = list_linked_kpis(State(state), CurrentPrincipal(principal), Path(id)).await?;
    Ok((StatusCode::CREATED, Json(kpis)))
}

#[utoipa::path(
    delete,
    path = "/csfs/{id}/kpis/{kpi_id}",
    tag = "CSFs",
    params(("id" = Uuid, Path, description = "CSF id"), ("kpi_id" = Uuid, Path, description = "KPI id")),
    responses((status = 204, description = "KPI unlinked"), (status = 404, description = "Link not found"))
)]
pub async fn unlink_kpi(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path((id, kpi_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let row = fetch_csf(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::LinkKpi).await?;

    let affected = sqlx::query("DELETE FROM csf_kpis WHERE csf_id = ? AND kpi_id = ?")
        .bind(id)
        .bind(kpi_id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("link not found"));
    }

    let csf: Csf = row.into();
    log_activity(
        &state.event_bus,
        "kpi_unlinked",
        Some(principal.user_id),
        &csf,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_csf(pool: &SqlitePool, id: Uuid) -> AppResult<DbCsf> {
    sqlx::query_as::<_, DbCsf>(&format!("{CSF_SELECT} WHERE c.id = ? AND c.deleted_at IS NULL"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("csf not found"))
}
