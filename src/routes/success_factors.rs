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
use crate::models::csf::{Csf, DbCsf, FactorCreateRequest, FactorUpdateRequest};
use crate::models::success_factor::{DbSuccessFactor, LinkCsfRequest, SuccessFactor};
use crate::routes::csfs::{fetch_csf, CSF_SELECT};
use crate::routes::departments::resolve_department;
use crate::routes::users::resolve_user;
use crate::utils::{optional_text, required_text, utc_now};

pub(crate) const SUCCESS_FACTOR_SELECT: &str = "SELECT s.id, s.name, s.description, s.department_id, d.name AS department_name, \
     s.responsible_user_id, s.owner, s.created_by, s.created_at, s.updated_at, s.deleted_at \
     FROM success_factors s LEFT JOIN departments d ON d.id = s.department_id";

#[derive(Debug, Deserialize, IntoParams)]
pub struct SuccessFactorListQuery {
    pub department_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/success-factors",
    tag = "Success factors",
    params(SuccessFactorListQuery),
    responses((status = 200, description = "List success factors", body = [SuccessFactor]))
)]
pub async fn list_success_factors(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Query(query): Query<SuccessFactorListQuery>,
) -> AppResult<Json<Vec<SuccessFactor>>> {
    let rows = match query.department_id {
        Some(department_id) => {
            sqlx::query_as::<_, DbSuccessFactor>(&format!(
                "{SUCCESS_FACTOR_SELECT} WHERE s.deleted_at IS NULL AND s.department_id = ? ORDER BY s.name"
            ))
            .bind(department_id)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbSuccessFactor>(&format!(
                "{SUCCESS_FACTOR_SELECT} WHERE s.deleted_at IS NULL ORDER BY s.name"
            ))
            .fetch_all(&state.pool)
            .await?
        }
    };

    Ok(Json(rows.into_iter().map(SuccessFactor::from).collect()))
}

#[utoipa::path(
    post,
    path = "/success-factors",
    tag = "Success factors",
    request_body = FactorCreateRequest,
    responses(
        (status = 201, description = "Success factor created", body = SuccessFactor),
        (status = 403, description = "Caller may not create success factors")
    )
)]
pub async fn create_success_factor(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<FactorCreateRequest>,
) -> AppResult<(StatusCode, Json<SuccessFactor>)> {
    let name = required_text("name", &payload.name)?;
    let department_id = payload.department_id.or(principal.department_id);
    let department_name = resolve_department(&state.pool, department_id).await?;
    let owner = optional_text(payload.owner);

    let prospective = ResourceAttributes::new(ResourceKind::SuccessFactor)
        .with_department(department_id, department_name)
        .with_creator(Some(principal.user_id))
        .with_responsible_user(payload.responsible_user_id)
        .with_owner_display(owner.clone());
    authorize(&state, &principal, &prospective, Operation::Create).await?;
    resolve_user(&state.pool, payload.responsible_user_id).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO success_factors (id, name, description, department_id, responsible_user_id, owner, created_by, created_at, updated_at) \
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

    let factor: SuccessFactor = fetch_success_factor(&state.pool, id).await?.into();
    log_activity(
        &state.event_bus,
        "created",
        Some(principal.user_id),
        &factor,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(factor)))
}

#[utoipa::path(
    get,
    path = "/success-factors/{id}",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id")),
    responses((status = 200, description = "Success factor detail", body = SuccessFactor), (status = 404, description = "Success factor not found"))
)]
pub async fn get_success_factor(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SuccessFactor>> {
    let row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;
    Ok(Json(row.into()))
}

#[utoipa::path(
    put,
    path = "/success-factors/{id}",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id")),
    request_body = FactorUpdateRequest,
    responses((status = 200, description = "Success factor updated", body = SuccessFactor), (status = 403, description = "Update not permitted"))
)]
pub async fn update_success_factor(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<FactorUpdateRequest>,
) -> AppResult<Json<SuccessFactor>> {
    let mut row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Update).await?;
    let old: SuccessFactor = row.clone().into();

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
        "UPDATE success_factors SET name = ?, description = ?, department_id = ?, responsible_user_id = ?, owner = ?, updated_at = ? \
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
    let factor: SuccessFactor = row.into();
    log_activity(
        &state.event_bus,
        "updated",
        Some(principal.user_id),
        &factor,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(factor))
}

#[utoipa::path(
    delete,
    path = "/success-factors/{id}",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id")),
    responses((status = 204, description = "Success factor soft deleted"), (status = 403, description = "Delete not permitted"))
)]
pub async fn delete_success_factor(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Delete).await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let affected =
        sqlx::query("UPDATE success_factors SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("success factor not found"));
    }

    sqlx::query("DELETE FROM success_factor_csfs WHERE success_factor_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let factor: SuccessFactor = row.into();
    log_activity(
        &state.event_bus,
        "deleted",
        Some(principal.user_id),
        &factor,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/success-factors/{id}/csfs",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id")),
    responses((status = 200, description = "CSFs linked to the success factor", body = [Csf]))
)]
pub async fn list_linked_csfs(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Csf>>> {
    let row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::Read).await?;

    let csfs = sqlx::query_as::<_, DbCsf>(&format!(
        "{CSF_SELECT} INNER JOIN success_factor_csfs sc ON sc.csf_id = c.id \
         WHERE sc.success_factor_id = ? AND c.deleted_at IS NULL ORDER BY c.name"
    ))
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(csfs.into_iter().map(Csf::from).collect()))
}

#[utoipa::path(
    post,
    path = "/success-factors/{id}/csfs",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id")),
    request_body = LinkCsfRequest,
    responses(
        (status = 201, description = "CSF linked", body = [Csf]),
        (status = 403, description = "Linking not permitted"),
        (status = 409, description = "CSF already linked")
    )
)]
pub async fn link_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<LinkCsfRequest>,
) -> AppResult<(StatusCode, Json<Vec<Csf>>)> {
    let row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::LinkCsf).await?;
    let _ = fetch_csf(&state.pool, payload.csf_id).await?;

    sqlx::query("INSERT INTO success_factor_csfs (success_factor_id, csf_id, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(payload.csf_id)
        .bind(utc_now())
        .execute(&state.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "csf already linked to this success factor"))?;

    let factor: SuccessFactor = row.into();
    log_activity(
        &state.event_bus,
        "csf_linked",
        Some(principal.user_id),
        &factor,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let Json(csfs) = list_linked_csfs(State(state), CurrentPrincipal(principal), Path(id)).await?;
    Ok((StatusCode::CREATED, Json(csfs)))
}

#[utoipa::path(
    delete,
    path = "/success-factors/{id}/csfs/{csf_id}",
    tag = "Success factors",
    params(("id" = Uuid, Path, description = "Success factor id"), ("csf_id" = Uuid, Path, description = "CSF id")),
    responses((status = 204, description = "CSF unlinked"), (status = 404, description = "Link not found"))
)]
pub async fn unlink_csf(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Path((id, csf_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let row = fetch_success_factor(&state.pool, id).await?;
    authorize(&state, &principal, &row.attributes(), Operation::LinkCsf).await?;

    let affected = sqlx::query("DELETE FROM success_factor_csfs WHERE success_factor_id = ? AND csf_id = ?")
        .bind(id)
        .bind(csf_id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("link not found"));
    }

    let factor: SuccessFactor = row.into();
    log_activity(
        &state.event_bus,
        "csf_unlinked",
        Some(principal.user_id),
        &factor,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_success_factor(pool: &SqlitePool, id: Uuid) -> AppResult<DbSuccessFactor> {
    sqlx::query_as::<_, DbSuccessFactor>(&format!("{SUCCESS_FACTOR_SELECT} WHERE s.id = ? AND s.deleted_at IS NULL"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("success factor not found"))
}
