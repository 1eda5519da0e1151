use axum::extract::State;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Capability, CurrentPrincipal, Principal};
use crate::errors::AppResult;
use crate::models::dashboard::{Dashboard, DashboardCounts, DashboardScope};
use crate::models::indicator::{DbIndicator, Indicator};
use crate::models::kpi::{DbKpi, Kpi};
use crate::routes::indicators::INDICATOR_SELECT;
use crate::routes::kpis::KPI_SELECT;

const COUNTED_TABLES: [&str; 4] = ["kpis", "csfs", "success_factors", "indicators"];

#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    responses((status = 200, description = "Counts and owned items for the caller's scope", body = Dashboard))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Dashboard>> {
    let scope = DashboardScope::for_principal(&principal);

    let counts = match scope {
        DashboardScope::Organization => count_all(&state.pool, None).await?,
        DashboardScope::Department => count_all(&state.pool, principal.department_id).await?,
        DashboardScope::Personal => count_created_by(&state.pool, principal.user_id).await?,
    };

    let owned_kpis = owned_kpis(&state.pool, &principal).await?;
    let owned_indicators = owned_indicators(&state.pool, &principal).await?;

    tracing::debug!(user_id = %principal.user_id, ?scope, "dashboard built");

    Ok(Json(Dashboard {
        scope,
        department_id: principal.department_id,
        department_name: principal.department_name.clone(),
        counts,
        owned_kpis,
        owned_indicators,
    }))
}

async fn count_all(pool: &SqlitePool, department_id: Option<Uuid>) -> AppResult<DashboardCounts> {
    let mut totals = [0i64; 4];
    for (total, table) in totals.iter_mut().zip(COUNTED_TABLES) {
        *total = match department_id {
            Some(department_id) => {
                sqlx::query_scalar::<_, i64>(&format!(
                    "SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL AND department_id = ?"
                ))
                .bind(department_id)
                .fetch_one(pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL"))
                    .fetch_one(pool)
                    .await?
            }
        };
    }
    Ok(counts_from(totals))
}

async fn count_created_by(pool: &SqlitePool, user_id: Uuid) -> AppResult<DashboardCounts> {
    let mut totals = [0i64; 4];
    for (total, table) in totals.iter_mut().zip(COUNTED_TABLES) {
        *total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL AND created_by = ?"
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    }
    Ok(counts_from(totals))
}

fn counts_from([kpis, csfs, success_factors, indicators]: [i64; 4]) -> DashboardCounts {
    DashboardCounts {
        kpis,
        csfs,
        success_factors,
        indicators,
    }
}

/// KPIs naming the caller as responsible person, when they are a KPI owner.
async fn owned_kpis(pool: &SqlitePool, principal: &Principal) -> AppResult<Vec<Kpi>> {
    let full_name = principal.full_name();
    if !principal.is_kpi_owner || full_name.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, DbKpi>(&format!(
        "{KPI_SELECT} WHERE k.deleted_at IS NULL AND k.responsible_person = ? ORDER BY k.name"
    ))
    .bind(full_name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Kpi::from).collect())
}

async fn owned_indicators(pool: &SqlitePool, principal: &Principal) -> AppResult<Vec<Indicator>> {
    if !principal.has(Capability::IndicatorOwner) {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, DbIndicator>(&format!(
        "{INDICATOR_SELECT} WHERE i.deleted_at IS NULL AND i.responsible_user_id = ? ORDER BY i.indicator_type, i.name"
    ))
    .bind(principal.user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Indicator::try_from).collect()
}
