use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{AuthorizedResource, CurrentPrincipal, Operation, ResourceAttributes, ResourceKind};
use crate::errors::{AppError, AppResult};
use crate::models::permission::{OperationVerdict, PermissionReport};
use crate::routes::csfs::fetch_csf;
use crate::routes::indicators::fetch_indicator;
use crate::routes::kpis::fetch_kpi;
use crate::routes::success_factors::fetch_success_factor;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PermissionQuery {
    /// Restrict the report to one operation; unknown names are reported as denied
    pub operation: Option<String>,
}

/// Reports the decision for every operation on one resource.
///
/// Runs the same policy the mutating handlers use but never enforces it,
/// so clients can decide which controls to offer.
#[utoipa::path(
    get,
    path = "/authz/{kind}/{id}",
    tag = "Authorization",
    params(
        ("kind" = String, Path, description = "kpi, csf, success_factor or indicator"),
        ("id" = Uuid, Path, description = "Resource id"),
        PermissionQuery
    ),
    responses(
        (status = 200, description = "Per-operation decisions", body = PermissionReport),
        (status = 400, description = "Unknown resource kind"),
        (status = 404, description = "Resource not found")
    )
)]
pub async fn resource_permissions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((kind, id)): Path<(String, Uuid)>,
    Query(query): Query<PermissionQuery>,
) -> AppResult<Json<PermissionReport>> {
    let kind = kind.parse::<ResourceKind>().map_err(AppError::bad_request)?;
    let attributes = load_attributes(&state, kind, id).await?;

    let names: Vec<String> = match query.operation {
        Some(name) => vec![name.trim().to_string()],
        None => Operation::ALL.iter().map(|op| op.as_str().to_string()).collect(),
    };

    let mut operations = Vec::with_capacity(names.len());
    for name in names {
        let verdict = state.policy.evaluate_named(Some(&principal), &attributes, &name).await;
        let operation = name.parse::<Operation>().map(|op| op.as_str().to_string()).unwrap_or(name);
        operations.push(OperationVerdict {
            operation,
            decision: verdict.decision,
            rule: verdict.rule,
        });
    }

    Ok(Json(PermissionReport { kind, id, operations }))
}

async fn load_attributes(state: &AppState, kind: ResourceKind, id: Uuid) -> AppResult<ResourceAttributes> {
    let attributes = match kind {
        ResourceKind::Kpi => fetch_kpi(&state.pool, id).await?.attributes(),
        ResourceKind::Csf => fetch_csf(&state.pool, id).await?.attributes(),
        ResourceKind::SuccessFactor => fetch_success_factor(&state.pool, id).await?.attributes(),
        ResourceKind::Indicator => fetch_indicator(&state.pool, id).await?.attributes(),
    };
    Ok(attributes)
}
