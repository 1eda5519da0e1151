use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Principal;
use crate::models::indicator::Indicator;
use crate::models::kpi::Kpi;

/// Which slice of the organisation a dashboard covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DashboardScope {
    Organization,
    Department,
    Personal,
}

impl DashboardScope {
    /// Administrators see everything, managers and CMOs their department,
    /// everyone else what they own.
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_administrator() {
            DashboardScope::Organization
        } else if (principal.is_manager() || principal.is_cmo()) && principal.department_id.is_some() {
            DashboardScope::Department
        } else {
            DashboardScope::Personal
        }
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct DashboardCounts {
    pub kpis: i64,
    pub csfs: i64,
    pub success_factors: i64,
    pub indicators: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub scope: DashboardScope,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub counts: DashboardCounts,
    pub owned_kpis: Vec<Kpi>,
    pub owned_indicators: Vec<Indicator>,
}
