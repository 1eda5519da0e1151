use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{AuthorizedResource, ResourceAttributes, ResourceKind};
use crate::events::Loggable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Kpi {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "%")]
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    /// Display name of the person accountable for the KPI
    #[schema(example = "Ada Lovelace")]
    pub responsible_person: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Kpi {
    fn entity_type() -> &'static str { "kpi" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbKpi {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub responsible_person: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbKpi> for Kpi {
    fn from(value: DbKpi) -> Self {
        Kpi {
            id: value.id,
            name: value.name,
            description: value.description,
            unit: value.unit,
            target_value: value.target_value,
            actual_value: value.actual_value,
            department_id: value.department_id,
            department_name: value.department_name,
            responsible_person: value.responsible_person,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl AuthorizedResource for DbKpi {
    fn attributes(&self) -> ResourceAttributes {
        ResourceAttributes::new(ResourceKind::Kpi)
            .with_id(self.id)
            .with_department(self.department_id, self.department_name.clone())
            .with_creator(self.created_by)
            .with_responsible_person(self.responsible_person.clone())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KpiCreateRequest {
    #[schema(example = "Customer retention rate")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "%")]
    pub unit: Option<String>,
    #[schema(example = 92.5)]
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    /// Defaults to the caller's department
    pub department_id: Option<Uuid>,
    #[schema(example = "Ada Lovelace")]
    pub responsible_person: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KpiUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub responsible_person: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValueUpdateRequest {
    #[schema(example = 88.1)]
    pub actual_value: f64,
}
