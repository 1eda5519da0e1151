use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{AuthorizedResource, ResourceAttributes, ResourceKind};
use crate::events::Loggable;

/// Critical success factor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Csf {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    /// Free-text owner kept for records without a responsible user
    pub owner: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Csf {
    fn entity_type() -> &'static str { "csf" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCsf {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbCsf> for Csf {
    fn from(value: DbCsf) -> Self {
        Csf {
            id: value.id,
            name: value.name,
            description: value.description,
            department_id: value.department_id,
            department_name: value.department_name,
            responsible_user_id: value.responsible_user_id,
            owner: value.owner,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl AuthorizedResource for DbCsf {
    fn attributes(&self) -> ResourceAttributes {
        ResourceAttributes::new(ResourceKind::Csf)
            .with_id(self.id)
            .with_department(self.department_id, self.department_name.clone())
            .with_creator(self.created_by)
            .with_responsible_user(self.responsible_user_id)
            .with_owner_display(self.owner.clone())
    }
}

/// Create and update payload shared by CSFs and success factors.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FactorCreateRequest {
    #[schema(example = "Reliable delivery")]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the caller's department
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FactorUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkKpiRequest {
    pub kpi_id: Uuid,
}
