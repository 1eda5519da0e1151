use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub is_kpi_owner: bool,
    #[schema(example = json!(["Manager"]))]
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "registered" => Severity::Important,
            // role and profile changes alter what the user may do
            _ => Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub is_kpi_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_db(value: DbUser, roles: Vec<String>) -> Self {
        User {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
            department_id: value.department_id,
            department_name: value.department_name,
            is_kpi_owner: value.is_kpi_owner,
            roles,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(example = "Manager")]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserProfileUpdateRequest {
    /// Omit to keep the current department, `null` to clear it
    #[serde(default, deserialize_with = "crate::utils::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub department_id: Option<Option<Uuid>>,
    pub is_kpi_owner: Option<bool>,
}
