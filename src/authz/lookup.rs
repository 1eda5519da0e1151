//! Role and department lookup against the identity tables.

use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::principal::Principal;
use crate::errors::AppResult;

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    department_id: Option<Uuid>,
    department_name: Option<String>,
    is_kpi_owner: bool,
}

/// Loads the principal for `user_id`, or `None` when the user no longer exists.
pub async fn load_principal(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<Principal>> {
    let row = sqlx::query_as::<_, PrincipalRow>(
        "SELECT u.id, u.first_name, u.last_name, u.department_id, d.name AS department_name, u.is_kpi_owner \
         FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.id = ? AND u.deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let roles = fetch_roles(pool, row.id).await?;

    let mut principal = Principal::new(row.id)
        .with_name(row.first_name, row.last_name)
        .with_roles(roles)
        .with_kpi_owner(row.is_kpi_owner);
    principal.department_id = row.department_id;
    principal.department_name = row.department_name;

    Ok(Some(principal))
}

pub async fn fetch_roles(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<String>> {
    let roles = sqlx::query_scalar::<_, String>(
        "SELECT role_name FROM user_roles WHERE user_id = ? ORDER BY role_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(roles)
}
