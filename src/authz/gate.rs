use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::principal::Principal;
use super::resource::ResourceAttributes;
use super::rules::Verdict;
use super::{lookup, Operation};
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// The authenticated caller with roles and department resolved.
///
/// A valid token whose user cannot be resolved is rejected with 403: a
/// failed lookup counts as a denial.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        match lookup::load_principal(&state.pool, auth.user_id).await {
            Ok(Some(principal)) => Ok(CurrentPrincipal(principal)),
            Ok(None) => {
                tracing::warn!(user_id = %auth.user_id, "token subject no longer exists");
                Err(AppError::forbidden("access denied"))
            }
            Err(err) => {
                tracing::error!(user_id = %auth.user_id, error = %err, "principal lookup failed");
                Err(AppError::forbidden("access denied"))
            }
        }
    }
}

/// Runs the configured policy for `operation` on `resource`.
///
/// Must be called before any state is written. A denial is always returned
/// as [`AppError::Forbidden`]; handlers propagate it with `?`.
pub async fn authorize(
    state: &AppState,
    principal: &Principal,
    resource: &ResourceAttributes,
    operation: Operation,
) -> AppResult<Verdict> {
    let verdict = state.policy.evaluate(Some(principal), resource, operation).await;

    if verdict.is_allowed() {
        return Ok(verdict);
    }

    tracing::warn!(
        user_id = %principal.user_id,
        resource_kind = %resource.kind,
        resource_id = ?resource.id,
        operation = %operation,
        rule = verdict.rule.as_str(),
        "access denied"
    );
    Err(AppError::forbidden(format!("{} on {} is not permitted", operation, resource.kind)))
}

/// Guard for administrative endpoints outside the resource rule table.
pub fn require_administrator(principal: &Principal) -> AppResult<()> {
    if principal.is_administrator() {
        Ok(())
    } else {
        Err(AppError::forbidden("administrator role required"))
    }
}
