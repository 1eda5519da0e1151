use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Decision, ResourceKind, Rule};

/// Decision for one operation, with the rule that produced it.
#[derive(Debug, Serialize, ToSchema)]
pub struct OperationVerdict {
    /// Operation name as evaluated, e.g. `link_kpi`
    #[schema(example = "update_value")]
    pub operation: String,
    pub decision: Decision,
    pub rule: Rule,
}

/// What the caller may do with one resource.
#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionReport {
    pub kind: ResourceKind,
    pub id: Uuid,
    pub operations: Vec<OperationVerdict>,
}
