//! Authorization module - resource-based policy engine
//!
//! Decides, per request, whether a principal may perform an [`Operation`] on a
//! KPI, CSF, success factor or indicator. The pieces, leaves first:
//!
//! - [`lookup`] resolves role membership and department into a [`Principal`]
//! - [`ownership`] decides whether the principal owns a resource
//! - [`rules`] is the pure decision table
//! - [`evaluator`] wraps the table behind the pluggable [`PolicyEvaluator`] trait
//! - [`gate`] runs the evaluator inside handlers and maps denials to 403

pub mod evaluator;
pub mod gate;
pub mod lookup;
pub mod ownership;
mod principal;
mod resource;
pub mod rules;

pub use evaluator::{PolicyEvaluator, RuleTablePolicy};
pub use gate::{authorize, require_administrator, CurrentPrincipal};
pub use principal::{Capability, Principal};
pub use resource::{AuthorizedResource, DepartmentMatch, ResourceAttributes, ResourceKind};
pub use rules::{Rule, Verdict};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Well-known role names, as stored in the `roles` table
pub mod roles {
    pub const ADMINISTRATOR: &str = "Administrator";
    pub const MANAGER: &str = "Manager";
    pub const CMO: &str = "CMO";
    pub const INDICATOR_OWNER: &str = "IndicatorOwner";
    pub const USER: &str = "User";

    pub const ALL: [&str; 5] = [ADMINISTRATOR, MANAGER, CMO, INDICATOR_OWNER, USER];
}

/// An action requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    LinkKpi,
    LinkCsf,
    UpdateValue,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::LinkKpi,
        Operation::LinkCsf,
        Operation::UpdateValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::LinkKpi => "link_kpi",
            Operation::LinkCsf => "link_csf",
            Operation::UpdateValue => "update_value",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    /// Accepts `link_kpi`, `LinkKpi`, `link-kpi` and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match folded.as_str() {
            "create" => Ok(Operation::Create),
            "read" => Ok(Operation::Read),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "linkkpi" => Ok(Operation::LinkKpi),
            "linkcsf" => Ok(Operation::LinkCsf),
            "updatevalue" => Ok(Operation::UpdateValue),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

/// Outcome of an authorization check. There is no conditional outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}
