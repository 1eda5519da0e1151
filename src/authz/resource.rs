use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kinds of domain objects guarded by the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Kpi,
    Csf,
    SuccessFactor,
    Indicator,
}

/// How a principal's department is compared with a resource's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentMatch {
    ById,
    /// Legacy KPI-base handler compares department names
    ByName,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Kpi => "kpi",
            ResourceKind::Csf => "csf",
            ResourceKind::SuccessFactor => "success_factor",
            ResourceKind::Indicator => "indicator",
        }
    }

    pub fn department_match(&self) -> DepartmentMatch {
        match self {
            ResourceKind::Kpi => DepartmentMatch::ByName,
            ResourceKind::Csf | ResourceKind::SuccessFactor | ResourceKind::Indicator => DepartmentMatch::ById,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "kpi" | "kpis" => Ok(ResourceKind::Kpi),
            "csf" | "csfs" => Ok(ResourceKind::Csf),
            "success_factor" | "success_factors" => Ok(ResourceKind::SuccessFactor),
            "indicator" | "indicators" => Ok(ResourceKind::Indicator),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Attributes of a resource that the rule table reads
#[derive(Debug, Clone)]
pub struct ResourceAttributes {
    pub kind: ResourceKind,
    /// `None` for a resource that is about to be created
    pub id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub created_by: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub responsible_person: Option<String>,
    /// Free-text owner display name kept for rows without a responsible user
    pub owner_display: Option<String>,
}

impl ResourceAttributes {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            id: None,
            department_id: None,
            department_name: None,
            created_by: None,
            responsible_user_id: None,
            responsible_person: None,
            owner_display: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_department(mut self, department_id: Option<Uuid>, department_name: Option<String>) -> Self {
        self.department_id = department_id;
        self.department_name = department_name;
        self
    }

    pub fn with_creator(mut self, created_by: Option<Uuid>) -> Self {
        self.created_by = created_by;
        self
    }

    pub fn with_responsible_user(mut self, user_id: Option<Uuid>) -> Self {
        self.responsible_user_id = user_id;
        self
    }

    pub fn with_responsible_person(mut self, person: Option<String>) -> Self {
        self.responsible_person = person;
        self
    }

    pub fn with_owner_display(mut self, owner: Option<String>) -> Self {
        self.owner_display = owner;
        self
    }
}

/// Implemented by domain models that can be handed to the gate.
pub trait AuthorizedResource {
    fn attributes(&self) -> ResourceAttributes;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_path_segments() {
        assert_eq!("kpis".parse::<ResourceKind>(), Ok(ResourceKind::Kpi));
        assert_eq!("success-factors".parse::<ResourceKind>(), Ok(ResourceKind::SuccessFactor));
        assert_eq!("CSF".parse::<ResourceKind>(), Ok(ResourceKind::Csf));
        assert!("widgets".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn only_kpis_compare_departments_by_name() {
        assert_eq!(ResourceKind::Kpi.department_match(), DepartmentMatch::ByName);
        assert_eq!(ResourceKind::Csf.department_match(), DepartmentMatch::ById);
        assert_eq!(ResourceKind::Indicator.department_match(), DepartmentMatch::ById);
    }
}
