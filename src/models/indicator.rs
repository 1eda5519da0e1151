use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{AuthorizedResource, ResourceAttributes, ResourceKind};
use crate::errors::AppError;
use crate::events::Loggable;

/// Level in the KRI -> RI -> PI hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    /// Key result indicator
    Kri,
    /// Result indicator
    Ri,
    /// Performance indicator
    Pi,
}

impl IndicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Kri => "kri",
            IndicatorType::Ri => "ri",
            IndicatorType::Pi => "pi",
        }
    }

    /// The type a parent must have, `None` for top-level indicators.
    pub fn parent_type(&self) -> Option<IndicatorType> {
        match self {
            IndicatorType::Kri => None,
            IndicatorType::Ri => Some(IndicatorType::Kri),
            IndicatorType::Pi => Some(IndicatorType::Ri),
        }
    }

    /// Checks the hierarchy rule for a child of this type.
    pub fn validate_parent(&self, parent: Option<IndicatorType>) -> Result<(), AppError> {
        match (self.parent_type(), parent) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(AppError::bad_request(format!("a {} cannot have a parent", self))),
            (Some(expected), None) => Err(AppError::bad_request(format!(
                "a {} needs a {} parent",
                self, expected
            ))),
            (Some(expected), Some(actual)) if expected == actual => Ok(()),
            (Some(expected), Some(actual)) => Err(AppError::bad_request(format!(
                "a {} needs a {} parent, got {}",
                self, expected, actual
            ))),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kri" => Ok(IndicatorType::Kri),
            "ri" => Ok(IndicatorType::Ri),
            "pi" => Ok(IndicatorType::Pi),
            other => Err(AppError::bad_request(format!("unknown indicator type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Indicator {
    pub id: Uuid,
    pub indicator_type: IndicatorType,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Indicator {
    fn entity_type() -> &'static str { "indicator" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbIndicator {
    pub id: Uuid,
    pub indicator_type: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbIndicator> for Indicator {
    type Error = AppError;

    fn try_from(value: DbIndicator) -> Result<Self, Self::Error> {
        let indicator_type = value
            .indicator_type
            .parse::<IndicatorType>()
            .map_err(|_| AppError::internal(format!("stored indicator type is invalid: {}", value.indicator_type)))?;

        Ok(Indicator {
            id: value.id,
            indicator_type,
            parent_id: value.parent_id,
            name: value.name,
            description: value.description,
            unit: value.unit,
            target_value: value.target_value,
            actual_value: value.actual_value,
            department_id: value.department_id,
            department_name: value.department_name,
            responsible_user_id: value.responsible_user_id,
            owner: value.owner,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl AuthorizedResource for DbIndicator {
    fn attributes(&self) -> ResourceAttributes {
        ResourceAttributes::new(ResourceKind::Indicator)
            .with_id(self.id)
            .with_department(self.department_id, self.department_name.clone())
            .with_creator(self.created_by)
            .with_responsible_user(self.responsible_user_id)
            .with_owner_display(self.owner.clone())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IndicatorCreateRequest {
    pub indicator_type: IndicatorType,
    pub parent_id: Option<Uuid>,
    #[schema(example = "Net promoter score")]
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
    /// Defaults to the caller's department
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IndicatorUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub target_value: Option<f64>,
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub owner: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_runs_kri_ri_pi() {
        assert!(IndicatorType::Kri.validate_parent(None).is_ok());
        assert!(IndicatorType::Ri.validate_parent(Some(IndicatorType::Kri)).is_ok());
        assert!(IndicatorType::Pi.validate_parent(Some(IndicatorType::Ri)).is_ok());
    }

    #[test]
    fn hierarchy_violations_are_bad_requests() {
        assert!(matches!(
            IndicatorType::Kri.validate_parent(Some(IndicatorType::Kri)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(IndicatorType::Ri.validate_parent(None), Err(AppError::BadRequest(_))));
        assert!(matches!(
            IndicatorType::Pi.validate_parent(Some(IndicatorType::Kri)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn types_parse_case_insensitively() {
        assert_eq!("KRI".parse::<IndicatorType>().unwrap(), IndicatorType::Kri);
        assert!("kpi".parse::<IndicatorType>().is_err());
    }
}
