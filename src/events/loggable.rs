use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs; drive retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Never auto-deleted
    Critical,
    #[default]
    Important,
}

/// Entities that can be written to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. `kpi` in `kpi.created`
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
