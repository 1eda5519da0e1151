use std::collections::HashSet;

use uuid::Uuid;

use super::roles;

/// Rights a role grants to the rule table. Roles without a capability (such
/// as `User`) only get the open-read policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Administrator,
    Manager,
    Cmo,
    IndicatorOwner,
}

impl Capability {
    /// Role names compare case-insensitively, like the identity store normalizes them.
    pub fn from_role_name(role: &str) -> Option<Self> {
        let role = role.trim();
        if role.eq_ignore_ascii_case(roles::ADMINISTRATOR) {
            Some(Capability::Administrator)
        } else if role.eq_ignore_ascii_case(roles::MANAGER) {
            Some(Capability::Manager)
        } else if role.eq_ignore_ascii_case(roles::CMO) {
            Some(Capability::Cmo)
        } else if role.eq_ignore_ascii_case(roles::INDICATOR_OWNER) {
            Some(Capability::IndicatorOwner)
        } else {
            None
        }
    }
}

/// Principal represents the authenticated user, resolved once per request
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub roles: HashSet<String>,
    pub capabilities: HashSet<Capability>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    /// Designated owner of base KPIs
    pub is_kpi_owner: bool,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            roles: HashSet::new(),
            capabilities: HashSet::new(),
            department_id: None,
            department_name: None,
            is_kpi_owner: false,
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Replaces the role set and recomputes capabilities from it.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self.capabilities = self
            .roles
            .iter()
            .filter_map(|role| Capability::from_role_name(role))
            .collect();
        self
    }

    pub fn with_department(mut self, department_id: Uuid, department_name: impl Into<String>) -> Self {
        self.department_id = Some(department_id);
        self.department_name = Some(department_name.into());
        self
    }

    pub fn with_kpi_owner(mut self, is_kpi_owner: bool) -> Self {
        self.is_kpi_owner = is_kpi_owner;
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_administrator(&self) -> bool {
        self.has(Capability::Administrator)
    }

    pub fn is_manager(&self) -> bool {
        self.has(Capability::Manager)
    }

    pub fn is_cmo(&self) -> bool {
        self.has(Capability::Cmo)
    }

    /// Display name as written into `responsible_person` fields.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_resolve_to_capabilities() {
        let principal = Principal::new(Uuid::new_v4()).with_roles(["manager", "CMO", "User"]);

        assert!(principal.is_manager());
        assert!(principal.is_cmo());
        assert!(!principal.is_administrator());
        assert_eq!(principal.capabilities.len(), 2);
        assert_eq!(principal.roles.len(), 3);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let principal = Principal::new(Uuid::new_v4()).with_roles(["Auditor"]);
        assert!(principal.capabilities.is_empty());
    }

    #[test]
    fn full_name_joins_with_a_space() {
        let principal = Principal::new(Uuid::new_v4()).with_name("Ada", "Lovelace");
        assert_eq!(principal.full_name(), "Ada Lovelace");
    }
}
