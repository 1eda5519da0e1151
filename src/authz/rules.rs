//! The decision table.
//!
//! Rules are checked in order and the first one that grants wins:
//!
//! 1. unauthenticated caller -> deny
//! 2. Administrator -> allow
//! 3. Manager of the resource's department -> allow
//! 4. creator reading their own resource -> allow
//! 5. CMO reading or updating a CSF or success factor, any department -> allow
//! 6. per-operation table
//! 7. deny

use serde::Serialize;
use utoipa::ToSchema;

use super::ownership;
use super::principal::Principal;
use super::resource::{DepartmentMatch, ResourceAttributes, ResourceKind};
use super::{Decision, Operation};

/// The rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Unauthenticated,
    UnknownOperation,
    Administrator,
    DepartmentManager,
    CreatorRead,
    CmoCrossDepartment,
    OpenRead,
    CreatorRole,
    Owner,
    Cmo,
    DefaultDeny,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Unauthenticated => "unauthenticated",
            Rule::UnknownOperation => "unknown_operation",
            Rule::Administrator => "administrator",
            Rule::DepartmentManager => "department_manager",
            Rule::CreatorRead => "creator_read",
            Rule::CmoCrossDepartment => "cmo_cross_department",
            Rule::OpenRead => "open_read",
            Rule::CreatorRole => "creator_role",
            Rule::Owner => "owner",
            Rule::Cmo => "cmo",
            Rule::DefaultDeny => "default_deny",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Verdict {
    pub decision: Decision,
    pub rule: Rule,
}

impl Verdict {
    pub(crate) fn allow(rule: Rule) -> Self {
        Self { decision: Decision::Allow, rule }
    }

    pub(crate) fn deny(rule: Rule) -> Self {
        Self { decision: Decision::Deny, rule }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }
}

/// Absence on either side never matches.
pub fn same_department(principal: &Principal, resource: &ResourceAttributes) -> bool {
    match resource.kind.department_match() {
        DepartmentMatch::ById => match (principal.department_id, resource.department_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        },
        DepartmentMatch::ByName => match (&principal.department_name, &resource.department_name) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        },
    }
}

pub fn evaluate(principal: Option<&Principal>, resource: &ResourceAttributes, operation: Operation) -> Verdict {
    let Some(principal) = principal else {
        return Verdict::deny(Rule::Unauthenticated);
    };

    if principal.is_administrator() {
        return Verdict::allow(Rule::Administrator);
    }

    let is_manager = principal.is_manager();
    let is_cmo = principal.is_cmo();

    if is_manager && same_department(principal, resource) {
        return Verdict::allow(Rule::DepartmentManager);
    }

    if operation == Operation::Read && resource.created_by == Some(principal.user_id) {
        return Verdict::allow(Rule::CreatorRead);
    }

    if is_cmo
        && matches!(resource.kind, ResourceKind::Csf | ResourceKind::SuccessFactor)
        && matches!(operation, Operation::Read | Operation::Update)
    {
        return Verdict::allow(Rule::CmoCrossDepartment);
    }

    match operation {
        Operation::Read => Verdict::allow(Rule::OpenRead),
        Operation::Create => {
            if is_manager || is_cmo {
                Verdict::allow(Rule::CreatorRole)
            } else {
                Verdict::deny(Rule::DefaultDeny)
            }
        }
        Operation::Update | Operation::UpdateValue => {
            if ownership::is_owner(principal, resource) {
                Verdict::allow(Rule::Owner)
            } else if is_cmo {
                Verdict::allow(Rule::Cmo)
            } else {
                Verdict::deny(Rule::DefaultDeny)
            }
        }
        // only administrators and department managers delete, both handled above
        Operation::Delete => Verdict::deny(Rule::DefaultDeny),
        Operation::LinkKpi | Operation::LinkCsf => {
            if is_cmo {
                Verdict::allow(Rule::Cmo)
            } else {
                Verdict::deny(Rule::DefaultDeny)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles;
    use uuid::Uuid;

    const KINDS: [ResourceKind; 4] = [
        ResourceKind::Kpi,
        ResourceKind::Csf,
        ResourceKind::SuccessFactor,
        ResourceKind::Indicator,
    ];

    struct Dept {
        id: Uuid,
        name: &'static str,
    }

    fn dept(name: &'static str) -> Dept {
        Dept { id: Uuid::new_v4(), name }
    }

    fn user(roles: &[&str], department: &Dept) -> Principal {
        Principal::new(Uuid::new_v4())
            .with_name("Ada", "Lovelace")
            .with_roles(roles.iter().copied())
            .with_department(department.id, department.name)
    }

    fn resource(kind: ResourceKind, department: &Dept) -> ResourceAttributes {
        ResourceAttributes::new(kind)
            .with_id(Uuid::new_v4())
            .with_department(Some(department.id), Some(department.name.to_string()))
    }

    #[test]
    fn administrator_is_allowed_everything() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let admin = user(&[roles::ADMINISTRATOR], &finance);

        for kind in KINDS {
            for op in Operation::ALL {
                let verdict = evaluate(Some(&admin), &resource(kind, &sales), op);
                assert_eq!(verdict, Verdict::allow(Rule::Administrator), "{kind} {op}");
            }
        }
    }

    #[test]
    fn any_authenticated_principal_may_read() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let nobody = user(&[], &finance);

        for kind in KINDS {
            assert!(evaluate(Some(&nobody), &resource(kind, &sales), Operation::Read).is_allowed());
        }
    }

    #[test]
    fn unauthenticated_is_denied_even_reads() {
        let finance = dept("Finance");
        for op in Operation::ALL {
            let verdict = evaluate(None, &resource(ResourceKind::Kpi, &finance), op);
            assert_eq!(verdict, Verdict::deny(Rule::Unauthenticated));
        }
    }

    #[test]
    fn plain_users_never_delete() {
        let finance = dept("Finance");
        let plain = user(&[roles::USER], &finance);

        for kind in KINDS {
            let verdict = evaluate(Some(&plain), &resource(kind, &finance), Operation::Delete);
            assert_eq!(verdict.decision, Decision::Deny, "{kind}");
        }
    }

    #[test]
    fn department_manager_is_allowed_everything() {
        let finance = dept("Finance");
        let manager = user(&[roles::MANAGER], &finance);

        for kind in KINDS {
            for op in Operation::ALL {
                let verdict = evaluate(Some(&manager), &resource(kind, &finance), op);
                assert_eq!(verdict, Verdict::allow(Rule::DepartmentManager), "{kind} {op}");
            }
        }
    }

    #[test]
    fn foreign_manager_cannot_update_unless_cmo() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let manager = user(&[roles::MANAGER], &finance);
        let manager_cmo = user(&[roles::MANAGER, roles::CMO], &finance);

        for kind in KINDS {
            let target = resource(kind, &sales);
            assert_eq!(evaluate(Some(&manager), &target, Operation::Update).decision, Decision::Deny, "{kind}");
            assert!(evaluate(Some(&manager_cmo), &target, Operation::Update).is_allowed(), "{kind}");
        }
    }

    #[test]
    fn creator_may_read_own_resource() {
        let finance = dept("Finance");
        let plain = user(&[], &finance);
        let own = resource(ResourceKind::Kpi, &finance).with_creator(Some(plain.user_id));

        assert_eq!(evaluate(Some(&plain), &own, Operation::Read), Verdict::allow(Rule::CreatorRead));
        assert_eq!(evaluate(Some(&plain), &own, Operation::Update).decision, Decision::Deny);
    }

    #[test]
    fn create_is_gated_by_role_not_department() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let manager = user(&[roles::MANAGER], &finance);
        let cmo = user(&[roles::CMO], &finance);
        let plain = user(&[roles::USER], &sales);

        let target = ResourceAttributes::new(ResourceKind::Kpi)
            .with_department(Some(sales.id), Some(sales.name.to_string()));
        assert_eq!(evaluate(Some(&manager), &target, Operation::Create), Verdict::allow(Rule::CreatorRole));
        assert!(evaluate(Some(&cmo), &target, Operation::Create).is_allowed());
        assert_eq!(evaluate(Some(&plain), &target, Operation::Create).decision, Decision::Deny);
    }

    #[test]
    fn cmo_updates_csfs_and_success_factors_across_departments() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let cmo = user(&[roles::CMO], &finance);

        for kind in [ResourceKind::Csf, ResourceKind::SuccessFactor] {
            let target = resource(kind, &sales);
            assert_eq!(evaluate(Some(&cmo), &target, Operation::Update), Verdict::allow(Rule::CmoCrossDepartment));
            assert_eq!(evaluate(Some(&cmo), &target, Operation::Read), Verdict::allow(Rule::CmoCrossDepartment));
        }

        // The general table still lets a CMO update the other kinds.
        let kpi = resource(ResourceKind::Kpi, &sales);
        assert_eq!(evaluate(Some(&cmo), &kpi, Operation::Update), Verdict::allow(Rule::Cmo));
    }

    #[test]
    fn cmo_and_owners_never_delete() {
        let finance = dept("Finance");
        let cmo = user(&[roles::CMO, roles::INDICATOR_OWNER], &finance);

        for kind in KINDS {
            let target = resource(kind, &finance).with_responsible_user(Some(cmo.user_id));
            assert_eq!(evaluate(Some(&cmo), &target, Operation::Delete).decision, Decision::Deny, "{kind}");
        }
    }

    #[test]
    fn link_operations_need_department_manager_or_cmo() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let manager = user(&[roles::MANAGER], &finance);
        let cmo = user(&[roles::CMO], &finance);
        let owner = user(&[roles::INDICATOR_OWNER], &sales);

        let csf = resource(ResourceKind::Csf, &sales).with_responsible_user(Some(owner.user_id));
        assert_eq!(evaluate(Some(&manager), &csf, Operation::LinkKpi).decision, Decision::Deny);
        assert_eq!(evaluate(Some(&cmo), &csf, Operation::LinkKpi), Verdict::allow(Rule::Cmo));
        assert_eq!(evaluate(Some(&owner), &csf, Operation::LinkKpi).decision, Decision::Deny);
    }

    #[test]
    fn owners_update_values_of_their_indicators() {
        let finance = dept("Finance");
        let sales = dept("Sales");
        let owner = user(&[roles::INDICATOR_OWNER], &finance);
        let indicator = resource(ResourceKind::Indicator, &sales).with_responsible_user(Some(owner.user_id));

        assert_eq!(evaluate(Some(&owner), &indicator, Operation::UpdateValue), Verdict::allow(Rule::Owner));
        assert_eq!(evaluate(Some(&owner), &indicator, Operation::Update), Verdict::allow(Rule::Owner));

        let someone_elses = resource(ResourceKind::Indicator, &sales);
        assert_eq!(evaluate(Some(&owner), &someone_elses, Operation::UpdateValue).decision, Decision::Deny);
    }

    #[test]
    fn kpi_departments_compare_by_name() {
        let finance = dept("Finance");
        let manager = user(&[roles::MANAGER], &finance);

        // Same name under a different id still counts for KPIs...
        let kpi = ResourceAttributes::new(ResourceKind::Kpi)
            .with_department(Some(Uuid::new_v4()), Some("Finance".to_string()));
        assert_eq!(evaluate(Some(&manager), &kpi, Operation::Delete), Verdict::allow(Rule::DepartmentManager));

        // ...but not for CSFs, which compare ids.
        let csf = ResourceAttributes::new(ResourceKind::Csf)
            .with_department(Some(Uuid::new_v4()), Some("Finance".to_string()));
        assert_eq!(evaluate(Some(&manager), &csf, Operation::Delete).decision, Decision::Deny);
    }

    #[test]
    fn missing_department_is_not_a_wildcard() {
        let manager = Principal::new(Uuid::new_v4()).with_roles([roles::MANAGER]);
        let orphan = ResourceAttributes::new(ResourceKind::Indicator);

        assert_eq!(evaluate(Some(&manager), &orphan, Operation::Update).decision, Decision::Deny);
        assert_eq!(evaluate(Some(&manager), &orphan, Operation::Delete).decision, Decision::Deny);
    }
}
