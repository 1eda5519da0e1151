//! Ownership predicates.
//!
//! Base KPIs and indicator-style resources (CSFs, success factors, KRI/RI/PI)
//! define ownership differently. Both definitions are kept as separate
//! predicates; merging them would change who may update what.

use super::principal::{Capability, Principal};
use super::resource::{ResourceAttributes, ResourceKind};

pub fn is_owner(principal: &Principal, resource: &ResourceAttributes) -> bool {
    match resource.kind {
        ResourceKind::Kpi => is_kpi_owner(principal, resource),
        ResourceKind::Csf | ResourceKind::SuccessFactor | ResourceKind::Indicator => {
            is_indicator_owner(principal, resource)
        }
    }
}

/// Owner capability plus either the responsible-user reference or, for rows
/// that predate it, both names appearing in the owner display text.
pub fn is_indicator_owner(principal: &Principal, resource: &ResourceAttributes) -> bool {
    if !principal.has(Capability::IndicatorOwner) {
        return false;
    }

    if resource.responsible_user_id == Some(principal.user_id) {
        return true;
    }

    match resource.owner_display.as_deref() {
        Some(owner) => {
            !principal.first_name.is_empty()
                && !principal.last_name.is_empty()
                && owner.contains(principal.first_name.as_str())
                && owner.contains(principal.last_name.as_str())
        }
        None => false,
    }
}

/// KPI owner flag plus an exact match of the responsible person's name.
pub fn is_kpi_owner(principal: &Principal, resource: &ResourceAttributes) -> bool {
    principal.is_kpi_owner
        && resource
            .responsible_person
            .as_deref()
            .map(|person| person == principal.full_name())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles;
    use uuid::Uuid;

    fn owner_role(user_id: Uuid) -> Principal {
        Principal::new(user_id)
            .with_name("Grace", "Hopper")
            .with_roles([roles::INDICATOR_OWNER])
    }

    #[test]
    fn responsible_user_id_wins_over_failing_name_match() {
        let user_id = Uuid::new_v4();
        let principal = owner_role(user_id);
        let csf = ResourceAttributes::new(ResourceKind::Csf)
            .with_responsible_user(Some(user_id))
            .with_owner_display(Some("Somebody Else".to_string()));

        assert!(is_owner(&principal, &csf));
    }

    #[test]
    fn legacy_owner_text_needs_both_names() {
        let principal = owner_role(Uuid::new_v4());

        let both = ResourceAttributes::new(ResourceKind::Indicator)
            .with_owner_display(Some("Rear Admiral Grace M. Hopper".to_string()));
        let first_only = ResourceAttributes::new(ResourceKind::Indicator)
            .with_owner_display(Some("Grace Kelly".to_string()));

        assert!(is_owner(&principal, &both));
        assert!(!is_owner(&principal, &first_only));
    }

    #[test]
    fn no_owner_capability_means_no_ownership() {
        let user_id = Uuid::new_v4();
        let principal = Principal::new(user_id)
            .with_name("Grace", "Hopper")
            .with_roles([roles::USER]);
        let sf = ResourceAttributes::new(ResourceKind::SuccessFactor)
            .with_responsible_user(Some(user_id))
            .with_owner_display(Some("Grace Hopper".to_string()));

        assert!(!is_owner(&principal, &sf));
    }

    #[test]
    fn empty_names_never_match_owner_text() {
        let principal = Principal::new(Uuid::new_v4()).with_roles([roles::INDICATOR_OWNER]);
        let csf = ResourceAttributes::new(ResourceKind::Csf).with_owner_display(Some("anyone".to_string()));

        assert!(!is_owner(&principal, &csf));
    }

    #[test]
    fn kpi_ownership_uses_flag_and_exact_name() {
        let principal = Principal::new(Uuid::new_v4())
            .with_name("Grace", "Hopper")
            .with_kpi_owner(true);
        let kpi = ResourceAttributes::new(ResourceKind::Kpi)
            .with_responsible_person(Some("Grace Hopper".to_string()));

        assert!(is_owner(&principal, &kpi));

        let not_flagged = principal.clone().with_kpi_owner(false);
        assert!(!is_owner(&not_flagged, &kpi));

        let sloppy = ResourceAttributes::new(ResourceKind::Kpi)
            .with_responsible_person(Some("Dr. Grace Hopper".to_string()));
        assert!(!is_owner(&principal, &sloppy));
    }

    #[test]
    fn kpi_ownership_ignores_indicator_capability() {
        let user_id = Uuid::new_v4();
        let principal = owner_role(user_id);
        let kpi = ResourceAttributes::new(ResourceKind::Kpi).with_responsible_user(Some(user_id));

        assert!(!is_owner(&principal, &kpi));
    }
}
