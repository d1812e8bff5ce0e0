//! Whether the local actor may have a presence record at all.
//!
//! Housing is not part of this gate: an actor in a housing
//! district is eligible, but the engine never publishes its position there.

use crate::snapshot::{EligibilitySnapshot, ZoneUse};

/// Zone uses where sharing presence is allowed: the open world, cities,
/// public instanced zones and large-scale field content.
pub const ALLOWED_ZONE_USES: &[ZoneUse] = &[
    ZoneUse::City,
    ZoneUse::OpenWorld,
    ZoneUse::GoldSaucer,
    ZoneUse::Eureka,
    ZoneUse::Bozja,
];

/// Whether a zone use is on the allow-list.
#[must_use]
pub fn zone_allowed(zone_use: ZoneUse) -> bool {
    ALLOWED_ZONE_USES.contains(&zone_use)
}

/// The eligibility gate.
#[must_use]
pub fn is_eligible(snapshot: &EligibilitySnapshot) -> bool {
    snapshot.logged_in
        && snapshot.local_actor_present
        && snapshot.status_is_roleplaying
        && snapshot.zone_allowed
        && !snapshot.in_excluded_pvp_mode
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;

    fn eligible_snapshot() -> EligibilitySnapshot {
        EligibilitySnapshot {
            local_actor_present: true,
            logged_in: true,
            in_excluded_pvp_mode: false,
            status_is_roleplaying: true,
            in_housing_district: false,
            zone_allowed: true,
            position: DVec2::ZERO,
            placement: None,
        }
    }

    #[test]
    fn test_all_conditions_met() {
        assert!(is_eligible(&eligible_snapshot()));
    }

    #[test]
    fn test_each_condition_blocks() {
        let mut s = eligible_snapshot();
        s.logged_in = false;
        assert!(!is_eligible(&s));

        let mut s = eligible_snapshot();
        s.local_actor_present = false;
        assert!(!is_eligible(&s));

        let mut s = eligible_snapshot();
        s.status_is_roleplaying = false;
        assert!(!is_eligible(&s));

        let mut s = eligible_snapshot();
        s.zone_allowed = false;
        assert!(!is_eligible(&s));

        let mut s = eligible_snapshot();
        s.in_excluded_pvp_mode = true;
        assert!(!is_eligible(&s));
    }

    #[test]
    fn test_housing_does_not_affect_eligibility() {
        let mut s = eligible_snapshot();
        s.in_housing_district = true;
        assert!(is_eligible(&s));
    }

    #[test]
    fn test_allow_list() {
        assert!(zone_allowed(ZoneUse::City));
        assert!(zone_allowed(ZoneUse::GoldSaucer));
        assert!(zone_allowed(ZoneUse::Bozja));
        assert!(!zone_allowed(ZoneUse::Dungeon));
        assert!(!zone_allowed(ZoneUse::HousingInterior));
        assert!(!zone_allowed(ZoneUse::Pvp));
    }
}
