//! Cadence assignment.

mod common;

use chasing_core::{assigner::CustomerCadenceAssigner, model::AssignmentMode};
use common::fixture;
use serde_json::json;

/// Without the smart-chasing feature nothing is assigned.
#[test]
fn feature_flag_gates_assignment() {
    let mut f = fixture();
    f.cadence_with("Default", None, AssignmentMode::Default, None);
    let c = f.customer("Plain", None, None);
    f.tenant.features.clear();

    let mut assigner = CustomerCadenceAssigner::new(&f.store, "smart_chasing");

    assert!(assigner.assign(&f.tenant, &c).unwrap().is_none());
}

/// The first conditional cadence whose condition holds wins.
#[test]
fn first_matching_condition_wins() {
    let f = fixture();
    f.cadence_with("UK", None, AssignmentMode::Conditional, Some("country == 'GB'"));
    let gold = f.cadence_with(
        "Gold",
        None,
        AssignmentMode::Conditional,
        Some("metadata.tier == 'gold' && metadata.seats >= 40"),
    );
    f.cadence_with("Any US", None, AssignmentMode::Conditional, Some("country == 'US'"));
    f.cadence_with("Default", None, AssignmentMode::Default, None);
    let mut c = f.customer("Gold Member", None, None);
    c.metadata.insert("tier".into(), json!("gold"));
    c.metadata.insert("seats".into(), json!(50));

    let mut assigner = CustomerCadenceAssigner::new(&f.store, "smart_chasing");

    assert_eq!(assigner.assign(&f.tenant, &c).unwrap().map(|c| c.id), Some(gold.id));
}

/// Broken and erroring conditions never match; the default applies.
#[test]
fn bad_conditions_fall_back_to_default() {
    let f = fixture();
    f.cadence_with("Broken", None, AssignmentMode::Conditional, Some("country =="));
    f.cadence_with("Type error", None, AssignmentMode::Conditional, Some("name > 5"));
    f.cadence_with("No condition", None, AssignmentMode::Conditional, None);
    f.cadence_with("Manual", None, AssignmentMode::None, Some("true"));
    let default = f.cadence_with("Default", None, AssignmentMode::Default, None);
    let c = f.customer("Fallback", None, None);

    let mut assigner = CustomerCadenceAssigner::new(&f.store, "smart_chasing");

    assert_eq!(
        assigner.assign(&f.tenant, &c).unwrap().map(|c| c.id),
        Some(default.id)
    );
}

/// No match and no default means no cadence.
#[test]
fn no_default_means_no_cadence() {
    let f = fixture();
    f.cadence_with("UK", None, AssignmentMode::Conditional, Some("country == 'GB'"));
    let c = f.customer("Nowhere", None, None);

    let mut assigner = CustomerCadenceAssigner::new(&f.store, "smart_chasing");

    assert!(assigner.assign(&f.tenant, &c).unwrap().is_none());
}

/// Cadence lists are read once per assigner.
#[test]
fn cadences_are_cached_per_assigner() {
    let f = fixture();
    let first = f.cadence_with("Default", None, AssignmentMode::Default, None);
    let c = f.customer("Cached", None, None);
    let mut assigner = CustomerCadenceAssigner::new(&f.store, "smart_chasing");
    assert_eq!(assigner.assign(&f.tenant, &c).unwrap().map(|c| c.id), Some(first.id));

    f.cadence_with("Everyone", None, AssignmentMode::Conditional, Some("true"));

    assert_eq!(assigner.assign(&f.tenant, &c).unwrap().map(|c| c.id), Some(first.id));
    let mut fresh = CustomerCadenceAssigner::new(&f.store, "smart_chasing");
    assert_ne!(fresh.assign(&f.tenant, &c).unwrap().map(|c| c.id), Some(first.id));
}
