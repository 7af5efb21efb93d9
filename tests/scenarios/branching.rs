//! Forking and comparison: divergent drafts off a shared history.

use crate::harness::{aethelgard_fixture, StoryWorld};
use saga_core::{ContainerId, ContainerState, EventId, SagaError};
use serde_json::json;

#[test]
fn test_fork_does_not_disturb_the_source() {
    let world = aethelgard_fixture().unwrap();
    let main_before = world.checkout("main").unwrap();

    world
        .append(
            "alt_ending_1",
            "char_mordred",
            "CREATE_CHARACTER",
            json!({"name": "Mordred", "role": "antagonist"}),
        )
        .unwrap();

    let main_after = world.checkout("main").unwrap();
    assert_eq!(*main_before, *main_after);
    assert!(!main_after.contains_key(&"char_mordred".into()));
}

#[test]
fn test_compare_splits_divergence_by_side() {
    let world = aethelgard_fixture().unwrap();

    let diff = world.repo().compare("main", "alt_ending_1").unwrap();
    assert_eq!(diff.only_in_a, vec!["scene_dragon_fight".into()]);
    assert_eq!(diff.only_in_b, vec!["scene_goblin_cave".into()]);
    assert!(diff.different.is_empty());
}

#[test]
fn test_compare_is_symmetric() {
    let world = aethelgard_fixture().unwrap();

    let ab = world.repo().compare("main", "alt_ending_1").unwrap();
    let ba = world.repo().compare("alt_ending_1", "main").unwrap();

    assert_eq!(ab.only_in_a, ba.only_in_b);
    assert_eq!(ab.only_in_b, ba.only_in_a);
    assert_eq!(ab.different.len(), ba.different.len());
}

#[test]
fn test_compare_reports_field_level_deltas() {
    let world = aethelgard_fixture().unwrap();

    // Both sides reshape Lancelot after the fork point.
    world
        .append(
            "main",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "champion"}),
        )
        .unwrap();
    world
        .append(
            "alt_ending_1",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "traitor"}),
        )
        .unwrap();

    let diff = world.repo().compare("main", "alt_ending_1").unwrap();
    let delta = diff
        .different
        .iter()
        .find(|d| d.container == ContainerId::new("char_lancelot"))
        .expect("lancelot should differ");

    assert_eq!(delta.fields.len(), 1);
    assert_eq!(delta.fields[0].field, "role");
    assert_eq!(delta.fields[0].a, Some(json!("champion")));
    assert_eq!(delta.fields[0].b, Some(json!("traitor")));
}

#[test]
fn test_fork_era_pins_a_container_copy() {
    let world = aethelgard_fixture().unwrap();

    let era = world
        .repo()
        .fork_era("main", &"char_lancelot".into(), "lancelot_era")
        .unwrap();
    assert_eq!(era.name, "lancelot_era");
    assert_eq!(era.source_branch.as_deref(), Some("main"));

    // Forked at Lancelot's last event: the dragon fight (appended later
    // on main) is outside the era's history.
    let snapshot = world.checkout("lancelot_era").unwrap();
    assert!(!snapshot.contains_key(&"scene_dragon_fight".into()));
    match world.container(&snapshot, "char_lancelot") {
        ContainerState::Character(c) => assert_eq!(c.name, "Lancelot"),
        other => panic!("expected a character, got {:?}", other.kind()),
    }
}

#[test]
fn test_duplicate_branch_name_rejected() {
    let world = aethelgard_fixture().unwrap();
    let result = world.fork("alt_ending_1", "main");

    let err = result.unwrap_err().downcast::<SagaError>().unwrap();
    assert!(matches!(err, SagaError::BranchExists(_)));
}

#[test]
fn test_branch_at_unknown_event_rejected() {
    let world = StoryWorld::new().unwrap();
    let result = world
        .repo()
        .create_branch("ghost", Some(EventId::from_u64(99)), Some("main"));
    assert!(matches!(result, Err(SagaError::NoSuchEvent(99))));
}
