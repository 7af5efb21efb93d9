//! Merging drafts back: clean replays, conflicts, and branch retirement.

use crate::harness::aethelgard_fixture;
use saga_core::{BranchStatus, ContainerId, ContainerState, SagaError};
use serde_json::json;

#[test]
fn test_clean_merge_replays_the_detour() {
    let world = aethelgard_fixture().unwrap();

    let outcome = world.repo().merge("alt_ending_1", "main").unwrap();
    assert!(outcome.committed);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.replayed.len(), 1);

    // Main now carries its own line plus the detour, with the fold of
    // both drafts.
    let main = world.checkout("main").unwrap();
    assert_eq!(main.len(), 5);
    match world.container(&main, "scene_goblin_cave") {
        ContainerState::Scene(s) => {
            assert_eq!(s.title, "The Goblin Cave");
            assert_eq!(s.summary.as_deref(), Some("A wrong turn in the dark."));
        }
        other => panic!("expected a scene, got {:?}", other.kind()),
    }
}

#[test]
fn test_merged_source_is_frozen() {
    let world = aethelgard_fixture().unwrap();
    world.repo().merge("alt_ending_1", "main").unwrap();

    let source = world.repo().branch("alt_ending_1").unwrap();
    assert_eq!(source.status, BranchStatus::Merged);

    let result = world.append(
        "alt_ending_1",
        "scene_epilogue",
        "CREATE_SCENE",
        json!({"title": "Epilogue"}),
    );
    let err = result.unwrap_err().downcast::<SagaError>().unwrap();
    assert!(matches!(err, SagaError::BranchNotActive { .. }));

    // Reading a retired branch still works.
    let snapshot = world.checkout("alt_ending_1").unwrap();
    assert!(snapshot.contains_key(&"scene_goblin_cave".into()));
}

#[test]
fn test_remerging_identical_branches_is_a_noop() {
    let world = aethelgard_fixture().unwrap();
    world.repo().merge("alt_ending_1", "main").unwrap();

    let count_before = world.repo().store().event_count().unwrap();

    // After the first merge the fork has nothing main lacks. A twin fork
    // of the merged main also merges without writing anything.
    world.fork("twin", "main").unwrap();
    let outcome = world.repo().merge("twin", "main").unwrap();

    assert!(outcome.committed);
    assert!(outcome.replayed.is_empty());
    assert_eq!(world.repo().store().event_count().unwrap(), count_before);
}

#[test]
fn test_dark_path_conflict_commits_nothing() {
    let world = aethelgard_fixture().unwrap();

    world.fork("dark_path", "main").unwrap();
    world
        .append(
            "dark_path",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "fallen knight", "traits": ["broken", "vengeful"]}),
        )
        .unwrap();
    world
        .append(
            "main",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "champion"}),
        )
        .unwrap();

    let main_before = world.checkout("main").unwrap();
    let outcome = world.repo().merge("dark_path", "main").unwrap();

    assert!(!outcome.committed);
    assert_eq!(outcome.conflicts, vec![ContainerId::new("char_lancelot")]);
    assert!(outcome.replayed.is_empty());

    // Nothing landed on main, and the source stays open for rework.
    let main_after = world.checkout("main").unwrap();
    assert_eq!(*main_before, *main_after);
    assert_eq!(
        world.repo().branch("dark_path").unwrap().status,
        BranchStatus::Active
    );
}

#[test]
fn test_conflict_resolved_on_target_then_remerged() {
    let world = aethelgard_fixture().unwrap();

    world.fork("dark_path", "main").unwrap();
    world
        .append(
            "dark_path",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "fallen knight"}),
        )
        .unwrap();
    world
        .append(
            "main",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "champion"}),
        )
        .unwrap();

    assert!(!world.repo().merge("dark_path", "main").unwrap().committed);

    // Adopt the dark path's reading on main, then retry: the sides now
    // agree on Lancelot and the merge reduces to a no-op.
    world
        .append(
            "main",
            "char_lancelot",
            "UPDATE_CHARACTER",
            json!({"role": "fallen knight"}),
        )
        .unwrap();

    let outcome = world.repo().merge("dark_path", "main").unwrap();
    assert!(outcome.committed);
    assert!(outcome.conflicts.is_empty());
}

#[test]
fn test_discarded_branch_leaves_events_in_the_log() {
    let world = aethelgard_fixture().unwrap();
    let count_before = world.repo().store().event_count().unwrap();

    world.repo().discard_branch("alt_ending_1").unwrap();

    let names: Vec<String> = world
        .repo()
        .branches()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["main"]);

    // Discard drops the pointer only. The detour's events survive and
    // the forest still audits clean.
    assert_eq!(world.repo().store().event_count().unwrap(), count_before);
    assert!(!world.repo().verify().unwrap().has_issues());
}
