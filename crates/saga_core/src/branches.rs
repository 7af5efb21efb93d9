//! Branch registry: named, independently advanceable pointers into the
//! event forest.

use crate::error::{Result, SagaError};
use crate::event::EventId;
use crate::store::EventStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a branch.
///
/// `Active` accepts appends. `Merged` is terminal: all divergent
/// containers have been replayed into a target and the branch is frozen.
/// Discarding removes the branch pointer entirely (its events remain
/// reachable from any branch sharing ancestry), so it has no stored
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchStatus {
    /// Accepting appends.
    Active,
    /// Replayed into a target branch; frozen.
    Merged,
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Merged => f.write_str("merged"),
        }
    }
}

/// A named pointer into the event forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Unique, human-chosen name (e.g. "main", "alt_ending_1").
    pub name: String,
    /// The most recent event considered current for this branch. May be
    /// an event authored on a fork ancestor; `None` for a branch with no
    /// history at all.
    pub head: Option<EventId>,
    /// Branch this one diverged from (`None` for the root branch).
    pub source_branch: Option<String>,
    /// The event this branch diverged at (`None` for the root branch).
    pub forked_at: Option<EventId>,
    /// Cached count of events reachable from the head. Not authoritative;
    /// the chain walk is.
    pub event_count: u64,
    /// Lifecycle status.
    pub status: BranchStatus,
    /// Creation time (Unix seconds).
    pub created_at_unix: u64,
}

impl Branch {
    /// The implicit root branch, with no parent and no history.
    pub fn root(name: impl Into<String>, now_unix: u64) -> Self {
        Self {
            name: name.into(),
            head: None,
            source_branch: None,
            forked_at: None,
            event_count: 0,
            status: BranchStatus::Active,
            created_at_unix: now_unix,
        }
    }
}

/// Registry of branches backed by the event store.
pub struct BranchRegistry<'a> {
    store: &'a EventStore,
}

impl<'a> BranchRegistry<'a> {
    /// Creates a registry over the given store.
    pub fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Creates a new branch forked at `parent_event`.
    ///
    /// The head is initialized to the fork point: the branch sees the
    /// exact history up to and including that event, then diverges
    /// independently from its first append.
    ///
    /// # Errors
    ///
    /// Returns `BranchExists` if the name is taken, `NoSuchEvent` if
    /// `parent_event` is not stored, `UnknownBranch` if `source_branch`
    /// names no branch.
    pub fn create(
        &self,
        name: &str,
        parent_event: Option<EventId>,
        source_branch: Option<&str>,
    ) -> Result<Branch> {
        if let Some(source) = source_branch {
            // Validates existence only; events from any ancestor are visible
            // through parent pointers regardless of authoring branch.
            self.store.get_branch(source)?;
        }

        // The inherited chain length becomes the cached event count.
        let event_count = match parent_event {
            Some(id) => {
                if !self.store.event_exists(id)? {
                    return Err(SagaError::NoSuchEvent(id.as_u64()));
                }
                self.store.chain(id)?.len() as u64
            }
            None => 0,
        };

        let branch = Branch {
            name: name.to_string(),
            head: parent_event,
            source_branch: source_branch.map(str::to_string),
            forked_at: parent_event,
            event_count,
            status: BranchStatus::Active,
            created_at_unix: crate::store::now_unix(),
        };

        self.store.insert_branch(&branch)?;
        Ok(branch)
    }

    /// Retrieves a branch by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if no branch has this name.
    pub fn get(&self, name: &str) -> Result<Branch> {
        self.store.get_branch(name)
    }

    /// Lists all branches, sorted by name.
    pub fn list(&self) -> Result<Vec<Branch>> {
        self.store.list_branches()
    }

    /// Read-only checkout: resolves a name to its current head for the
    /// state resolver. Performs no writes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if no branch has this name.
    pub fn checkout(&self, name: &str) -> Result<Option<EventId>> {
        Ok(self.store.get_branch(name)?.head)
    }

    /// Transitions a branch to `Merged`.
    pub fn mark_merged(&self, name: &str) -> Result<()> {
        self.store.mark_merged(name)
    }

    /// Discards a branch: the pointer is removed, the events stay.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if no branch has this name.
    pub fn discard(&self, name: &str) -> Result<()> {
        self.store.remove_branch(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SceneState;
    use crate::event::EventPayload;
    use crate::store::now_unix;
    use tempfile::TempDir;

    fn scene(title: &str) -> EventPayload {
        EventPayload::CreateScene(SceneState {
            title: title.to_string(),
            ..Default::default()
        })
    }

    fn store_with_main(tmp: &TempDir) -> EventStore {
        let store = EventStore::create(tmp.path().join("saga.redb")).unwrap();
        store.insert_branch(&Branch::root("main", now_unix())).unwrap();
        store
    }

    #[test]
    fn test_create_initializes_head_to_fork_point() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        let a = store.append("main", &"scene_a".into(), scene("A")).unwrap();
        let b = store.append("main", &"scene_b".into(), scene("B")).unwrap();

        let branch = registry
            .create("alt_ending_1", Some(a.id), Some("main"))
            .unwrap();

        assert_eq!(branch.head, Some(a.id));
        assert_eq!(branch.forked_at, Some(a.id));
        assert_eq!(branch.event_count, 1);
        assert_eq!(branch.source_branch.as_deref(), Some("main"));

        // Fork point is before b; b stays exclusive to main.
        assert_ne!(branch.head, Some(b.id));
    }

    #[test]
    fn test_create_duplicate_name_fails() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        let result = registry.create("main", None, None);
        assert!(matches!(result, Err(SagaError::BranchExists(_))));
    }

    #[test]
    fn test_create_with_missing_fork_point_fails() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        let result = registry.create("alt", Some(EventId::from_u64(404)), Some("main"));
        assert!(matches!(result, Err(SagaError::NoSuchEvent(404))));
    }

    #[test]
    fn test_create_with_unknown_source_fails() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        let result = registry.create("alt", None, Some("ghost"));
        assert!(matches!(result, Err(SagaError::UnknownBranch(_))));
    }

    #[test]
    fn test_checkout_is_read_only() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        assert_eq!(registry.checkout("main").unwrap(), None);

        let a = store.append("main", &"scene_a".into(), scene("A")).unwrap();
        assert_eq!(registry.checkout("main").unwrap(), Some(a.id));
        assert!(matches!(
            registry.checkout("ghost"),
            Err(SagaError::UnknownBranch(_))
        ));
    }

    #[test]
    fn test_list_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        registry.create("zeta", None, Some("main")).unwrap();
        registry.create("alpha", None, Some("main")).unwrap();

        let names: Vec<_> = registry.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["alpha", "main", "zeta"]);
    }

    #[test]
    fn test_discard_removes_pointer_but_keeps_events() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let registry = BranchRegistry::new(&store);

        let a = store.append("main", &"scene_a".into(), scene("A")).unwrap();
        registry.create("alt", Some(a.id), Some("main")).unwrap();
        let b = store.append("alt", &"scene_b".into(), scene("B")).unwrap();

        registry.discard("alt").unwrap();
        assert!(matches!(
            registry.get("alt"),
            Err(SagaError::UnknownBranch(_))
        ));

        // Events authored on the discarded branch are still stored.
        assert!(store.event_exists(b.id).unwrap());
        // And main is untouched.
        assert_eq!(registry.checkout("main").unwrap(), Some(a.id));
    }
}
