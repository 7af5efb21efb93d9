//! State resolution: folding an event chain into the live container set.
//!
//! Resolution is pure: the snapshot at an event id is a function of the
//! chain behind it and nothing else, so snapshots can be memoized by
//! event id without coordination and a cached entry never goes stale.

use crate::container::{ContainerId, ContainerState};
use crate::error::{Result, SagaError};
use crate::event::{Event, EventId};
use crate::store::EventStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Materialized container set at one point in history.
///
/// BTreeMap keeps iteration order deterministic, so two resolutions of the
/// same event id are byte-identical when serialized.
pub type Snapshot = BTreeMap<ContainerId, ContainerState>;

/// Resolves branch heads into snapshots, memoizing by event id.
pub struct StateResolver {
    cache: RwLock<HashMap<EventId, Arc<Snapshot>>>,
    capacity: usize,
}

impl StateResolver {
    /// Creates a resolver whose cache holds up to `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Resolves the snapshot at `head`.
    ///
    /// Walks parent pointers back until it reaches a cached ancestor or
    /// the root, then folds the remaining events oldest-first. A `None`
    /// head (branch with no history) resolves to the empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DanglingParent` if a parent pointer mid-chain does not
    /// resolve (store corruption), `NoSuchEvent` if `head` itself is not
    /// stored, and `ParentCycle` if an id repeats during the walk.
    pub fn resolve(&self, store: &EventStore, head: Option<EventId>) -> Result<Arc<Snapshot>> {
        let head = match head {
            Some(id) => id,
            None => return Ok(Arc::new(Snapshot::new())),
        };

        if let Some(hit) = self.cache_get(head) {
            return Ok(hit);
        }

        // Walk back to the nearest cached ancestor, collecting the
        // uncached suffix newest-first.
        let mut suffix: Vec<Event> = Vec::new();
        let mut seen = HashSet::new();
        let mut base: Arc<Snapshot> = Arc::new(Snapshot::new());
        let mut cursor = Some(head);
        let mut prev: Option<EventId> = None;

        while let Some(id) = cursor {
            if let Some(hit) = self.cache_get(id) {
                debug!(event = id.as_u64(), "resolve: folding from cached ancestor");
                base = hit;
                break;
            }
            if !seen.insert(id) {
                return Err(SagaError::ParentCycle(id.as_u64()));
            }

            let event = match store.get_event(id) {
                Ok(event) => event,
                Err(SagaError::NoSuchEvent(missing)) => {
                    return match prev {
                        Some(child) => Err(SagaError::DanglingParent {
                            event: child.as_u64(),
                            parent: missing,
                        }),
                        None => Err(SagaError::NoSuchEvent(missing)),
                    };
                }
                Err(e) => return Err(e),
            };

            cursor = event.parent;
            prev = Some(id);
            suffix.push(event);
        }

        // Fold left, oldest-first.
        let mut snapshot: Snapshot = (*base).clone();
        for event in suffix.iter().rev() {
            let prior = snapshot.get(&event.container).cloned();
            let next = event.payload.fold(prior)?;
            snapshot.insert(event.container.clone(), next);
        }

        let snapshot = Arc::new(snapshot);
        self.cache_put(head, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Resolves the state of a single container at `head`, if present.
    pub fn resolve_container(
        &self,
        store: &EventStore,
        head: Option<EventId>,
        container: &ContainerId,
    ) -> Result<Option<ContainerState>> {
        Ok(self.resolve(store, head)?.get(container).cloned())
    }

    fn cache_get(&self, id: EventId) -> Option<Arc<Snapshot>> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&id).cloned())
    }

    fn cache_put(&self, id: EventId, snapshot: Arc<Snapshot>) {
        if let Ok(mut cache) = self.cache.write() {
            // Memoization is a pure optimization; dropping the whole map
            // when it fills is always correct.
            if cache.len() >= self.capacity {
                cache.clear();
            }
            cache.insert(id, snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branches::Branch;
    use crate::container::{CharacterState, SceneState};
    use crate::event::EventPayload;
    use crate::store::now_unix;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_with_main(tmp: &TempDir) -> EventStore {
        let store = EventStore::create(tmp.path().join("saga.redb")).unwrap();
        store.insert_branch(&Branch::root("main", now_unix())).unwrap();
        store
    }

    #[test]
    fn test_fold_creates_then_patches() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let resolver = StateResolver::new(64);

        store
            .append(
                "main",
                &"char_lancelot".into(),
                EventPayload::CreateCharacter(CharacterState {
                    name: "Lancelot".to_string(),
                    role: Some("knight".to_string()),
                    ..Default::default()
                }),
            )
            .unwrap();
        let head = store
            .append(
                "main",
                &"char_lancelot".into(),
                EventPayload::UpdateCharacter(
                    serde_json::from_value(json!({"role": "traitor"})).unwrap(),
                ),
            )
            .unwrap();

        let snapshot = resolver.resolve(&store, Some(head.id)).unwrap();
        match snapshot.get(&"char_lancelot".into()).unwrap() {
            ContainerState::Character(c) => {
                assert_eq!(c.name, "Lancelot");
                assert_eq!(c.role.as_deref(), Some("traitor"));
            }
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);

        let mut head = None;
        for i in 0..5 {
            head = Some(
                store
                    .append(
                        "main",
                        &ContainerId::new(format!("scene_{i}")),
                        EventPayload::CreateScene(SceneState {
                            title: format!("Scene {i}"),
                            ..Default::default()
                        }),
                    )
                    .unwrap()
                    .id,
            );
        }

        // Two resolvers, no shared cache: identical serialized snapshots.
        let first = StateResolver::new(64).resolve(&store, head).unwrap();
        let second = StateResolver::new(64).resolve(&store, head).unwrap();
        assert_eq!(
            serde_json::to_vec(&*first).unwrap(),
            serde_json::to_vec(&*second).unwrap()
        );
    }

    #[test]
    fn test_cached_ancestor_gives_same_result() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let resolver = StateResolver::new(64);

        let a = store
            .append(
                "main",
                &"scene_a".into(),
                EventPayload::CreateScene(SceneState {
                    title: "A".to_string(),
                    ..Default::default()
                }),
            )
            .unwrap();
        // Prime the cache at the ancestor.
        resolver.resolve(&store, Some(a.id)).unwrap();

        let b = store
            .append(
                "main",
                &"scene_b".into(),
                EventPayload::CreateScene(SceneState {
                    title: "B".to_string(),
                    ..Default::default()
                }),
            )
            .unwrap();

        let incremental = resolver.resolve(&store, Some(b.id)).unwrap();
        let fresh = StateResolver::new(64).resolve(&store, Some(b.id)).unwrap();
        assert_eq!(*incremental, *fresh);
        assert_eq!(incremental.len(), 2);
    }

    #[test]
    fn test_empty_head_resolves_to_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let resolver = StateResolver::new(64);

        let snapshot = resolver.resolve(&store, None).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_update_without_create_upserts() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_main(&tmp);
        let resolver = StateResolver::new(64);

        let head = store
            .append(
                "main",
                &"scene_goblin_cave".into(),
                EventPayload::UpdateScene(
                    serde_json::from_value(json!({"title": "The Goblin Cave"})).unwrap(),
                ),
            )
            .unwrap();

        let snapshot = resolver.resolve(&store, Some(head.id)).unwrap();
        assert!(snapshot.contains_key(&"scene_goblin_cave".into()));
    }
}
