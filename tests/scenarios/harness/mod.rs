//! Test harness: a story repository in a temp directory with
//! convenience wrappers over the public API.

use anyhow::Result;
use saga_core::{ContainerId, ContainerState, EventId, SagaRepo, Snapshot};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// A saga repository rooted in a temporary directory.
///
/// The directory is removed when the world is dropped.
pub struct StoryWorld {
    _dir: TempDir,
    repo: SagaRepo,
}

impl StoryWorld {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let repo = SagaRepo::init(dir.path())?;
        Ok(Self { _dir: dir, repo })
    }

    pub fn repo(&self) -> &SagaRepo {
        &self.repo
    }

    /// Reopens the repository in place.
    ///
    /// The database holds an exclusive file lock, so the old handle is
    /// dropped before the new one opens.
    pub fn reopen(self) -> Result<Self> {
        let Self { _dir, repo } = self;
        drop(repo);
        let repo = SagaRepo::open(_dir.path())?;
        Ok(Self { _dir, repo })
    }

    /// Appends one event through the validating boundary.
    pub fn append(
        &self,
        branch: &str,
        container: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<EventId> {
        let id = self
            .repo
            .append_event(branch, &ContainerId::new(container), event_type, payload)?;
        Ok(id)
    }

    /// Forks `name` off `source` at the source's current head.
    pub fn fork(&self, name: &str, source: &str) -> Result<()> {
        let head = self.repo.branch(source)?.head;
        self.repo.create_branch(name, head, Some(source))?;
        Ok(())
    }

    pub fn checkout(&self, branch: &str) -> Result<Arc<Snapshot>> {
        Ok(self.repo.checkout(branch)?)
    }

    /// Looks a container up in a snapshot, panicking with its id on a miss.
    pub fn container<'a>(&self, snapshot: &'a Snapshot, id: &str) -> &'a ContainerState {
        snapshot
            .get(&ContainerId::new(id))
            .unwrap_or_else(|| panic!("container {} not in snapshot", id))
    }
}

/// Builds the canonical branching fixture used across scenarios.
///
/// On `main`: the world of Aethelgard, the king's court scene, and
/// Lancelot. `alt_ending_1` forks from that point and drafts a goblin
/// cave detour, while `main` moves on to the dragon fight.
pub fn aethelgard_fixture() -> Result<StoryWorld> {
    let world = StoryWorld::new()?;

    world.append(
        "main",
        "world_aethelgard",
        "CREATE_WORLD",
        json!({
            "name": "Aethelgard",
            "genre": "high fantasy",
            "tone": "grim"
        }),
    )?;
    world.append(
        "main",
        "scene_kings_court",
        "CREATE_SCENE",
        json!({
            "title": "The King's Court",
            "summary": "The fellowship receives its charge."
        }),
    )?;
    world.append(
        "main",
        "char_lancelot",
        "CREATE_CHARACTER",
        json!({
            "name": "Lancelot",
            "role": "knight",
            "traits": ["loyal", "proud"]
        }),
    )?;

    world.fork("alt_ending_1", "main")?;

    // The detour exists only on the fork. The scene was never created,
    // so these updates upsert it from an empty scene.
    world.append(
        "alt_ending_1",
        "scene_goblin_cave",
        "UPDATE_SCENE",
        json!({"title": "The Goblin Cave"}),
    )?;
    world.append(
        "alt_ending_1",
        "scene_goblin_cave",
        "UPDATE_SCENE",
        json!({"summary": "A wrong turn in the dark."}),
    )?;

    // Main continues on its own line.
    world.append(
        "main",
        "scene_dragon_fight",
        "CREATE_SCENE",
        json!({"title": "The Dragon Fight"}),
    )?;

    Ok(world)
}
