//! Events: the immutable unit of change.
//!
//! Every mutation to a container is recorded as one event pointing at its
//! causal predecessor. Events are never edited or deleted; a correction is
//! itself a new event.

use crate::container::{
    CharacterPatch, CharacterState, ContainerId, ContainerKind, ContainerPatch, ContainerState,
    LocationPatch, LocationState, ScenePatch, SceneState, WorldPatch, WorldState,
};
use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an event: its index in the append-only log.
///
/// Ids are assigned by the store in strictly increasing order, so a child
/// event always has a larger id than its parent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Creates an event id from a raw log index.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw log index.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of mutation an event records.
///
/// Each kind prescribes the shape of the payload. Adding a kind is
/// additive: stored events of existing kinds are never reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Creates a world container.
    CreateWorld,
    /// Patches a world container.
    UpdateWorld,
    /// Creates a scene container.
    CreateScene,
    /// Patches a scene container.
    UpdateScene,
    /// Creates a character container.
    CreateCharacter,
    /// Patches a character container.
    UpdateCharacter,
    /// Creates a location container.
    CreateLocation,
    /// Patches a location container.
    UpdateLocation,
    /// Duplicates a container's full resolved state. Written by fork-era
    /// (independent starting snapshot) and merge replay.
    CopyContainer,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 9] = [
        Self::CreateWorld,
        Self::UpdateWorld,
        Self::CreateScene,
        Self::UpdateScene,
        Self::CreateCharacter,
        Self::UpdateCharacter,
        Self::CreateLocation,
        Self::UpdateLocation,
        Self::CopyContainer,
    ];

    /// Wire name of the kind (e.g. "CREATE_WORLD").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateWorld => "CREATE_WORLD",
            Self::UpdateWorld => "UPDATE_WORLD",
            Self::CreateScene => "CREATE_SCENE",
            Self::UpdateScene => "UPDATE_SCENE",
            Self::CreateCharacter => "CREATE_CHARACTER",
            Self::UpdateCharacter => "UPDATE_CHARACTER",
            Self::CreateLocation => "CREATE_LOCATION",
            Self::UpdateLocation => "UPDATE_LOCATION",
            Self::CopyContainer => "COPY_CONTAINER",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event payload.
///
/// This is the closed, exhaustively-matchable set of mutation shapes.
/// Free-form JSON submitted at the boundary is validated into one of
/// these variants before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Initial state for a new world.
    CreateWorld(WorldState),
    /// Merge-patch against a world.
    UpdateWorld(WorldPatch),
    /// Initial state for a new scene.
    CreateScene(SceneState),
    /// Merge-patch against a scene.
    UpdateScene(ScenePatch),
    /// Initial state for a new character.
    CreateCharacter(CharacterState),
    /// Merge-patch against a character.
    UpdateCharacter(CharacterPatch),
    /// Initial state for a new location.
    CreateLocation(LocationState),
    /// Merge-patch against a location.
    UpdateLocation(LocationPatch),
    /// Full resolved state copied wholesale onto the container.
    CopyContainer(ContainerState),
}

impl EventPayload {
    /// Validates free-form JSON into the typed payload for `kind`.
    ///
    /// This is the single schema gate of the write path: a payload that
    /// does not deserialize into the patch structure required by the kind
    /// is rejected here, before any write happens.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` on any shape mismatch, including unknown
    /// fields and a CREATE_* payload with an empty name/title.
    pub fn validate(kind: EventKind, payload: serde_json::Value) -> Result<Self> {
        let invalid = |reason: String| SagaError::InvalidPayload {
            kind: kind.to_string(),
            reason,
        };

        let parsed = match kind {
            EventKind::CreateWorld => serde_json::from_value(payload)
                .map(Self::CreateWorld)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::UpdateWorld => serde_json::from_value(payload)
                .map(Self::UpdateWorld)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::CreateScene => serde_json::from_value(payload)
                .map(Self::CreateScene)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::UpdateScene => serde_json::from_value(payload)
                .map(Self::UpdateScene)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::CreateCharacter => serde_json::from_value(payload)
                .map(Self::CreateCharacter)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::UpdateCharacter => serde_json::from_value(payload)
                .map(Self::UpdateCharacter)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::CreateLocation => serde_json::from_value(payload)
                .map(Self::CreateLocation)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::UpdateLocation => serde_json::from_value(payload)
                .map(Self::UpdateLocation)
                .map_err(|e| invalid(e.to_string()))?,
            EventKind::CopyContainer => serde_json::from_value(payload)
                .map(Self::CopyContainer)
                .map_err(|e| invalid(e.to_string()))?,
        };

        if let Some(name) = parsed.created_name() {
            if name.is_empty() {
                return Err(invalid("created container needs a non-empty name".to_string()));
            }
        }

        Ok(parsed)
    }

    /// Returns the kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CreateWorld(_) => EventKind::CreateWorld,
            Self::UpdateWorld(_) => EventKind::UpdateWorld,
            Self::CreateScene(_) => EventKind::CreateScene,
            Self::UpdateScene(_) => EventKind::UpdateScene,
            Self::CreateCharacter(_) => EventKind::CreateCharacter,
            Self::UpdateCharacter(_) => EventKind::UpdateCharacter,
            Self::CreateLocation(_) => EventKind::CreateLocation,
            Self::UpdateLocation(_) => EventKind::UpdateLocation,
            Self::CopyContainer(_) => EventKind::CopyContainer,
        }
    }

    /// Returns the container kind this payload targets.
    pub fn container_kind(&self) -> ContainerKind {
        match self {
            Self::CreateWorld(_) | Self::UpdateWorld(_) => ContainerKind::World,
            Self::CreateScene(_) | Self::UpdateScene(_) => ContainerKind::Scene,
            Self::CreateCharacter(_) | Self::UpdateCharacter(_) => ContainerKind::Character,
            Self::CreateLocation(_) | Self::UpdateLocation(_) => ContainerKind::Location,
            Self::CopyContainer(state) => state.kind(),
        }
    }

    /// Folds this payload onto the container's prior state.
    ///
    /// CREATE_* and COPY_CONTAINER replace the state wholesale; UPDATE_*
    /// merge-patches, upserting from an empty state when the container has
    /// no prior history in the chain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if an UPDATE_* patch targets an existing
    /// container of a different kind.
    pub fn fold(&self, prior: Option<ContainerState>) -> Result<ContainerState> {
        let patch = match self {
            Self::CreateWorld(s) => return Ok(ContainerState::World(s.clone())),
            Self::CreateScene(s) => return Ok(ContainerState::Scene(s.clone())),
            Self::CreateCharacter(s) => return Ok(ContainerState::Character(s.clone())),
            Self::CreateLocation(s) => return Ok(ContainerState::Location(s.clone())),
            Self::CopyContainer(s) => return Ok(s.clone()),
            Self::UpdateWorld(p) => ContainerPatch::World(p.clone()),
            Self::UpdateScene(p) => ContainerPatch::Scene(p.clone()),
            Self::UpdateCharacter(p) => ContainerPatch::Character(p.clone()),
            Self::UpdateLocation(p) => ContainerPatch::Location(p.clone()),
        };

        let mut state = prior.unwrap_or_else(|| ContainerState::empty(patch.kind()));
        state.apply(&patch)?;
        Ok(state)
    }

    /// Name/title of the container a CREATE_* payload introduces, if any.
    fn created_name(&self) -> Option<&str> {
        match self {
            Self::CreateWorld(s) => Some(&s.name),
            Self::CreateScene(s) => Some(&s.title),
            Self::CreateCharacter(s) => Some(&s.name),
            Self::CreateLocation(s) => Some(&s.name),
            _ => None,
        }
    }
}

/// One immutable change to one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Log index of this event.
    pub id: EventId,
    /// The event this one logically follows. `None` only for a root
    /// event with no prior history.
    pub parent: Option<EventId>,
    /// Branch this event was authored under. Records authorship only;
    /// visibility is decided by the parent chain.
    pub branch: String,
    /// The container being mutated.
    pub container: ContainerId,
    /// Creation time (Unix seconds). Display and tie-breaking only;
    /// causal order is owned by parent pointers.
    pub timestamp_unix: u64,
    /// Kind-specific mutation payload.
    pub payload: EventPayload,
}

impl Event {
    /// Returns the kind of mutation this event records.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
