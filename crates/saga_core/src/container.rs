//! Typed story containers and their merge-patch structures.
//!
//! A container is one story entity (world, scene, character, location).
//! Its materialized state is never stored directly; it is the left fold
//! of every patch that ever touched it, in causal order.
//!
//! State and patch structs must serialize every field, unset or not: the
//! store's binary encoding is positional, so a field skipped at encode
//! time makes the record undecodable.

use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier for a container, chosen by the caller (e.g. "scene_kings_court").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of story container.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr)]
pub enum ContainerKind {
    /// World settings.
    World = 1,
    /// A scene.
    Scene = 2,
    /// A character.
    Character = 3,
    /// A location.
    Location = 4,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::World => "world",
            Self::Scene => "scene",
            Self::Character => "character",
            Self::Location => "location",
        };
        f.write_str(s)
    }
}

/// Materialized state of a world container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Display name of the story world.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Genre label (e.g. "high fantasy").
    pub genre: Option<String>,
    /// Overall tone (e.g. "grim", "whimsical").
    pub tone: Option<String>,
}

/// Materialized state of a scene container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    /// Scene title.
    pub title: String,
    /// One-line summary.
    pub summary: Option<String>,
    /// Prose content.
    pub content: Option<String>,
    /// Container id of the location where the scene takes place.
    pub location: Option<ContainerId>,
    /// Ordering hint within the story (display only).
    pub order: Option<u32>,
}

/// Materialized state of a character container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// Character name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Narrative role (e.g. "protagonist").
    pub role: Option<String>,
    /// Personality traits. A patch replaces the whole list.
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Materialized state of a location container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    /// Location name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Parent region or area.
    pub region: Option<String>,
}

/// Partial update for a world container. `Some` fields overwrite, `None`
/// fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldPatch {
    /// New name, if set.
    pub name: Option<String>,
    /// New description, if set.
    pub description: Option<String>,
    /// New genre, if set.
    pub genre: Option<String>,
    /// New tone, if set.
    pub tone: Option<String>,
}

/// Partial update for a scene container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenePatch {
    /// New title, if set.
    pub title: Option<String>,
    /// New summary, if set.
    pub summary: Option<String>,
    /// New content, if set.
    pub content: Option<String>,
    /// New location reference, if set.
    pub location: Option<ContainerId>,
    /// New ordering hint, if set.
    pub order: Option<u32>,
}

/// Partial update for a character container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharacterPatch {
    /// New name, if set.
    pub name: Option<String>,
    /// New description, if set.
    pub description: Option<String>,
    /// New role, if set.
    pub role: Option<String>,
    /// Replacement trait list, if set.
    pub traits: Option<Vec<String>>,
}

/// Partial update for a location container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationPatch {
    /// New name, if set.
    pub name: Option<String>,
    /// New description, if set.
    pub description: Option<String>,
    /// New region, if set.
    pub region: Option<String>,
}

/// Materialized state of one container, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    /// World settings.
    World(WorldState),
    /// A scene.
    Scene(SceneState),
    /// A character.
    Character(CharacterState),
    /// A location.
    Location(LocationState),
}

impl ContainerState {
    /// Creates an empty state of the given kind.
    ///
    /// Used when an UPDATE event targets a container that has no prior
    /// CREATE in its chain: the fold upserts from an empty state.
    pub fn empty(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::World => Self::World(WorldState::default()),
            ContainerKind::Scene => Self::Scene(SceneState::default()),
            ContainerKind::Character => Self::Character(CharacterState::default()),
            ContainerKind::Location => Self::Location(LocationState::default()),
        }
    }

    /// Returns the kind of this container.
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::World(_) => ContainerKind::World,
            Self::Scene(_) => ContainerKind::Scene,
            Self::Character(_) => ContainerKind::Character,
            Self::Location(_) => ContainerKind::Location,
        }
    }

    /// Applies a merge-patch in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if the patch kind does not match the
    /// container kind (e.g. a scene patch against a character).
    pub fn apply(&mut self, patch: &ContainerPatch) -> Result<()> {
        match (self, patch) {
            (Self::World(s), ContainerPatch::World(p)) => {
                merge_field(&mut s.name, &p.name);
                merge_opt(&mut s.description, &p.description);
                merge_opt(&mut s.genre, &p.genre);
                merge_opt(&mut s.tone, &p.tone);
            }
            (Self::Scene(s), ContainerPatch::Scene(p)) => {
                merge_field(&mut s.title, &p.title);
                merge_opt(&mut s.summary, &p.summary);
                merge_opt(&mut s.content, &p.content);
                if let Some(location) = &p.location {
                    s.location = Some(location.clone());
                }
                if let Some(order) = p.order {
                    s.order = Some(order);
                }
            }
            (Self::Character(s), ContainerPatch::Character(p)) => {
                merge_field(&mut s.name, &p.name);
                merge_opt(&mut s.description, &p.description);
                merge_opt(&mut s.role, &p.role);
                if let Some(traits) = &p.traits {
                    s.traits = traits.clone();
                }
            }
            (Self::Location(s), ContainerPatch::Location(p)) => {
                merge_field(&mut s.name, &p.name);
                merge_opt(&mut s.description, &p.description);
                merge_opt(&mut s.region, &p.region);
            }
            (state, patch) => {
                return Err(SagaError::InvalidPayload {
                    kind: patch.kind().to_string(),
                    reason: format!("container is a {}, not a {}", state.kind(), patch.kind()),
                });
            }
        }
        Ok(())
    }

    /// Returns the container's attributes as a flat field map.
    ///
    /// Used by the compare engine for shallow field-by-field comparison.
    /// Unset optional fields (and an empty trait list) are filtered out,
    /// so they never register as differences against each other.
    pub fn fields(&self) -> BTreeMap<String, serde_json::Value> {
        let value = match self {
            Self::World(s) => serde_json::to_value(s),
            Self::Scene(s) => serde_json::to_value(s),
            Self::Character(s) => serde_json::to_value(s),
            Self::Location(s) => serde_json::to_value(s),
        };

        match value {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .filter(|(_, v)| v.as_array().map_or(true, |a| !a.is_empty()))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

/// Partial update for one container, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerPatch {
    /// Patch against a world.
    World(WorldPatch),
    /// Patch against a scene.
    Scene(ScenePatch),
    /// Patch against a character.
    Character(CharacterPatch),
    /// Patch against a location.
    Location(LocationPatch),
}

impl ContainerPatch {
    /// Returns the container kind this patch targets.
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::World(_) => ContainerKind::World,
            Self::Scene(_) => ContainerKind::Scene,
            Self::Character(_) => ContainerKind::Character,
            Self::Location(_) => ContainerKind::Location,
        }
    }
}

fn merge_field(target: &mut String, patch: &Option<String>) {
    if let Some(value) = patch {
        *target = value.clone();
    }
}

fn merge_opt(target: &mut Option<String>, patch: &Option<String>) {
    if let Some(value) = patch {
        *target = Some(value.clone());
    }
}
