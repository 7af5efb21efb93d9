//! Saga Core Library
//!
//! A branching, event-sourced state engine for story worlds:
//! - Append-only event log with parent-linked causal history
//! - Named branches with fork points and independent heads
//! - Deterministic state resolution (checkout) by folding event chains
//! - Structural branch comparison and conflict-aware merge
//!
//! # Quick Start
//!
//! ```
//! use saga_core::SagaRepo;
//! use serde_json::json;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let repo = SagaRepo::init(tmp.path()).unwrap();
//!
//! // Record a change on the main branch.
//! repo.append_event(
//!     "main",
//!     &"world_aethelgard".into(),
//!     "CREATE_WORLD",
//!     json!({"name": "Aethelgard"}),
//! )
//! .unwrap();
//!
//! // Materialize the branch's container set.
//! let snapshot = repo.checkout("main").unwrap();
//! assert!(snapshot.contains_key(&"world_aethelgard".into()));
//! ```
//!
//! # Branching
//!
//! Branches are pointers into an immutable event forest. Forking a branch
//! shares all history up to the fork point; appends after that diverge
//! independently:
//!
//! ```
//! use saga_core::SagaRepo;
//! use serde_json::json;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let repo = SagaRepo::init(tmp.path()).unwrap();
//!
//! let shared = repo
//!     .append_event("main", &"scene_court".into(), "CREATE_SCENE", json!({"title": "Court"}))
//!     .unwrap();
//! repo.create_branch("alt_ending_1", Some(shared), Some("main")).unwrap();
//!
//! repo.append_event("alt_ending_1", &"scene_cave".into(), "CREATE_SCENE", json!({"title": "Cave"}))
//!     .unwrap();
//!
//! // The fork sees both scenes; main still sees only the shared one.
//! assert_eq!(repo.checkout("alt_ending_1").unwrap().len(), 2);
//! assert_eq!(repo.checkout("main").unwrap().len(), 1);
//! ```

mod branches;
mod compare;
mod config;
mod container;
mod error;
mod event;
mod merge;
mod repo;
mod resolve;
mod store;
mod verify;

pub use branches::{Branch, BranchRegistry, BranchStatus};
pub use compare::{compare, diff_snapshots, BranchDiff, ContainerDelta, FieldDelta};
pub use config::{Config, MergeConfig, ResolverConfig};
pub use container::{
    CharacterPatch, CharacterState, ContainerId, ContainerKind, ContainerPatch, ContainerState,
    LocationPatch, LocationState, ScenePatch, SceneState, WorldPatch, WorldState,
};
pub use error::{Result, SagaError};
pub use event::{Event, EventId, EventKind, EventPayload};
pub use merge::{fork_era, merge, MergeOutcome};
pub use repo::{SagaRepo, DEFAULT_BRANCH};
pub use resolve::{Snapshot, StateResolver};
pub use store::{EventStore, STORE_SCHEMA_VERSION};
pub use verify::{verify, VerifyReport};
