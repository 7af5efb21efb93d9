//! Repository handle providing the main saga API.
//!
//! This is the narrow interface the rest of the application (editor
//! saves, AI pipeline steps, presentation layers) consumes. "Current
//! branch" is always a parameter, never process-wide state, so multiple
//! sessions can work on different branches through one handle.

use crate::branches::{Branch, BranchRegistry};
use crate::compare::{self, BranchDiff};
use crate::config::Config;
use crate::container::ContainerId;
use crate::error::{Result, SagaError};
use crate::event::{Event, EventId, EventKind, EventPayload};
use crate::merge::{self, MergeOutcome};
use crate::resolve::{Snapshot, StateResolver};
use crate::store::EventStore;
use crate::verify::{self, VerifyReport};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the implicit root branch created by `init`.
pub const DEFAULT_BRANCH: &str = "main";

/// Saga repository handle.
pub struct SagaRepo {
    /// Root directory containing the repository (parent of .saga).
    root: PathBuf,
    /// Event store and branch records.
    store: EventStore,
    /// Memoizing state resolver.
    resolver: StateResolver,
    /// Loaded configuration.
    config: Config,
}

impl SagaRepo {
    /// Initializes a new saga repository.
    ///
    /// Creates the `.saga` directory with the event store, a default
    /// config file, and the root branch "main".
    ///
    /// # Errors
    ///
    /// Returns an error if a repository already exists here or directory
    /// creation fails.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let saga_dir = root.join(".saga");

        if saga_dir.exists() {
            return Err(SagaError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "saga repository already exists in this directory",
            )));
        }

        fs::create_dir_all(&saga_dir)?;

        let config = Config::default();
        config.save(&saga_dir)?;

        let store = EventStore::create(saga_dir.join("saga.redb"))?.with_retry_policy(
            config.merge.max_retries,
            config.merge.retry_backoff(),
        );
        store.insert_branch(&Branch::root(DEFAULT_BRANCH, crate::store::now_unix()))?;

        let resolver = StateResolver::new(config.resolver.snapshot_cache_capacity);

        Ok(Self {
            root,
            store,
            resolver,
            config,
        })
    }

    /// Opens an existing saga repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.saga` directory doesn't exist or the
    /// store can't be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let saga_dir = root.join(".saga");

        if !saga_dir.exists() {
            return Err(SagaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a saga repository: {}", root.display()),
            )));
        }

        let config = Config::load(&saga_dir)?;
        let store = EventStore::open(saga_dir.join("saga.redb"))?.with_retry_policy(
            config.merge.max_retries,
            config.merge.retry_backoff(),
        );
        let resolver = StateResolver::new(config.resolver.snapshot_cache_capacity);

        Ok(Self {
            root,
            store,
            resolver,
            config,
        })
    }

    /// Returns the repository root (parent of `.saga`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the underlying event store.
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Appends one event under a branch and returns its id.
    ///
    /// The free-form payload is validated against the schema `event_type`
    /// prescribes before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` for an unknown event type or a payload of
    /// the wrong shape, and `UnknownBranch` if the branch doesn't exist.
    pub fn append_event(
        &self,
        branch: &str,
        container: &ContainerId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventId> {
        let kind = EventKind::parse(event_type).ok_or_else(|| SagaError::InvalidPayload {
            kind: event_type.to_string(),
            reason: "unknown event type".to_string(),
        })?;
        let payload = EventPayload::validate(kind, payload)?;
        Ok(self.store.append(branch, container, payload)?.id)
    }

    /// Lists all branches, sorted by name.
    pub fn branches(&self) -> Result<Vec<Branch>> {
        BranchRegistry::new(&self.store).list()
    }

    /// Retrieves a branch by name.
    pub fn branch(&self, name: &str) -> Result<Branch> {
        BranchRegistry::new(&self.store).get(name)
    }

    /// Creates a branch forked at `parent_event`.
    pub fn create_branch(
        &self,
        name: &str,
        parent_event: Option<EventId>,
        source_branch: Option<&str>,
    ) -> Result<Branch> {
        BranchRegistry::new(&self.store).create(name, parent_event, source_branch)
    }

    /// Checks out a branch: resolves its head into the full materialized
    /// container set. Read-only.
    pub fn checkout(&self, branch: &str) -> Result<Arc<Snapshot>> {
        let head = BranchRegistry::new(&self.store).checkout(branch)?;
        self.resolver.resolve(&self.store, head)
    }

    /// Computes the structural diff between two branches.
    pub fn compare(&self, branch_a: &str, branch_b: &str) -> Result<BranchDiff> {
        compare::compare(&self.store, &self.resolver, branch_a, branch_b)
    }

    /// Forks an era for one container off `source_branch`.
    pub fn fork_era(
        &self,
        source_branch: &str,
        container: &ContainerId,
        era_name: &str,
    ) -> Result<Branch> {
        merge::fork_era(&self.store, &self.resolver, source_branch, container, era_name)
    }

    /// Merges `source` into `target`.
    pub fn merge(&self, source: &str, target: &str) -> Result<MergeOutcome> {
        merge::merge(
            &self.store,
            &self.resolver,
            source,
            target,
            self.config.merge.max_retries,
            self.config.merge.retry_backoff(),
        )
    }

    /// Discards a branch pointer. Events stay in the log.
    pub fn discard_branch(&self, name: &str) -> Result<()> {
        BranchRegistry::new(&self.store).discard(name)
    }

    /// Returns a branch's event chain newest-first, truncated to `limit`.
    pub fn history(&self, branch: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        let head = BranchRegistry::new(&self.store).checkout(branch)?;
        let mut chain = match head {
            Some(head) => self.store.chain(head)?,
            None => Vec::new(),
        };
        chain.reverse();
        if let Some(limit) = limit {
            chain.truncate(limit);
        }
        Ok(chain)
    }

    /// Audits the forest invariant over the whole store.
    pub fn verify(&self) -> Result<VerifyReport> {
        verify::verify(&self.store)
    }
}
