//! Durable, append-only event store.
//!
//! Events and branch records live in a single redb database. An append is
//! one write transaction: insert the event, advance the branch head. The
//! head advance is a compare-and-swap against the head the writer last
//! observed; a losing writer retries with the now-current head as its new
//! parent.

use crate::branches::{Branch, BranchStatus};
use crate::container::ContainerId;
use crate::error::{Result, SagaError};
use crate::event::{Event, EventId, EventPayload};
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Store schema version, checked on open.
pub const STORE_SCHEMA_VERSION: u32 = 1;

const META_TABLE: TableDefinition<&str, u32> = TableDefinition::new("meta");
const EVENTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("events");
const BRANCHES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("branches");

/// How many times an append retries after losing a head CAS.
const DEFAULT_MAX_RETRIES: u32 = 32;

/// Base backoff between CAS retries, in milliseconds.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 2;

/// Append-only event store with branch head management.
pub struct EventStore {
    db: Database,
    path: PathBuf,
    max_retries: u32,
    retry_backoff: Duration,
}

/// Outcome of a conditional (CAS-guarded) append.
pub(crate) enum CasAppend {
    /// The events landed; branch head now points at the last of them.
    Committed(Vec<Event>),
    /// The branch head no longer matched the expected value. Nothing was
    /// written; the caller re-reads and retries.
    HeadMoved {
        /// The head actually found.
        current: Option<EventId>,
    },
}

impl EventStore {
    /// Creates a new store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database can't be created or initialized.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META_TABLE)?;
            meta.insert("schema_version", STORE_SCHEMA_VERSION)?;
            // Ensure the tables exist so reads never hit TableDoesNotExist.
            write_txn.open_table(EVENTS_TABLE)?;
            write_txn.open_table(BRANCHES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            path,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        })
    }

    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// Returns `SchemaVersionMismatch` if the store was written by an
    /// incompatible version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::open(&path)?;

        let read_txn = db.begin_read()?;
        let meta = read_txn.open_table(META_TABLE)?;
        let found = meta
            .get("schema_version")?
            .map(|v| v.value())
            .unwrap_or(0);
        if found != STORE_SCHEMA_VERSION {
            return Err(SagaError::SchemaVersionMismatch {
                found,
                expected: STORE_SCHEMA_VERSION,
            });
        }

        Ok(Self {
            db,
            path,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        })
    }

    /// Overrides the CAS retry budget (used by merge config).
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Returns the path to the store database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event under a branch.
    ///
    /// The event is parented on the branch's current head (which may be an
    /// event inherited from a fork ancestor) and the head is advanced
    /// atomically. Concurrent appends to the same branch race on the head;
    /// the loser retries against the new head with linear backoff, so
    /// contention is normally invisible to callers. `HeadContention` is a
    /// last-resort bound on pathological contention, not an expected
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if the branch does not exist,
    /// `BranchNotActive` if it has been merged, and `HeadContention` if
    /// the retry budget is exhausted.
    pub fn append(
        &self,
        branch_name: &str,
        container: &ContainerId,
        payload: EventPayload,
    ) -> Result<Event> {
        let mut expected = self.get_branch(branch_name)?.head;

        for attempt in 0..self.max_retries {
            let outcome = self.try_append(
                branch_name,
                expected,
                &[(container.clone(), payload.clone())],
            )?;
            match outcome {
                CasAppend::Committed(mut events) => {
                    // Single payload in, single event out.
                    return events.pop().ok_or_else(|| {
                        SagaError::Storage("append committed zero events".to_string())
                    });
                }
                CasAppend::HeadMoved { current } => {
                    debug!(
                        branch = branch_name,
                        attempt, "head moved during append, retrying"
                    );
                    expected = current;
                    std::thread::sleep(self.retry_backoff * (attempt + 1));
                }
            }
        }

        Err(SagaError::HeadContention(
            branch_name.to_string(),
            self.max_retries,
        ))
    }

    /// Conditionally appends a batch of events, all-or-nothing.
    ///
    /// Every event is parented on its predecessor in the batch, the first
    /// on `expected_head`. If the branch head does not equal
    /// `expected_head` at commit time, nothing is written and
    /// `HeadMoved` is returned. Used by the single-event append retry
    /// loop and by merge's check-then-commit.
    pub(crate) fn try_append(
        &self,
        branch_name: &str,
        expected_head: Option<EventId>,
        payloads: &[(ContainerId, EventPayload)],
    ) -> Result<CasAppend> {
        let write_txn = self.db.begin_write()?;
        let mut appended = Vec::with_capacity(payloads.len());

        {
            let mut branches = write_txn.open_table(BRANCHES_TABLE)?;
            let mut branch = match branches.get(branch_name)? {
                Some(raw) => decode::<Branch>(raw.value())?,
                None => return Err(SagaError::UnknownBranch(branch_name.to_string())),
            };

            if branch.status != BranchStatus::Active {
                return Err(SagaError::BranchNotActive {
                    name: branch_name.to_string(),
                    status: branch.status.to_string(),
                });
            }

            if branch.head != expected_head {
                return Ok(CasAppend::HeadMoved {
                    current: branch.head,
                });
            }

            let mut events = write_txn.open_table(EVENTS_TABLE)?;
            let mut next_id = events
                .last()?
                .map(|(k, _)| k.value() + 1)
                .unwrap_or(1);
            let now = now_unix();
            let mut parent = branch.head;

            for (container, payload) in payloads {
                let event = Event {
                    id: EventId::from_u64(next_id),
                    parent,
                    branch: branch_name.to_string(),
                    container: container.clone(),
                    timestamp_unix: now,
                    payload: payload.clone(),
                };
                events.insert(next_id, encode(&event)?.as_slice())?;
                parent = Some(event.id);
                next_id += 1;
                appended.push(event);
            }

            if let Some(last) = appended.last() {
                branch.head = Some(last.id);
                branch.event_count += appended.len() as u64;
                branches.insert(branch_name, encode(&branch)?.as_slice())?;
            }
        }

        write_txn.commit()?;
        Ok(CasAppend::Committed(appended))
    }

    /// Retrieves an event by id.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEvent` if the id is not in the log.
    pub fn get_event(&self, id: EventId) -> Result<Event> {
        let read_txn = self.db.begin_read()?;
        let events = read_txn.open_table(EVENTS_TABLE)?;
        match events.get(id.as_u64())? {
            Some(raw) => decode(raw.value()),
            None => Err(SagaError::NoSuchEvent(id.as_u64())),
        }
    }

    /// True if an event with this id is stored.
    pub fn event_exists(&self, id: EventId) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let events = read_txn.open_table(EVENTS_TABLE)?;
        Ok(events.get(id.as_u64())?.is_some())
    }

    /// Total number of events in the log.
    ///
    /// Ids are dense (assigned sequentially, never deleted), so the last
    /// key doubles as the count.
    pub fn event_count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let events = read_txn.open_table(EVENTS_TABLE)?;
        let count = events.last()?.map(|(k, _)| k.value()).unwrap_or(0);
        Ok(count)
    }

    /// Walks parent pointers from `head` back to the root and returns the
    /// chain oldest-first.
    ///
    /// # Errors
    ///
    /// Returns `DanglingParent` if a parent pointer does not resolve (store
    /// corruption) and `ParentCycle` if an id repeats during the walk.
    pub fn chain(&self, head: EventId) -> Result<Vec<Event>> {
        self.chain_until(head, None)
    }

    /// Like [`chain`](Self::chain), but stops (exclusive) when reaching
    /// `stop_at`. Returns only the events after the stop point,
    /// oldest-first.
    pub fn chain_until(&self, head: EventId, stop_at: Option<EventId>) -> Result<Vec<Event>> {
        let read_txn = self.db.begin_read()?;
        let events = read_txn.open_table(EVENTS_TABLE)?;

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(head);
        let mut prev: Option<EventId> = None;

        while let Some(id) = cursor {
            if stop_at == Some(id) {
                break;
            }
            if !seen.insert(id) {
                warn!(event = id.as_u64(), "parent walk revisited an event");
                return Err(SagaError::ParentCycle(id.as_u64()));
            }

            let event: Event = match events.get(id.as_u64())? {
                Some(raw) => decode(raw.value())?,
                None => {
                    // A missing head is the caller's mistake; a missing
                    // parent mid-walk is corruption.
                    return match prev {
                        Some(child) => {
                            warn!(
                                event = child.as_u64(),
                                parent = id.as_u64(),
                                "dangling parent pointer"
                            );
                            Err(SagaError::DanglingParent {
                                event: child.as_u64(),
                                parent: id.as_u64(),
                            })
                        }
                        None => Err(SagaError::NoSuchEvent(id.as_u64())),
                    };
                }
            };

            cursor = event.parent;
            prev = Some(id);
            out.push(event);
        }

        out.reverse();
        Ok(out)
    }

    /// Inserts a new branch record.
    ///
    /// # Errors
    ///
    /// Returns `BranchExists` if the name is taken.
    pub(crate) fn insert_branch(&self, branch: &Branch) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut branches = write_txn.open_table(BRANCHES_TABLE)?;
            if branches.get(branch.name.as_str())?.is_some() {
                return Err(SagaError::BranchExists(branch.name.clone()));
            }
            branches.insert(branch.name.as_str(), encode(branch)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Retrieves a branch record by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if no branch has this name.
    pub fn get_branch(&self, name: &str) -> Result<Branch> {
        let read_txn = self.db.begin_read()?;
        let branches = read_txn.open_table(BRANCHES_TABLE)?;
        match branches.get(name)? {
            Some(raw) => decode(raw.value()),
            None => Err(SagaError::UnknownBranch(name.to_string())),
        }
    }

    /// Lists all branch records, sorted by name.
    pub fn list_branches(&self) -> Result<Vec<Branch>> {
        let read_txn = self.db.begin_read()?;
        let branches = read_txn.open_table(BRANCHES_TABLE)?;

        let mut out = Vec::new();
        for entry in branches.iter()? {
            let (_, raw) = entry?;
            out.push(decode::<Branch>(raw.value())?);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Transitions a branch to `Merged`. Merged branches reject appends.
    pub(crate) fn mark_merged(&self, name: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut branches = write_txn.open_table(BRANCHES_TABLE)?;
            let mut branch = match branches.get(name)? {
                Some(raw) => decode::<Branch>(raw.value())?,
                None => return Err(SagaError::UnknownBranch(name.to_string())),
            };
            branch.status = BranchStatus::Merged;
            branches.insert(name, encode(&branch)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Removes a branch pointer. The events it pointed at stay in the log
    /// and remain reachable from any branch sharing ancestry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBranch` if no branch has this name.
    pub(crate) fn remove_branch(&self, name: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut branches = write_txn.open_table(BRANCHES_TABLE)?;
            if branches.remove(name)?.is_none() {
                return Err(SagaError::UnknownBranch(name.to_string()));
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All event ids currently in the log, ascending. Used by verify.
    pub fn all_event_ids(&self) -> Result<Vec<EventId>> {
        let read_txn = self.db.begin_read()?;
        let events = read_txn.open_table(EVENTS_TABLE)?;

        let mut out = Vec::new();
        for entry in events.iter()? {
            let (k, _) = entry?;
            out.push(EventId::from_u64(k.value()));
        }
        Ok(out)
    }

    /// Test-only: writes a raw event record, bypassing branch bookkeeping.
    #[cfg(test)]
    pub(crate) fn insert_raw_event(&self, event: &Event) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut events = write_txn.open_table(EVENTS_TABLE)?;
            events.insert(event.id.as_u64(), encode(event)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| SagaError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &[u8]) -> Result<T> {
    postcard::from_bytes(raw).map_err(|e| SagaError::Deserialization(e.to_string()))
}

/// Current time as Unix seconds.
pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs()
}
