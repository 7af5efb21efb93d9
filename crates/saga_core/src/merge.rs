//! Fork and merge: creating branches from historical points and replaying
//! divergent branches back together.

use crate::branches::{Branch, BranchRegistry};
use crate::compare::diff_snapshots;
use crate::container::ContainerId;
use crate::error::{Result, SagaError};
use crate::event::{EventId, EventPayload};
use crate::resolve::StateResolver;
use crate::store::{CasAppend, EventStore};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a merge attempt.
///
/// A merge either commits every replay event atomically or commits
/// nothing and lists the conflicting containers. This is the one place
/// where partial success is modeled as data instead of an error.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    /// Branch the changes came from.
    pub source: String,
    /// Branch the changes were replayed onto.
    pub target: String,
    /// True when the replay was committed (also true for a no-op merge
    /// with nothing to replay).
    pub committed: bool,
    /// Containers mutated on both sides since the common ancestor. The
    /// caller resolves these explicitly and retries.
    pub conflicts: Vec<ContainerId>,
    /// Events appended on the target, in order.
    pub replayed: Vec<EventId>,
}

/// Forks an era for one container.
///
/// Creates a branch whose fork point is the latest event that touched the
/// container on `source_branch`, then appends a COPY_CONTAINER event
/// duplicating the container's resolved state, giving the era an explicit
/// independent starting snapshot. All other containers stay shared by
/// ancestry.
///
/// # Errors
///
/// Returns `UnknownContainer` if no event on the source chain touched the
/// container, plus the usual `UnknownBranch`/`BranchExists` cases.
pub fn fork_era(
    store: &EventStore,
    resolver: &StateResolver,
    source_branch: &str,
    container: &ContainerId,
    era_name: &str,
) -> Result<Branch> {
    let registry = BranchRegistry::new(store);
    let head = registry.checkout(source_branch)?;

    // Latest event touching the container: last match in the
    // oldest-first chain.
    let fork_point = match head {
        Some(head) => store
            .chain(head)?
            .iter()
            .rev()
            .find(|event| &event.container == container)
            .map(|event| event.id),
        None => None,
    };
    let fork_point = fork_point.ok_or_else(|| SagaError::UnknownContainer {
        container: container.to_string(),
        branch: source_branch.to_string(),
    })?;

    registry.create(era_name, Some(fork_point), Some(source_branch))?;

    let state = resolver
        .resolve_container(store, Some(fork_point), container)?
        .ok_or_else(|| SagaError::UnknownContainer {
            container: container.to_string(),
            branch: source_branch.to_string(),
        })?;

    store.append(era_name, container, EventPayload::CopyContainer(state))?;
    info!(era = era_name, container = %container, "forked era");
    registry.get(era_name)
}

/// Merges `source` into `target` by replaying divergent containers.
///
/// Both branches are resolved and compared. Containers that only the
/// source changed since the common ancestor are replayed onto the target
/// as COPY_CONTAINER events carrying the source's current field values.
/// Containers the target also mutated since the ancestor are reported as
/// conflicts, and a conflicted merge writes nothing at all.
///
/// The conflict check and the commit race with concurrent appends on the
/// target; the commit is guarded by a compare-and-swap on the target head
/// and the whole check-then-commit re-runs when the head moved.
///
/// # Errors
///
/// Returns `SelfMerge` when source and target are the same branch,
/// `UnknownBranch` for unknown names, `BranchNotActive` if the target is
/// frozen, and `HeadContention` when the retry budget runs out.
pub fn merge(
    store: &EventStore,
    resolver: &StateResolver,
    source: &str,
    target: &str,
    max_retries: u32,
    backoff: Duration,
) -> Result<MergeOutcome> {
    // A self-merge would take the no-op path and freeze the branch.
    if source == target {
        return Err(SagaError::SelfMerge(source.to_string()));
    }

    let registry = BranchRegistry::new(store);

    for attempt in 0..max_retries {
        let source_head = registry.checkout(source)?;
        let target_head = registry.checkout(target)?;

        let source_snapshot = resolver.resolve(store, source_head)?;
        let target_snapshot = resolver.resolve(store, target_head)?;
        let diff = diff_snapshots(source, target, &source_snapshot, &target_snapshot);

        // Divergent containers: present only on the source, or materially
        // different between the sides.
        let mut candidates: Vec<ContainerId> = diff.only_in_a.clone();
        candidates.extend(diff.different.iter().map(|d| d.container.clone()));
        candidates.sort();

        if candidates.is_empty() {
            // Nothing to replay: target head stays untouched.
            registry.mark_merged(source)?;
            return Ok(MergeOutcome {
                source: source.to_string(),
                target: target.to_string(),
                committed: true,
                conflicts: Vec::new(),
                replayed: Vec::new(),
            });
        }

        // Containers the target itself mutated since the common ancestor.
        let base = match (source_head, target_head) {
            (Some(a), Some(b)) => common_ancestor(store, a, b)?,
            _ => None,
        };
        let target_touched: HashSet<ContainerId> = match target_head {
            Some(head) => store
                .chain_until(head, base)?
                .into_iter()
                .map(|event| event.container)
                .collect(),
            None => HashSet::new(),
        };

        let conflicts: Vec<ContainerId> = candidates
            .iter()
            .filter(|id| target_touched.contains(id))
            .cloned()
            .collect();

        if !conflicts.is_empty() {
            debug!(
                source,
                target,
                conflicts = conflicts.len(),
                "merge has conflicts, committing nothing"
            );
            return Ok(MergeOutcome {
                source: source.to_string(),
                target: target.to_string(),
                committed: false,
                conflicts,
                replayed: Vec::new(),
            });
        }

        // Replay forward: the source's current values, wholesale.
        let payloads: Vec<(ContainerId, EventPayload)> = candidates
            .iter()
            .map(|id| {
                let state = source_snapshot
                    .get(id)
                    .cloned()
                    .expect("candidate came from the source snapshot");
                (id.clone(), EventPayload::CopyContainer(state))
            })
            .collect();

        match store.try_append(target, target_head, &payloads)? {
            CasAppend::Committed(events) => {
                registry.mark_merged(source)?;
                info!(
                    source,
                    target,
                    replayed = events.len(),
                    "merge committed"
                );
                return Ok(MergeOutcome {
                    source: source.to_string(),
                    target: target.to_string(),
                    committed: true,
                    conflicts: Vec::new(),
                    replayed: events.into_iter().map(|e| e.id).collect(),
                });
            }
            CasAppend::HeadMoved { .. } => {
                // A concurrent append landed on the target between the
                // conflict check and the commit. Re-run the whole check.
                warn!(source, target, attempt, "target head moved during merge, retrying");
                std::thread::sleep(backoff * (attempt + 1));
            }
        }
    }

    Err(SagaError::HeadContention(target.to_string(), max_retries))
}

/// Deepest event reachable from both heads, or `None` for disjoint trees.
fn common_ancestor(store: &EventStore, a: EventId, b: EventId) -> Result<Option<EventId>> {
    let reachable_from_a: HashSet<EventId> =
        store.chain(a)?.into_iter().map(|event| event.id).collect();

    // Walk b newest-first; the first hit is the deepest shared event.
    Ok(store
        .chain(b)?
        .into_iter()
        .rev()
        .find(|event| reachable_from_a.contains(&event.id))
        .map(|event| event.id))
}
