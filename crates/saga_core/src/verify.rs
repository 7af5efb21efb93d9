//! Store verification: audits the forest invariant.
//!
//! Every event's parent walk must terminate at a root in finitely many
//! steps with no repeated id, and every branch head must point at a
//! stored event. Violations are accumulated rather than aborting on the
//! first, so one pass reports everything.

use crate::error::{Result, SagaError};
use crate::event::EventId;
use crate::store::EventStore;
use std::collections::HashSet;
use tracing::warn;

/// Report from a store verification pass.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Total number of events checked.
    pub events_checked: usize,

    /// Events whose parent pointer does not resolve, as (event, parent).
    pub dangling_parents: Vec<(EventId, EventId)>,

    /// Events whose parent walk revisits an id.
    pub cyclic_events: Vec<EventId>,

    /// Number of branches checked.
    pub branches_checked: usize,

    /// Branches whose head points at a missing event.
    pub branches_dangling: Vec<String>,
}

impl VerifyReport {
    /// Returns true if any issues were found.
    pub fn has_issues(&self) -> bool {
        !self.dangling_parents.is_empty()
            || !self.cyclic_events.is_empty()
            || !self.branches_dangling.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            "Store is healthy. No issues found.".to_string()
        } else {
            let mut issues = Vec::new();
            if !self.dangling_parents.is_empty() {
                issues.push(format!("{} dangling parents", self.dangling_parents.len()));
            }
            if !self.cyclic_events.is_empty() {
                issues.push(format!("{} cyclic events", self.cyclic_events.len()));
            }
            if !self.branches_dangling.is_empty() {
                issues.push(format!("{} dangling branch heads", self.branches_dangling.len()));
            }
            format!("Store has issues: {}", issues.join(", "))
        }
    }
}

/// Verifies the forest invariant over the whole store.
///
/// # Examples
///
/// ```no_run
/// use saga_core::{verify, SagaRepo};
///
/// let repo = SagaRepo::open(".").unwrap();
/// let report = verify(repo.store()).unwrap();
/// if report.has_issues() {
///     eprintln!("{}", report.summary());
/// }
/// ```
pub fn verify(store: &EventStore) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    // Events verified acyclic with a resolving parent, memoized across
    // walks so shared ancestry is checked once.
    let mut known_good: HashSet<EventId> = HashSet::new();

    for id in store.all_event_ids()? {
        report.events_checked += 1;
        if known_good.contains(&id) {
            continue;
        }

        match walk_to_root(store, id, &known_good) {
            Ok(path) => known_good.extend(path),
            Err(SagaError::DanglingParent { event, parent }) => {
                warn!(event, parent, "verify: dangling parent");
                report
                    .dangling_parents
                    .push((EventId::from_u64(event), EventId::from_u64(parent)));
            }
            Err(SagaError::ParentCycle(event)) => {
                warn!(event, "verify: parent cycle");
                report.cyclic_events.push(EventId::from_u64(event));
            }
            Err(e) => return Err(e),
        }
    }

    for branch in store.list_branches()? {
        report.branches_checked += 1;
        if let Some(head) = branch.head {
            if !store.event_exists(head)? {
                report.branches_dangling.push(branch.name);
            }
        }
    }

    Ok(report)
}

/// Walks from `start` to a root (or a known-good event), returning every
/// id on the path.
fn walk_to_root(
    store: &EventStore,
    start: EventId,
    known_good: &HashSet<EventId>,
) -> Result<Vec<EventId>> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    let mut prev: Option<EventId> = None;

    while let Some(id) = cursor {
        if known_good.contains(&id) {
            break;
        }
        if !seen.insert(id) {
            return Err(SagaError::ParentCycle(id.as_u64()));
        }

        let event = match store.get_event(id) {
            Ok(event) => event,
            Err(SagaError::NoSuchEvent(missing)) => {
                let child = prev.map(|p| p.as_u64()).unwrap_or(missing);
                return Err(SagaError::DanglingParent {
                    event: child,
                    parent: missing,
                });
            }
            Err(e) => return Err(e),
        };

        path.push(id);
        prev = Some(id);
        cursor = event.parent;
    }

    Ok(path)
}
