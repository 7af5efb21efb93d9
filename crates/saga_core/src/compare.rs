//! Structural comparison of two branches' resolved states.

use crate::branches::BranchRegistry;
use crate::container::ContainerId;
use crate::error::Result;
use crate::resolve::{Snapshot, StateResolver};
use crate::store::EventStore;
use serde::Serialize;

/// One field that differs between the two sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    /// Field name.
    pub field: String,
    /// Value on side A (`None` when unset there).
    pub a: Option<serde_json::Value>,
    /// Value on side B (`None` when unset there).
    pub b: Option<serde_json::Value>,
}

/// A container present on both sides with unequal field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerDelta {
    /// The container.
    pub container: ContainerId,
    /// Differing fields, sorted by name.
    pub fields: Vec<FieldDelta>,
}

/// Diff between two branches' resolved snapshots.
///
/// Symmetric under argument swap: `compare(B, A).only_in_a` equals
/// `compare(A, B).only_in_b`, and the `different` id set is identical
/// either way (only which side a value sits on flips).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchDiff {
    /// Name of side A.
    pub branch_a: String,
    /// Name of side B.
    pub branch_b: String,
    /// Containers present only on side A, sorted.
    pub only_in_a: Vec<ContainerId>,
    /// Containers present only on side B, sorted.
    pub only_in_b: Vec<ContainerId>,
    /// Containers present on both sides with differing fields, sorted.
    pub different: Vec<ContainerDelta>,
}

impl BranchDiff {
    /// True when the two branches resolve to identical container sets.
    pub fn is_empty(&self) -> bool {
        self.only_in_a.is_empty() && self.only_in_b.is_empty() && self.different.is_empty()
    }
}

/// Resolves both branches independently and set-compares by container id.
///
/// # Errors
///
/// Returns `UnknownBranch` if either name is unknown, plus any resolution
/// error (`DanglingParent` etc.).
pub fn compare(
    store: &EventStore,
    resolver: &StateResolver,
    branch_a: &str,
    branch_b: &str,
) -> Result<BranchDiff> {
    let registry = BranchRegistry::new(store);
    let head_a = registry.checkout(branch_a)?;
    let head_b = registry.checkout(branch_b)?;

    let snapshot_a = resolver.resolve(store, head_a)?;
    let snapshot_b = resolver.resolve(store, head_b)?;

    Ok(diff_snapshots(
        branch_a, branch_b, &snapshot_a, &snapshot_b,
    ))
}

/// Pure set-comparison of two snapshots.
pub fn diff_snapshots(
    branch_a: &str,
    branch_b: &str,
    a: &Snapshot,
    b: &Snapshot,
) -> BranchDiff {
    let mut only_in_a = Vec::new();
    let mut only_in_b = Vec::new();
    let mut different = Vec::new();

    // Snapshots are BTreeMaps, so both iterations are already sorted.
    for (id, state_a) in a {
        match b.get(id) {
            None => only_in_a.push(id.clone()),
            Some(state_b) if state_a != state_b => {
                different.push(ContainerDelta {
                    container: id.clone(),
                    fields: field_deltas(state_a, state_b),
                });
            }
            Some(_) => {}
        }
    }
    for id in b.keys() {
        if !a.contains_key(id) {
            only_in_b.push(id.clone());
        }
    }

    BranchDiff {
        branch_a: branch_a.to_string(),
        branch_b: branch_b.to_string(),
        only_in_a,
        only_in_b,
        different,
    }
}

/// Shallow field-by-field comparison of two materialized states.
fn field_deltas(
    state_a: &crate::container::ContainerState,
    state_b: &crate::container::ContainerState,
) -> Vec<FieldDelta> {
    let fields_a = state_a.fields();
    let fields_b = state_b.fields();

    let mut names: Vec<&String> = fields_a.keys().chain(fields_b.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter(|name| fields_a.get(*name) != fields_b.get(*name))
        .map(|name| FieldDelta {
            field: name.clone(),
            a: fields_a.get(name).cloned(),
            b: fields_b.get(name).cloned(),
        })
        .collect()
}
