//! Single-pass conflation with list index renumbering.
//!
//! The window keeps the output as a tombstoned vector so updates can be
//! dropped or rewritten in place while positions recorded in the per-id
//! indexes stay valid.
//!
//! # Invariants
//!
//! - `installs`, `removals` and `scalar_updates` only point at live slots.
//! - A node installed and removed inside the window leaves no trace in the
//!   output, nor do any updates addressed to its subtree.
//! - Every surviving `InstallIndex`/`RemoveIndex` carries the position it
//!   has when the conflated block is replayed, not when it was recorded.

use std::collections::HashMap;

use tracing::trace;

use vheap_types::{NodeId, Update, UpdateBlock};

use crate::Conflater;

/// The default conflater.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmartConflater;

impl SmartConflater {
    /// Create a new conflater.
    pub fn new() -> Self {
        Self
    }
}

impl Conflater for SmartConflater {
    fn conflate(&self, blocks: &[UpdateBlock]) -> UpdateBlock {
        conflate(blocks)
    }
}

/// Conflate `blocks` into one equivalent block.
pub fn conflate(blocks: &[UpdateBlock]) -> UpdateBlock {
    let total: usize = blocks.iter().map(|b| b.len()).sum();
    let mut window = ConflationWindow::with_capacity(total);
    for update in blocks.iter().flat_map(|b| b.iter()) {
        window.push(update);
    }
    let conflated = window.finish();
    trace!(input = total, output = conflated.len(), "conflated update window");
    conflated
}

struct ConflationWindow {
    conflated: Vec<Option<Update>>,
    installs: HashMap<NodeId, usize>,
    removals: HashMap<NodeId, usize>,
    scalar_updates: HashMap<NodeId, usize>,
    clear_counts: HashMap<NodeId, usize>,
}

impl ConflationWindow {
    fn with_capacity(size: usize) -> Self {
        Self {
            conflated: Vec::with_capacity(size),
            installs: HashMap::with_capacity(size / 2),
            removals: HashMap::with_capacity(size / 2),
            scalar_updates: HashMap::with_capacity(size / 2),
            clear_counts: HashMap::new(),
        }
    }

    fn append(&mut self, update: Update) -> usize {
        self.conflated.push(Some(update));
        self.conflated.len() - 1
    }

    fn push(&mut self, update: &Update) {
        match update {
            Update::SetScalar { id, .. } => {
                let pos = self.append(update.clone());
                if let Some(previous) = self.scalar_updates.insert(*id, pos) {
                    self.conflated[previous] = None;
                }
            }
            Update::InstallField { id, .. } | Update::InstallIndex { id, .. } => {
                let pos = self.append(update.clone());
                self.installs.insert(*id, pos);
                self.removals.remove(id);
            }
            Update::RemoveField {
                id,
                deallocated_ids,
                ..
            }
            | Update::RemoveIndex {
                id,
                deallocated_ids,
                ..
            } => {
                if !self.installs.contains_key(id) {
                    let pos = self.append(update.clone());
                    self.removals.insert(*id, pos);
                }
                self.on_deallocated(with_self(*id, deallocated_ids), Some(*id));
            }
            Update::RemoveChildren {
                id,
                deallocated_ids,
            } => {
                self.append(update.clone());
                *self.clear_counts.entry(*id).or_insert(0) += 1;
                self.on_deallocated(deallocated_ids.iter().copied().collect(), None);
            }
            Update::InstallRoot { .. } | Update::TerminateHeap => {
                self.append(update.clone());
            }
        }
    }

    /// Renumber same-parent list operations recorded after a transient
    /// install that is about to vanish from the output.
    fn shift_after(&mut self, install_pos: usize) {
        let (parent, mut min_index) = match &self.conflated[install_pos] {
            Some(Update::InstallIndex {
                parent_id, index, ..
            }) => (*parent_id, *index),
            _ => return,
        };
        for update in self.conflated[install_pos + 1..].iter_mut().flatten() {
            match update {
                Update::InstallIndex {
                    parent_id, index, ..
                } if *parent_id == parent => {
                    if *index <= min_index {
                        min_index += 1;
                    } else {
                        *index -= 1;
                    }
                }
                Update::RemoveIndex {
                    parent_id, index, ..
                } if *parent_id == parent => {
                    if *index < min_index {
                        min_index -= 1;
                    } else {
                        debug_assert!(*index > 0, "removal below a shifted install");
                        *index = index.saturating_sub(1);
                    }
                }
                _ => {}
            }
        }
    }

    /// Forget everything recorded for freed ids. `removed` keeps its own
    /// removal record, the rest are covered by the ancestor's removal.
    /// Every purged list install renumbers its siblings, whether it goes
    /// through its own removal or an ancestor's clear.
    fn on_deallocated(&mut self, ids: Vec<NodeId>, removed: Option<NodeId>) {
        for id in ids {
            if let Some(pos) = self.scalar_updates.remove(&id) {
                self.conflated[pos] = None;
            }

            let cleared = self.clear_counts.remove(&id).unwrap_or(0);
            if let Some(pos) = self.installs.remove(&id) {
                self.shift_after(pos);
                self.conflated[pos] = None;
                if cleared > 0 {
                    self.drop_last_clears(id, cleared);
                }
            }

            if Some(id) != removed {
                if let Some(pos) = self.removals.remove(&id) {
                    self.conflated[pos] = None;
                }
            }
        }
    }

    fn drop_last_clears(&mut self, id: NodeId, mut remaining: usize) {
        for slot in self.conflated.iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            if matches!(slot, Some(Update::RemoveChildren { id: cleared, .. }) if *cleared == id) {
                *slot = None;
                remaining -= 1;
            }
        }
    }

    fn finish(self) -> UpdateBlock {
        let mut out: Vec<Update> = Vec::with_capacity(self.conflated.len());
        for update in self.conflated.into_iter().flatten() {
            // A clear directly after a clear of the same node is a no-op.
            if let (
                Update::RemoveChildren { id, .. },
                Some(Update::RemoveChildren { id: previous, .. }),
            ) = (&update, out.last())
            {
                if id == previous {
                    continue;
                }
            }
            out.push(update);
        }
        UpdateBlock::new(out)
    }
}

fn with_self(id: NodeId, deallocated: &vheap_types::DeallocatedIds) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = deallocated.iter().copied().collect();
    if !deallocated.contains(&id) {
        ids.push(id);
    }
    ids
}
