use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::update::Update;

/// An immutable, ordered batch of updates representing one transaction.
///
/// Cloning is cheap: the updates are shared. An empty block means "no-op"
/// and is never broadcast to listeners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBlock {
    updates: Arc<[Update]>,
}

impl UpdateBlock {
    /// Wrap a list of updates.
    pub fn new(updates: Vec<Update>) -> Self {
        Self {
            updates: updates.into(),
        }
    }

    /// The empty (no-op) block.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Concatenate blocks in order.
    pub fn merge(blocks: &[UpdateBlock]) -> Self {
        let size = blocks.iter().map(|b| b.len()).sum();
        let mut merged = Vec::with_capacity(size);
        for block in blocks {
            merged.extend(block.iter().cloned());
        }
        Self::new(merged)
    }

    /// The updates, in application order.
    pub fn list(&self) -> &[Update] {
        &self.updates
    }

    /// Copy the updates out into an owned vector.
    pub fn to_vec(&self) -> Vec<Update> {
        self.updates.to_vec()
    }
}

impl Default for UpdateBlock {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for UpdateBlock {
    type Target = [Update];

    fn deref(&self) -> &[Update] {
        &self.updates
    }
}

impl From<Vec<Update>> for UpdateBlock {
    fn from(updates: Vec<Update>) -> Self {
        Self::new(updates)
    }
}

impl FromIterator<Update> for UpdateBlock {
    fn from_iter<I: IntoIterator<Item = Update>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a UpdateBlock {
    type Item = &'a Update;
    type IntoIter = std::slice::Iter<'a, Update>;

    fn into_iter(self) -> Self::IntoIter {
        self.updates.iter()
    }
}

impl fmt::Display for UpdateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, update) in self.updates.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{update}")?;
        }
        f.write_str("]")
    }
}
