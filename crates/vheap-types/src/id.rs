use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node within one heap's arena.
///
/// Ids are small integers handed out by the owning heap. An id is unique
/// among the heap's *live* nodes only: once a node is deallocated its id
/// may be handed out again.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a node id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The id as an arena slot index.
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_matches_raw_value() {
        assert_eq!(NodeId::new(7).slot(), 7);
        assert_eq!(NodeId::from(3).get(), 3);
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(NodeId(1) < NodeId(2));
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&NodeId(42)).unwrap();
        assert_eq!(json, "42");
        let parsed: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, NodeId(42));
    }

    #[test]
    fn debug_and_display() {
        assert_eq!(format!("{:?}", NodeId(5)), "#5");
        assert_eq!(format!("{}", NodeId(5)), "5");
    }
}
