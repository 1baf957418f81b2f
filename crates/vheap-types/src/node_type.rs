use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The shape of a node.
///
/// `Object` stores its children exactly like `Map`; the distinction exists
/// only for consumers that present objects and maps differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Scalar,
    List,
    Map,
    Object,
}

impl NodeType {
    /// All node types, in declaration order.
    pub const ALL: [NodeType; 4] = [
        NodeType::Scalar,
        NodeType::List,
        NodeType::Map,
        NodeType::Object,
    ];

    /// Returns `true` for types whose children are keyed by name.
    pub fn is_map_like(self) -> bool {
        matches!(self, NodeType::Map | NodeType::Object)
    }

    /// Returns `true` for types that can own children.
    pub fn is_collection(self) -> bool {
        !matches!(self, NodeType::Scalar)
    }

    /// Canonical upper-case tag.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Scalar => "SCALAR",
            NodeType::List => "LIST",
            NodeType::Map => "MAP",
            NodeType::Object => "OBJECT",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownNodeType(s.to_string()))
    }
}
