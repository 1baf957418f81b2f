use serde::{Deserialize, Serialize};

use crate::error::{HeapError, HeapResult};

/// How a heap brings a newly attached listener up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUp {
    /// Walk the live tree and synthesise installs for every node.
    #[default]
    Traverse,
    /// Keep a running conflation of every committed block and replay it.
    Conflated,
}

/// Configuration for a [`Heap`](crate::Heap).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// When `true`, only updates replayed from an upstream listener feed are
    /// accepted; direct mutation fails with [`HeapError::Immutable`].
    pub read_only: bool,
    /// Catch-up strategy for listeners attached with population.
    pub catch_up: CatchUp,
}

impl HeapConfig {
    /// A heap that can only be changed through its listener feed.
    pub fn immutable() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// A mutable heap that serves new listeners from a conflated history.
    pub fn conflated() -> Self {
        Self {
            catch_up: CatchUp::Conflated,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> HeapResult<Self> {
        serde_json::from_str(json).map_err(|e| HeapError::Config(e.to_string()))
    }
}
