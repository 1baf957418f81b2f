use thiserror::Error;

/// Errors produced by vocabulary operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A node type tag that is not one of the four known shapes.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
}
