use thiserror::Error;

#[derive(Debug, Error)]
pub enum VheapError {
    #[error("heap error: {0}")]
    Heap(#[from] vheap_core::HeapError),

    #[error("diff error: {0}")]
    Diff(#[from] vheap_diff::DiffError),

    #[error("type error: {0}")]
    Type(#[from] vheap_types::TypeError),
}

pub type VheapResult<T> = Result<T, VheapError>;
