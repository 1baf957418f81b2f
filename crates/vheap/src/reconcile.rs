//! Explicit reconciliation of one heap against another.

use tracing::debug;

use vheap_core::{Heap, Origin};
use vheap_diff::diff_heaps;
use vheap_types::UpdateBlock;

use crate::error::VheapResult;

/// Bring `replica` to `source`'s current state and return the block that
/// was applied.
///
/// The block is replayed as a listener feed, so `replica` may be read-only
/// and its free-id pool is left alone. Both heaps must share identity, and
/// `source` must not change between the diff and the replay.
pub fn reconcile(replica: &Heap, source: &Heap) -> VheapResult<UpdateBlock> {
    let block = diff_heaps(replica, source)?;
    if !block.is_empty() {
        let mut tx = replica.begin_update()?;
        tx.apply_block(&block, Origin::Listener)?;
        tx.commit()?;
    }
    debug!(
        replica = %replica.uri(),
        source = %source.uri(),
        updates = block.len(),
        "reconciled heap"
    );
    Ok(block)
}
