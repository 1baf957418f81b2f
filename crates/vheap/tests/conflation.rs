use std::sync::Arc;

use proptest::prelude::*;
use vheap::{
    conflate, BlockRecorder, Conflater, Heap, HeapListener, NodeId, NodeType, Origin,
    SmartConflater, Update, UpdateBlock,
};
use vheap_core::testing::RandomMutator;

/// A heap with a recorder attached from creation.
fn recorded_heap(uri: &str) -> (Heap, Arc<BlockRecorder>) {
    let heap = Heap::mutable(uri);
    let recorder = Arc::new(BlockRecorder::new());
    heap.add_listener(recorder.clone(), false).unwrap();
    (heap, recorder)
}

fn replay(block: &UpdateBlock) -> Heap {
    let heap = Heap::mutable("heap://replay");
    heap.apply_update(block).unwrap();
    heap
}

fn install(parent: u32, id: u32, index: usize) -> Update {
    Update::InstallIndex {
        parent_id: NodeId(parent),
        id: NodeId(id),
        index,
        node_type: NodeType::Scalar,
    }
}

/// Root list; 1 at 0, 2 at 0, 3 at 1, 4 at `last_index`; then remove 1.
fn reindex_scenario(last_index: usize) -> (Heap, Vec<UpdateBlock>) {
    let (heap, recorder) = recorded_heap("heap://scenario");
    let mut tx = heap.begin_update().unwrap();
    let root = tx.ensure_root(NodeType::List).unwrap();
    let one = tx.insert_at(root, 0, NodeType::Scalar).unwrap();
    tx.insert_at(root, 0, NodeType::Scalar).unwrap();
    tx.insert_at(root, 1, NodeType::Scalar).unwrap();
    tx.insert_at(root, last_index, NodeType::Scalar).unwrap();
    tx.commit().unwrap();

    let mut tx = heap.begin_update().unwrap();
    tx.remove_by_id(root, one, Origin::Direct).unwrap();
    tx.commit().unwrap();
    (heap, recorder.blocks())
}

#[test]
fn insertions_below_the_removed_node_keep_their_indices() {
    let (heap, blocks) = reindex_scenario(2);
    let conflated = conflate(&blocks);
    assert_eq!(
        conflated.to_vec(),
        vec![
            Update::InstallRoot {
                id: NodeId(0),
                node_type: NodeType::List
            },
            install(0, 2, 0),
            install(0, 3, 1),
            install(0, 4, 2),
        ]
    );
    assert_eq!(replay(&conflated).snapshot().unwrap(), heap.snapshot().unwrap());
}

#[test]
fn insertion_above_the_removed_node_is_renumbered() {
    let (heap, blocks) = reindex_scenario(3);
    let conflated = conflate(&blocks);
    assert_eq!(
        conflated.to_vec(),
        vec![
            Update::InstallRoot {
                id: NodeId(0),
                node_type: NodeType::List
            },
            install(0, 2, 0),
            install(0, 3, 1),
            install(0, 4, 2),
        ]
    );
    assert_eq!(replay(&conflated).snapshot().unwrap(), heap.snapshot().unwrap());
}

#[test]
fn repeated_scalar_writes_collapse_across_blocks() {
    let (heap, recorder) = recorded_heap("heap://scalar");
    for value in 0..10 {
        let mut tx = heap.begin_update().unwrap();
        let root = tx.ensure_root(NodeType::Map).unwrap();
        let score = tx.ensure_field(root, "score", NodeType::Scalar).unwrap();
        tx.set_scalar(score, value).unwrap();
        tx.commit().unwrap();
    }
    let blocks = recorder.blocks();
    let conflated = SmartConflater::new().conflate(&blocks);
    assert_eq!(conflated.len(), 3);
    assert!(conflated.len() < recorder.update_count());
    assert_eq!(replay(&conflated).snapshot().unwrap(), heap.snapshot().unwrap());
}

#[test]
fn subtree_installed_and_removed_in_window_vanishes() {
    let (heap, recorder) = recorded_heap("heap://transient");
    let mut tx = heap.begin_update().unwrap();
    let root = tx.ensure_root(NodeType::Map).unwrap();
    tx.commit().unwrap();

    let mut tx = heap.begin_update().unwrap();
    let market = tx.ensure_field(root, "market", NodeType::Object).unwrap();
    let runners = tx.ensure_field(market, "runners", NodeType::List).unwrap();
    let runner = tx.insert_at(runners, 0, NodeType::Scalar).unwrap();
    tx.set_scalar(runner, "Red Rum").unwrap();
    tx.commit().unwrap();

    let mut tx = heap.begin_update().unwrap();
    tx.remove_field(root, "market").unwrap();
    tx.commit().unwrap();

    let conflated = conflate(&recorder.blocks());
    assert_eq!(
        conflated.to_vec(),
        vec![Update::InstallRoot {
            id: NodeId(0),
            node_type: NodeType::Map
        }]
    );
}

/// Apply `block` to `heap`, checking that every positional update names
/// the position its node has at that moment.
fn replay_checking_indices(heap: &Heap, block: &UpdateBlock) {
    let mut tx = heap.begin_update().unwrap();
    for update in block.iter() {
        match update {
            Update::RemoveIndex { id, index, .. } => {
                assert_eq!(tx.node(*id).unwrap().index(), Some(*index), "{update}");
            }
            Update::InstallIndex {
                parent_id, index, ..
            } => {
                assert!(*index <= tx.size(*parent_id).unwrap(), "{update}");
            }
            _ => {}
        }
        tx.apply(update, Origin::Listener).unwrap();
    }
    tx.commit().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn conflation_preserves_the_end_state(seed in any::<u64>(), rounds in 1usize..12, steps in 1usize..16) {
        let (heap, recorder) = recorded_heap("heap://random");
        let mut mutator = RandomMutator::new(seed);
        for _ in 0..rounds {
            mutator.mutate(&heap, steps).unwrap();
        }

        let blocks = recorder.blocks();
        let conflated = conflate(&blocks);
        prop_assert!(conflated.len() <= recorder.update_count());
        prop_assert_eq!(replay(&conflated).snapshot().unwrap(), heap.snapshot().unwrap());
    }

    #[test]
    fn conflation_is_stable_under_reconflation(seed in any::<u64>(), rounds in 2usize..10, steps in 1usize..12) {
        let (heap, recorder) = recorded_heap("heap://random");
        let mut mutator = RandomMutator::new(seed);
        for _ in 0..rounds {
            mutator.mutate(&heap, steps).unwrap();
        }

        // Folding block by block, as conflated catch-up does, reaches the
        // same state as conflating the whole window at once.
        let blocks = recorder.blocks();
        let folded = blocks
            .iter()
            .fold(UpdateBlock::empty(), |acc, block| conflate(&[acc, block.clone()]));
        prop_assert_eq!(replay(&folded).snapshot().unwrap(), heap.snapshot().unwrap());
        prop_assert!(folded.len() <= recorder.update_count());
    }

    #[test]
    fn conflated_suffix_carries_replay_positions(seed in any::<u64>(), rounds in 2usize..12, steps in 1usize..16, split in 1usize..12) {
        let (heap, recorder) = recorded_heap("heap://random");
        let mut mutator = RandomMutator::new(seed);
        for _ in 0..rounds {
            mutator.mutate(&heap, steps).unwrap();
        }

        let blocks = recorder.blocks();
        let split = split.min(blocks.len());
        let replica = replay(&UpdateBlock::merge(&blocks[..split]));
        replay_checking_indices(&replica, &conflate(&blocks[split..]));
        prop_assert_eq!(replica.snapshot().unwrap(), heap.snapshot().unwrap());
    }
}
