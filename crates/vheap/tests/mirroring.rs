use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use vheap::{
    BlockRecorder, ErrorKind, Heap, HeapConfig, HeapListener, NodeId, NodeType, Origin, Update,
    VheapResult,
};
use vheap_core::testing::RandomMutator;

fn assert_ids_consistent(heap: &Heap) {
    let live = heap.live_ids().unwrap();
    let snapshot = heap.snapshot().unwrap();
    // Every live node is reachable and every reachable node is live.
    assert_eq!(live.len(), snapshot.len());
    for id in &live {
        assert!(snapshot.node(*id).is_some(), "live node {id} not reachable");
    }
    let unique: BTreeSet<NodeId> = live.iter().copied().collect();
    assert_eq!(unique.len(), live.len());
    for free in heap.free_ids().unwrap() {
        assert!(!unique.contains(&free), "free id {free} is live");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn mirrors_track_their_source(seed in any::<u64>(), rounds in 1usize..10, steps in 1usize..12) {
        let source = Arc::new(Heap::mutable("heap://source"));
        let early = Heap::mirror("heap://early", &source, false, HeapConfig::immutable()).unwrap();
        let mut mutator = RandomMutator::new(seed);

        mutator.mutate(&source, steps).unwrap();
        let late = Heap::mirror("heap://late", &source, true, HeapConfig::default()).unwrap();
        let chained = Heap::mirror("heap://chained", &late, true, HeapConfig::immutable()).unwrap();

        for _ in 0..rounds {
            mutator.mutate(&source, steps).unwrap();
            let expected = source.snapshot().unwrap();
            prop_assert_eq!(&early.snapshot().unwrap(), &expected);
            prop_assert_eq!(&late.snapshot().unwrap(), &expected);
            prop_assert_eq!(&chained.snapshot().unwrap(), &expected);
        }
        prop_assert!(early.free_ids().unwrap().is_empty());
        prop_assert!(late.free_ids().unwrap().is_empty());
    }

    #[test]
    fn live_ids_are_never_shared(seed in any::<u64>(), rounds in 1usize..16, steps in 1usize..16) {
        let heap = Heap::mutable("heap://ids");
        let mut mutator = RandomMutator::new(seed);
        for _ in 0..rounds {
            let mut live: BTreeSet<NodeId> = heap.live_ids().unwrap().into_iter().collect();
            let block = mutator.mutate(&heap, steps).unwrap();
            assert_ids_consistent(&heap);

            // An install never names an id that is live at that moment.
            for update in block.iter() {
                if let Some(freed) = update.deallocated_ids() {
                    for id in freed {
                        live.remove(id);
                    }
                }
                if update.is_install() {
                    prop_assert!(live.insert(update.id().unwrap()));
                }
            }
        }
    }

    #[test]
    fn conflated_catch_up_matches_traversal(seed in any::<u64>(), rounds in 1usize..10, steps in 1usize..12) {
        let source = Arc::new(Heap::new("heap://source", HeapConfig::conflated()));
        let mut mutator = RandomMutator::new(seed);
        for _ in 0..rounds {
            mutator.mutate(&source, steps).unwrap();
        }

        let by_history = Heap::mirror("heap://history", &source, true, HeapConfig::immutable()).unwrap();
        let by_traversal = Heap::mutable("heap://traversal");
        let plain = Heap::mutable("heap://plain");
        source.traverse(&plain).unwrap();
        plain.traverse(&by_traversal).unwrap();

        let expected = source.snapshot().unwrap();
        prop_assert_eq!(&by_history.snapshot().unwrap(), &expected);
        prop_assert_eq!(&by_traversal.snapshot().unwrap(), &expected);
    }
}

#[test]
fn immutable_mirror_only_accepts_its_feed() {
    let source = Arc::new(Heap::mutable("heap://source"));
    let mut tx = source.begin_update().unwrap();
    let root = tx.ensure_root(NodeType::Map).unwrap();
    let field = tx.ensure_field(root, "field", NodeType::Scalar).unwrap();
    tx.commit().unwrap();

    let mirror = Heap::mirror("heap://immutable", &source, true, HeapConfig::immutable()).unwrap();
    let mut tx = mirror.begin_update().unwrap();

    let direct_failures = [
        tx.ensure_field(root, "other", NodeType::Scalar).map(|_| ()),
        tx.install_field(root, NodeId(10), "other", NodeType::Scalar, Origin::Direct),
        tx.set_scalar(field, 3).map(|_| ()),
        tx.remove_field(root, "field").map(|_| ()),
        tx.remove_field_by_id(root, field, Origin::Direct),
        tx.clear(root),
        tx.terminate(),
    ];
    for result in direct_failures {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Immutability);
    }
    assert!(tx.pending().is_empty());

    tx.install_field(root, NodeId(10), "other", NodeType::Scalar, Origin::Listener)
        .unwrap();
    tx.apply(
        &Update::SetScalar {
            id: field,
            value: serde_json::json!(3),
        },
        Origin::Listener,
    )
    .unwrap();
    tx.remove_field_by_id(root, field, Origin::Listener).unwrap();
    tx.remove_children(root, Origin::Listener).unwrap();
    assert_eq!(tx.pending().len(), 4);
    tx.commit().unwrap();
}

#[test]
fn listener_errors_reach_the_committer() {
    struct Refuse;
    impl HeapListener for Refuse {
        fn apply_update(&self, _block: &vheap::UpdateBlock) -> vheap::HeapResult<()> {
            Err(vheap::HeapError::Concurrency("refused".into()))
        }
    }

    let heap = Heap::mutable("heap://source");
    let recorder = Arc::new(BlockRecorder::new());
    heap.add_listener(recorder.clone(), false).unwrap();
    heap.add_listener(Arc::new(Refuse), false).unwrap();

    let mut tx = heap.begin_update().unwrap();
    tx.ensure_root(NodeType::Scalar).unwrap();
    assert!(tx.commit().is_err());
    // The heap state and earlier listeners keep the committed block.
    assert_eq!(recorder.update_count(), 1);
    assert!(heap.root().unwrap().is_some());
    assert!(heap.begin_update().is_ok());
}

#[test]
fn mirror_of_terminated_heap_is_terminated() {
    let source = Arc::new(Heap::mutable("heap://source"));
    let mut tx = source.begin_update().unwrap();
    tx.ensure_root(NodeType::List).unwrap();
    tx.terminate().unwrap();
    tx.commit().unwrap();

    let mirror = Heap::mirror("heap://mirror", &source, true, HeapConfig::default()).unwrap();
    assert!(mirror.is_terminated().unwrap());
    let mut tx = mirror.begin_update().unwrap();
    let err = tx.ensure_root(NodeType::List).map(|_| ()).and_then(|_| tx.terminate());
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Terminated);
}

#[test]
fn node_type_tags_parse_through_the_facade() -> VheapResult<()> {
    let parsed: NodeType = "list".parse()?;
    assert_eq!(parsed, NodeType::List);
    let err = "set".parse::<NodeType>().map_err(vheap::VheapError::from);
    assert!(matches!(err, Err(vheap::VheapError::Type(_))));
    Ok(())
}
