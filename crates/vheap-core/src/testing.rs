//! Randomised mutation driver for property tests.
//!
//! Mutations go through the ordinary transaction API, so ids always come
//! from the heap's own allocator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use vheap_types::{NodeId, NodeType, UpdateBlock};

use crate::error::HeapResult;
use crate::heap::Heap;
use crate::transaction::Transaction;

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

/// Applies seeded random transactions to a heap.
#[derive(Debug)]
pub struct RandomMutator {
    rng: StdRng,
}

impl RandomMutator {
    /// Create a mutator with a reproducible seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run one transaction of up to `steps` random mutations and commit it.
    pub fn mutate(&mut self, heap: &Heap, steps: usize) -> HeapResult<UpdateBlock> {
        let mut tx = heap.begin_update()?;
        let root = match tx.root() {
            Some(root) => root,
            None => {
                let node_type = if self.rng.gen_bool(0.5) {
                    NodeType::List
                } else {
                    NodeType::Map
                };
                tx.ensure_root(node_type)?
            }
        };
        for _ in 0..steps {
            self.step(&mut tx, root)?;
        }
        tx.commit()
    }

    fn step(&mut self, tx: &mut Transaction<'_>, root: NodeId) -> HeapResult<()> {
        let target = self.pick_collection(tx, root)?;
        let size = tx.size(target)?;

        if size > 0 && self.rng.gen_range(0..size.max(4)) == 0 {
            return tx.clear(target);
        }

        let node_type = tx.node(target)?.node_type();
        match node_type {
            NodeType::List => {
                if size > 0 && self.rng.gen_bool(0.3) {
                    let index = self.rng.gen_range(0..size);
                    tx.remove_index(target, index)?;
                } else {
                    let index = self.rng.gen_range(0..=size);
                    let child_type = self.child_type();
                    let child = tx.insert_at(target, index, child_type)?;
                    self.maybe_set(tx, child, child_type)?;
                }
            }
            NodeType::Map | NodeType::Object => {
                let name = NAMES[self.rng.gen_range(0..NAMES.len())];
                if tx.get_field(target, name)?.is_some() && self.rng.gen_bool(0.4) {
                    tx.remove_field(target, name)?;
                } else {
                    let child_type = self.child_type();
                    let child = tx.ensure_field(target, name, child_type)?;
                    let actual = tx.node(child)?.node_type();
                    self.maybe_set(tx, child, actual)?;
                }
            }
            NodeType::Scalar => {}
        }
        Ok(())
    }

    /// A random collection node reachable from `root`, biased towards the top.
    fn pick_collection(&mut self, tx: &Transaction<'_>, root: NodeId) -> HeapResult<NodeId> {
        let mut current = root;
        loop {
            let collections: Vec<NodeId> = tx
                .children(current)?
                .into_iter()
                .filter(|id| {
                    tx.node(*id)
                        .map(|node| node.node_type().is_collection())
                        .unwrap_or(false)
                })
                .collect();
            if collections.is_empty() || self.rng.gen_bool(0.5) {
                return Ok(current);
            }
            current = collections[self.rng.gen_range(0..collections.len())];
        }
    }

    fn child_type(&mut self) -> NodeType {
        match self.rng.gen_range(0..10) {
            0..=5 => NodeType::Scalar,
            6 => NodeType::List,
            7 => NodeType::Map,
            _ => NodeType::Object,
        }
    }

    fn maybe_set(&mut self, tx: &mut Transaction<'_>, id: NodeId, node_type: NodeType) -> HeapResult<()> {
        if node_type == NodeType::Scalar && self.rng.gen_bool(0.8) {
            let value = match self.rng.gen_range(0..4) {
                0 => Value::Null,
                1 => Value::from(self.rng.gen_range(0..5i64)),
                2 => Value::from(self.rng.gen_bool(0.5)),
                _ => Value::from(NAMES[self.rng.gen_range(0..NAMES.len())]),
            };
            tx.set_scalar(id, value)?;
        }
        Ok(())
    }
}
