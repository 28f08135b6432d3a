#![cfg(test)]

// Property tests for the raw ring linkage, kept inside the crate so they can
// reach the node-level operations.
//
// Model: the ring as a Vec of node ids in traversal order. Joining against a
// member inserts the new id just before it; unlinking removes the id. After
// every step each member's `next` must be the id that follows it in the
// model (cyclically), and a lone member must have an empty link.

use crate::ring::{self, NodePtr, RingNode, Unlinked};
use proptest::prelude::*;
use std::ptr::NonNull;

#[derive(Clone, Debug)]
enum Op {
    // Index into the current members, reduced modulo the ring length.
    Join(usize),
    Unlink(usize),
}

prop_compose! {
    fn arb_ops()(ops in proptest::collection::vec(
        prop_oneof![
            3 => any::<usize>().prop_map(Op::Join),
            2 => any::<usize>().prop_map(Op::Unlink),
        ], 1..120)) -> Vec<Op> { ops }
}

fn next_of(n: NodePtr<u8>) -> Option<NodePtr<u8>> {
    unsafe { n.as_ref() }.next()
}

proptest! {
    #[test]
    fn prop_join_unlink_matches_model(ops in arb_ops()) {
        let object = NonNull::from(Box::leak(Box::new(0u8)));
        let mut order: Vec<NodePtr<u8>> = vec![RingNode::alloc(object)];

        for op in ops {
            match op {
                Op::Join(i) => {
                    let pos = i % order.len();
                    let new = RingNode::alloc(object);
                    unsafe { ring::join(order[pos], new) };
                    order.insert(pos, new);
                }
                Op::Unlink(i) => {
                    if order.len() == 1 {
                        // Keep one member so the object stays owned.
                        continue;
                    }
                    let pos = i % order.len();
                    let gone = order.remove(pos);
                    let res = unsafe { ring::unlink(gone) };
                    prop_assert!(matches!(res, Unlinked::Shared(_)));
                    unsafe { ring::free(gone) };
                }
            }

            let len = order.len();
            for (p, &n) in order.iter().enumerate() {
                if len == 1 {
                    prop_assert!(next_of(n).is_none());
                } else {
                    prop_assert_eq!(next_of(n), Some(order[(p + 1) % len]));
                }
                prop_assert_eq!(unsafe { ring::audit(n) }, Ok(len));
                prop_assert_eq!(unsafe { ring::ring_len(n) }, len);
            }
        }

        for n in order.drain(..) {
            let _ = unsafe { ring::unlink(n) };
            unsafe { ring::free(n) };
        }
        drop(unsafe { Box::from_raw(object.as_ptr()) });
    }
}
