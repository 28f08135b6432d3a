// Ownership property tests, run against every SharedOwner implementation.
//
// Model: a fixed set of handle slots, each either empty or owning one object
// id. Per-object owner counts are derived from the slots.
//  - Invariant: every live object has exactly as many owners as slots
//    referring to it; `owner_count()` agrees; slots sharing an id report the
//    same pointer.
//  - Invariant: an object has been dropped iff it has no owners left and was
//    not detached into the harness (detached boxes are dropped at once).
//  - Operations: new, clone-into, assign, reset, release, detach, drop-all.
//
// The same model also runs over a zero-sized payload. Every boxed ZST shares
// one address, so only owner counts and the total drop tally can tell rings
// apart there.
use proptest::prelude::*;
use ring_ptr::{CountedPtr, Detached, RingPtr, SharedOwner};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

const SLOTS: usize = 6;

struct Tracked {
    id: usize,
    dropped: Rc<RefCell<Vec<usize>>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.dropped.borrow_mut().push(self.id);
    }
}

#[derive(Clone, Debug)]
enum Op {
    New(usize),
    CloneInto(usize, usize),
    Assign(usize, usize),
    Reset(usize),
    Release(usize),
    Detach(usize),
    DropAll,
}

prop_compose! {
    fn arb_ops()(ops in proptest::collection::vec(
        prop_oneof![
            2 => (0..SLOTS).prop_map(Op::New),
            4 => (0..SLOTS, 0..SLOTS).prop_map(|(d, s)| Op::CloneInto(d, s)),
            3 => (0..SLOTS, 0..SLOTS).prop_map(|(d, s)| Op::Assign(d, s)),
            1 => (0..SLOTS).prop_map(Op::Reset),
            2 => (0..SLOTS).prop_map(Op::Release),
            2 => (0..SLOTS).prop_map(Op::Detach),
            1 => Just(Op::DropAll),
        ], 1..150)) -> Vec<Op> { ops }
}

fn run_model<P: SharedOwner<Tracked>>(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let dropped = Rc::new(RefCell::new(Vec::new()));
    let mut next_id = 0usize;
    let mut fresh = |dropped: &Rc<RefCell<Vec<usize>>>| {
        next_id += 1;
        Tracked {
            id: next_id,
            dropped: dropped.clone(),
        }
    };

    let mut slots: Vec<P> = (0..SLOTS).map(|_| P::default()).collect();
    let mut model: Vec<Option<usize>> = vec![None; SLOTS];
    let mut created: BTreeSet<usize> = BTreeSet::new();

    for op in ops {
        match op {
            Op::New(i) => {
                let t = fresh(&dropped);
                created.insert(t.id);
                model[i] = Some(t.id);
                slots[i] = P::from_box(Box::new(t));
            }
            Op::CloneInto(d, s) => {
                slots[d] = slots[s].clone();
                model[d] = model[s];
            }
            Op::Assign(d, s) => {
                let src = slots[s].clone();
                slots[d].assign(&src);
                model[d] = model[s];
            }
            Op::Reset(i) => {
                let t = fresh(&dropped);
                created.insert(t.id);
                model[i] = Some(t.id);
                slots[i].reset(Box::new(t));
            }
            Op::Release(i) => {
                slots[i].release();
                model[i] = None;
            }
            Op::Detach(i) => {
                let id = model[i].take();
                let owners = model.iter().filter(|m| **m == id).count();
                match slots[i].detach() {
                    Detached::Empty => prop_assert!(id.is_none()),
                    Detached::Unique(boxed) => {
                        prop_assert_eq!(Some(boxed.id), id);
                        prop_assert_eq!(owners, 0);
                    }
                    Detached::Shared(p) => {
                        prop_assert!(id.is_some());
                        prop_assert!(owners > 0);
                        prop_assert_eq!(Some(unsafe { p.as_ref() }.id), id);
                    }
                }
            }
            Op::DropAll => {
                for s in slots.iter_mut() {
                    *s = P::default();
                }
                model = vec![None; SLOTS];
            }
        }

        // Owner counts and pointer agreement.
        let mut owners: HashMap<usize, usize> = HashMap::new();
        for id in model.iter().flatten() {
            *owners.entry(*id).or_default() += 1;
        }
        for (slot, id) in slots.iter().zip(&model) {
            match id {
                None => {
                    prop_assert!(slot.as_ptr().is_null());
                    prop_assert_eq!(slot.owner_count(), 0);
                }
                Some(id) => {
                    prop_assert_eq!(slot.get().map(|t| t.id), Some(*id));
                    prop_assert_eq!(slot.owner_count(), owners[id]);
                }
            }
        }

        // Exactly-once destruction.
        let gone: Vec<usize> = dropped.borrow().clone();
        let gone_set: BTreeSet<usize> = gone.iter().copied().collect();
        prop_assert_eq!(gone.len(), gone_set.len(), "object dropped twice");
        for id in &created {
            prop_assert_eq!(gone_set.contains(id), !owners.contains_key(id));
        }
    }

    drop(slots);
    prop_assert_eq!(dropped.borrow().len(), created.len());
    Ok(())
}

proptest! {
    #[test]
    fn prop_ring_ptr_ownership(ops in arb_ops()) {
        run_model::<RingPtr<Tracked>>(ops)?;
    }

    #[test]
    fn prop_counted_ptr_ownership(ops in arb_ops()) {
        run_model::<CountedPtr<Tracked>>(ops)?;
    }
}

// Zero-sized payload; drops are tallied per test thread.
struct Unit;

thread_local! {
    static UNIT_DROPS: Cell<usize> = const { Cell::new(0) };
}

impl Drop for Unit {
    fn drop(&mut self) {
        UNIT_DROPS.with(|d| d.set(d.get() + 1));
    }
}

fn run_unit_model<P: SharedOwner<Unit>>(ops: Vec<Op>) -> Result<(), TestCaseError> {
    UNIT_DROPS.with(|d| d.set(0));
    let mut next_id = 0usize;
    let mut slots: Vec<P> = (0..SLOTS).map(|_| P::default()).collect();
    let mut model: Vec<Option<usize>> = vec![None; SLOTS];

    for op in ops {
        match op {
            Op::New(i) => {
                next_id += 1;
                model[i] = Some(next_id);
                slots[i] = P::from_box(Box::new(Unit));
            }
            Op::Reset(i) => {
                next_id += 1;
                model[i] = Some(next_id);
                slots[i].reset(Box::new(Unit));
            }
            Op::CloneInto(d, s) => {
                slots[d] = slots[s].clone();
                model[d] = model[s];
            }
            Op::Assign(d, s) => {
                let src = slots[s].clone();
                slots[d].assign(&src);
                model[d] = model[s];
            }
            Op::Release(i) => {
                slots[i].release();
                model[i] = None;
            }
            Op::Detach(i) => {
                let id = model[i].take();
                let shared = id.is_some() && model.contains(&id);
                match slots[i].detach() {
                    Detached::Empty => prop_assert!(id.is_none()),
                    Detached::Unique(_) => prop_assert!(id.is_some() && !shared),
                    Detached::Shared(_) => prop_assert!(shared),
                }
            }
            Op::DropAll => {
                for s in slots.iter_mut() {
                    *s = P::default();
                }
                model = vec![None; SLOTS];
            }
        }

        let mut owners: HashMap<usize, usize> = HashMap::new();
        for id in model.iter().flatten() {
            *owners.entry(*id).or_default() += 1;
        }
        for (slot, id) in slots.iter().zip(&model) {
            let expected = id.map_or(0, |id| owners[&id]);
            prop_assert_eq!(slot.owner_count(), expected);
        }
        prop_assert_eq!(UNIT_DROPS.with(Cell::get), next_id - owners.len());
    }

    drop(slots);
    prop_assert_eq!(UNIT_DROPS.with(Cell::get), next_id);
    Ok(())
}

proptest! {
    #[test]
    fn prop_ring_ptr_zero_sized_ownership(ops in arb_ops()) {
        run_unit_model::<RingPtr<Unit>>(ops)?;
    }

    #[test]
    fn prop_counted_ptr_zero_sized_ownership(ops in arb_ops()) {
        run_unit_model::<CountedPtr<Unit>>(ops)?;
    }
}

// Ring topology stays valid under the same operation mix.
proptest! {
    #[test]
    fn prop_ring_ptr_topology(ops in arb_ops()) {
        let mut slots: Vec<RingPtr<u32>> = (0..SLOTS).map(|_| RingPtr::empty()).collect();
        let mut n = 0u32;
        for op in ops {
            match op {
                Op::New(i) | Op::Reset(i) => { n += 1; slots[i] = RingPtr::new(n); }
                Op::CloneInto(d, s) => slots[d] = slots[s].clone(),
                Op::Assign(d, s) => { let src = slots[s].clone(); slots[d].assign(&src); }
                Op::Release(i) => slots[i].release(),
                Op::Detach(i) => { let _ = slots[i].detach(); }
                Op::DropAll => slots.iter_mut().for_each(RingPtr::release),
            }
            for a in &slots {
                let size = a.check_ring();
                prop_assert!(size.is_ok(), "corrupted ring: {:?}", size);
                let expected = slots.iter().filter(|b| !a.is_empty() && RingPtr::ptr_eq(a, b)).count();
                prop_assert_eq!(size, Ok(expected));
                for b in &slots {
                    prop_assert_eq!(a.shares_ring(b), !a.is_empty() && RingPtr::ptr_eq(a, b));
                }
            }
        }
    }
}
