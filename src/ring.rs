//! Ownership-ring linkage.
//!
//! Every non-empty handle owns one heap-allocated `RingNode`, so the node's
//! address stays put while the handle value itself is moved around. Nodes of
//! handles that own the same object are chained through `next` into a closed
//! ring. A sole owner has `next == None`; a one-member ring is never stored
//! as a self-loop.
//!
//! This is the only module that follows or rewrites links. Callers own the
//! nodes they allocate and must free them only after `unlink`.

use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;
use std::error;

use hashbrown::HashSet;
use log::trace;

pub(crate) type NodePtr<T> = NonNull<RingNode<T>>;

pub(crate) struct RingNode<T> {
    object: NonNull<T>,
    // Rewritten through shared references by whichever member splices the ring.
    next: Cell<Option<NodePtr<T>>>,
}

impl<T> RingNode<T> {
    /// Allocates an unlinked node carrying `object`.
    pub(crate) fn alloc(object: NonNull<T>) -> NodePtr<T> {
        let node = Box::new(RingNode {
            object,
            next: Cell::new(None),
        });
        NonNull::from(Box::leak(node))
    }

    #[inline]
    pub(crate) fn object(&self) -> NonNull<T> {
        self.object
    }

    /// True if at least one other node shares this node's object.
    #[inline]
    pub(crate) fn is_linked(&self) -> bool {
        self.next.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn next(&self) -> Option<NodePtr<T>> {
        self.next.get()
    }
}

/// Result of taking a node out of its ring.
pub(crate) enum Unlinked<T> {
    /// The node was the sole owner; nobody owns the object any more.
    Last,
    /// Other owners remain. Carries the node that followed the removed one.
    Shared(NodePtr<T>),
}

/// Frees an unlinked node and returns the object pointer it carried.
///
/// # Safety
///
/// `node` must come from [`RingNode::alloc`], must not be part of a ring and
/// must not be used afterwards.
pub(crate) unsafe fn free<T>(node: NodePtr<T>) -> NonNull<T> {
    // SAFETY: the caller guarantees the node came from `Box::leak` and is
    // no longer reachable from any ring.
    let boxed = unsafe { Box::from_raw(node.as_ptr()) };
    debug_assert!(!boxed.is_linked(), "freeing a node still linked into a ring");
    boxed.object
}

/// Finds the member whose link points at `node`, walking from `first`.
///
/// # Safety
///
/// `node` and `first` must be members of the same well-formed ring.
unsafe fn predecessor<T>(node: NodePtr<T>, first: NodePtr<T>) -> NodePtr<T> {
    let mut it = first;
    loop {
        match unsafe { it.as_ref() }.next.get() {
            Some(next) if next == node => return it,
            Some(next) => it = next,
            None => unreachable!("open chain in ownership ring"),
        }
    }
}

/// Splices the unlinked node `new` into the ring of `src`, immediately
/// before `src` in traversal order.
///
/// # Safety
///
/// Both nodes must be live. `src` must be a sole owner or a member of a
/// well-formed ring; `new` must be unlinked and carry the same object.
pub(crate) unsafe fn join<T>(src: NodePtr<T>, new: NodePtr<T>) {
    // SAFETY: both nodes are live per the caller's contract and only ever
    // accessed through shared references.
    let (src_ref, new_ref) = unsafe { (src.as_ref(), new.as_ref()) };
    debug_assert!(!new_ref.is_linked());
    debug_assert_eq!(src_ref.object, new_ref.object);

    match src_ref.next.get() {
        None => {
            new_ref.next.set(Some(src));
            src_ref.next.set(Some(new));
        }
        Some(first) => {
            let pred = unsafe { predecessor(src, first) };
            new_ref.next.set(Some(src));
            unsafe { pred.as_ref() }.next.set(Some(new));
        }
    }
    trace!("ring join: {:p} spliced before {:p}", new, src);
}

/// Takes `node` out of its ring and repairs the ring around it.
///
/// A two-member ring collapses to a sole owner with an empty link. The
/// object is never touched.
///
/// # Safety
///
/// `node` must be live and either unlinked or a member of a well-formed ring.
pub(crate) unsafe fn unlink<T>(node: NodePtr<T>) -> Unlinked<T> {
    let node_ref = unsafe { node.as_ref() };
    let Some(next) = node_ref.next.take() else {
        return Unlinked::Last;
    };

    let pred = unsafe { predecessor(node, next) };
    let pred_ref = unsafe { pred.as_ref() };
    if pred == next {
        pred_ref.next.set(None);
        trace!("ring unlink: {:p} left, {:p} is now sole owner", node, pred);
    } else {
        pred_ref.next.set(Some(next));
        trace!("ring unlink: {:p} left, {:p} now links to {:p}", node, pred, next);
    }
    Unlinked::Shared(next)
}

/// Number of members in the ring containing `node` (1 for a sole owner).
///
/// # Safety
///
/// `node` must be live and part of a well-formed ring or unlinked.
pub(crate) unsafe fn ring_len<T>(node: NodePtr<T>) -> usize {
    let mut len = 1;
    let mut it = node;
    while let Some(next) = unsafe { it.as_ref() }.next.get() {
        if next == node {
            break;
        }
        len += 1;
        it = next;
    }
    len
}

/// True if `other` is reachable from `node` by following links.
///
/// # Safety
///
/// Same as [`ring_len`].
pub(crate) unsafe fn contains<T>(node: NodePtr<T>, other: NodePtr<T>) -> bool {
    if node == other {
        return true;
    }
    let mut it = node;
    while let Some(next) = unsafe { it.as_ref() }.next.get() {
        if next == node {
            return false;
        }
        if next == other {
            return true;
        }
        it = next;
    }
    false
}

/// A topology violation found by [`audit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RingError {
    /// A node links to itself instead of having an empty link.
    SelfLoop,
    /// Following links ran into an empty link before getting back.
    OpenChain { members: usize },
    /// Following links entered a cycle that does not pass through the start.
    Lasso { members: usize },
    /// The member at `position` (counted from the start) carries a
    /// different object pointer.
    ObjectMismatch { position: usize },
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::SelfLoop => write!(f, "ring node links to itself"),
            RingError::OpenChain { members } => {
                write!(f, "ring is open after {members} members")
            }
            RingError::Lasso { members } => {
                write!(f, "ring loops back past its start after {members} members")
            }
            RingError::ObjectMismatch { position } => {
                write!(f, "ring member {position} owns a different object")
            }
        }
    }
}

impl error::Error for RingError {}

/// Walks the ring from `start` and checks every invariant of the linkage.
///
/// Returns the number of members on success.
///
/// # Safety
///
/// Every node reachable from `start` must still be allocated. On a
/// well-formed ring this holds for any live handle.
pub(crate) unsafe fn audit<T>(start: NodePtr<T>) -> Result<usize, RingError> {
    let start_ref = unsafe { start.as_ref() };
    let Some(mut it) = start_ref.next.get() else {
        return Ok(1);
    };
    if it == start {
        return Err(RingError::SelfLoop);
    }

    let mut seen: HashSet<NodePtr<T>> = HashSet::new();
    seen.insert(start);
    loop {
        if !seen.insert(it) {
            return Err(RingError::Lasso {
                members: seen.len(),
            });
        }
        let it_ref = unsafe { it.as_ref() };
        if it_ref.object != start_ref.object {
            return Err(RingError::ObjectMismatch {
                position: seen.len() - 1,
            });
        }
        match it_ref.next.get() {
            Some(next) if next == start => return Ok(seen.len()),
            Some(next) => it = next,
            None => {
                return Err(RingError::OpenChain {
                    members: seen.len(),
                })
            }
        }
    }
}

/// Audits the ring around `node` and panics if it is corrupted.
///
/// # Safety
///
/// Same as [`audit`].
#[cfg(feature = "ring_audit")]
pub(crate) unsafe fn assert_well_formed<T>(node: NodePtr<T>) {
    if let Err(err) = unsafe { audit(node) } {
        log::error!("ownership ring at {:p} is corrupted: {}", node, err);
        panic!("ownership ring corrupted: {err}");
    }
}

#[cfg(not(feature = "ring_audit"))]
#[inline(always)]
pub(crate) unsafe fn assert_well_formed<T>(_node: NodePtr<T>) {}
