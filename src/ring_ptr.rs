//! `RingPtr<T>`: shared ownership without a reference count.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use log::trace;

use crate::owner::{Detached, SharedOwner};
use crate::ring::{self, NodePtr, RingError, RingNode, Unlinked};
use crate::slot::RefSlot;

/// An owning pointer whose co-owners are chained into a ring.
///
/// Cloning a `RingPtr` splices the clone into the ring right before the
/// source; dropping one splices it back out. The object is destroyed when
/// the last member leaves. There is no counter anywhere: the ring itself is
/// the ownership record.
///
/// Cloning from a sole owner and dropping a sole owner are O(1). Cloning
/// from, releasing or detaching a member of an n-ring walks the ring once
/// to find the predecessor and is O(n).
///
/// `RingPtr` is `!Send` and `!Sync`. Any member of a ring may rewrite the
/// link of any other member, so linked handles must stay on one thread.
pub struct RingPtr<T> {
    node: Option<NodePtr<T>>,
    // Owns a `T` for drop-check purposes. The `Cell` link inside `RingNode`
    // makes `RingPtr<T>` invariant in `T`, unlike `Rc<T>`.
    _owns: PhantomData<T>,
    _nosend: PhantomData<*mut ()>,
}

impl<T> RingPtr<T> {
    /// Creates a handle that owns nothing. Does not allocate.
    pub const fn empty() -> Self {
        Self {
            node: None,
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Becomes the sole owner of `boxed`.
    pub fn from_box(boxed: Box<T>) -> Self {
        let mut this = Self::empty();
        this.adopt(boxed);
        this
    }

    /// Becomes the sole owner of a raw object pointer. A null pointer gives
    /// an empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`], and nothing else
    /// may own it, including another `RingPtr`.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            // SAFETY: the caller hands over unique ownership of a boxed `T`.
            Some(p) => Self::from_box(unsafe { Box::from_raw(p.as_ptr()) }),
            None => Self::empty(),
        }
    }

    #[inline]
    fn node(&self) -> Option<&RingNode<T>> {
        // SAFETY: a handle's node lives until the handle releases it.
        self.node.map(|n| unsafe { n.as_ref() })
    }

    /// Takes sole ownership of `boxed`. `self` must be empty.
    pub(crate) fn adopt(&mut self, boxed: Box<T>) {
        debug_assert!(self.node.is_none());
        let node = RingNode::alloc(NonNull::from(Box::leak(boxed)));
        trace!("ring adopt: {:p} is sole owner", node);
        self.node = Some(node);
    }

    /// Allocates a node for a new co-owner and splices it before `self`.
    fn join_new(&self) -> Option<NodePtr<T>> {
        let src = self.node?;
        // SAFETY: `src` is this handle's live node.
        let new = RingNode::alloc(unsafe { src.as_ref() }.object());
        unsafe {
            ring::join(src, new);
            ring::assert_well_formed(new);
        }
        Some(new)
    }

    /// Unlinks and frees this handle's node, leaving `self` empty.
    ///
    /// Returns the object pointer and whether this handle was its last owner.
    fn leave(&mut self) -> Option<(NonNull<T>, bool)> {
        let node = self.node.take()?;
        // SAFETY: `node` belonged to this handle and is part of a
        // well-formed ring or unlinked; after `unlink` nothing refers to it.
        let unlinked = unsafe { ring::unlink(node) };
        let object = unsafe { ring::free(node) };
        match unlinked {
            Unlinked::Last => Some((object, true)),
            Unlinked::Shared(survivor) => {
                unsafe { ring::assert_well_formed(survivor) };
                Some((object, false))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// True if this handle owns an object that no other handle shares.
    pub fn is_sole_owner(&self) -> bool {
        self.node().is_some_and(|n| !n.is_linked())
    }

    /// Number of handles in this handle's ring; 0 if empty.
    pub fn owner_count(&self) -> usize {
        match self.node {
            // SAFETY: live node of a well-formed ring.
            Some(node) => unsafe { ring::ring_len(node) },
            None => 0,
        }
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: the object outlives every member of its ring, including
        // `self` for the duration of the borrow. No `&mut T` exists while
        // the object is shared, see `get_mut`.
        self.node().map(|n| unsafe { n.object().as_ref() })
    }

    /// Mutable access, only while this handle is the sole owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self.node() {
            // SAFETY: no other handle can reach the object and `&mut self`
            // excludes other borrows through this one.
            Some(n) if !n.is_linked() => Some(unsafe { &mut *n.object().as_ptr() }),
            _ => None,
        }
    }

    /// Raw pointer to the object, or null if empty. Ownership is unchanged.
    pub fn as_ptr(&self) -> *const T {
        self.node()
            .map_or(ptr::null(), |n| n.object().as_ptr() as *const T)
    }

    /// True if both handles point at the same address, or both are empty.
    ///
    /// Every boxed zero-sized value lives at the same dangling address, so
    /// for a zero-sized `T` this says nothing about ownership. Use
    /// [`shares_ring`](Self::shares_ring) to ask whether two handles co-own.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        ptr::eq(this.as_ptr(), other.as_ptr())
    }

    /// True if both handles are empty or members of one ring.
    ///
    /// Distinct sized objects never share an address, so for those the
    /// address check settles it without a walk.
    fn co_owns(&self, other: &Self) -> bool {
        match (self.node, other.node) {
            (None, None) => true,
            // SAFETY: both are live nodes of well-formed rings.
            (Some(a), Some(b)) if mem::size_of::<T>() == 0 => unsafe { ring::contains(a, b) },
            (Some(_), Some(_)) => Self::ptr_eq(self, other),
            _ => false,
        }
    }

    /// True if `other` is a member of this handle's ring. Walks the ring.
    pub fn shares_ring(&self, other: &Self) -> bool {
        match (self.node, other.node) {
            // SAFETY: both are live nodes of well-formed rings.
            (Some(a), Some(b)) => unsafe { ring::contains(a, b) },
            _ => false,
        }
    }

    /// Makes `self` a co-owner of `src`'s object.
    ///
    /// If both handles already share a ring (or are both empty) nothing
    /// happens. Otherwise current ownership is released first, which may
    /// destroy the previous object.
    pub fn assign(&mut self, src: &Self) {
        if self.co_owns(src) {
            return;
        }
        self.release();
        self.node = src.join_new();
    }

    /// Releases current ownership and becomes the sole owner of `boxed`.
    pub fn reset(&mut self, boxed: Box<T>) {
        self.release();
        self.adopt(boxed);
    }

    /// Leaves the ring. Destroys the object if this was its last owner.
    ///
    /// Releasing an empty handle does nothing.
    pub fn release(&mut self) {
        if let Some((object, true)) = self.leave() {
            // SAFETY: the object came from a `Box` and this was its last
            // owner. The node is unlinked and freed before the destructor runs.
            drop(unsafe { Box::from_raw(object.as_ptr()) });
        }
    }

    /// Leaves the ring without ever destroying the object.
    ///
    /// The last owner hands the object to the caller as a `Box`. A handle
    /// that still had co-owners only hands out a non-owning pointer.
    pub fn detach(&mut self) -> Detached<T> {
        match self.leave() {
            // SAFETY: the object came from a `Box` and nobody else owns it.
            Some((object, true)) => Detached::Unique(unsafe { Box::from_raw(object.as_ptr()) }),
            Some((object, false)) => Detached::Shared(object),
            None => Detached::Empty,
        }
    }

    /// Releases current ownership and exposes the handle's storage for an
    /// outside routine to fill in.
    ///
    /// Whatever the routine leaves in the slot is adopted as sole-owned
    /// when the returned guard is dropped; an untouched slot leaves the
    /// handle empty. No ring joining happens here.
    ///
    /// ```
    /// use ring_ptr::RingPtr;
    ///
    /// fn load(slot: &mut Option<Box<String>>) {
    ///     *slot = Some(Box::new("loaded".to_string()));
    /// }
    ///
    /// let mut p = RingPtr::new("old".to_string());
    /// load(&mut p.refptr());
    /// assert_eq!(p.get().map(String::as_str), Some("loaded"));
    /// assert!(p.is_sole_owner());
    /// ```
    pub fn refptr(&mut self) -> RefSlot<'_, T> {
        self.release();
        RefSlot::new(self)
    }

    /// Checks the ring this handle belongs to and returns its size.
    ///
    /// An empty handle reports `Ok(0)` and a sole owner `Ok(1)`.
    pub fn check_ring(&self) -> Result<usize, RingError> {
        match self.node {
            // SAFETY: every member of the ring of a live handle is live.
            Some(node) => unsafe { ring::audit(node) },
            None => Ok(0),
        }
    }
}

impl<T> Drop for RingPtr<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Clone for RingPtr<T> {
    /// Joins `self`'s ring. The source's link is rewritten through `&self`.
    fn clone(&self) -> Self {
        Self {
            node: self.join_new(),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Default for RingPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for RingPtr<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Box<T>> for RingPtr<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T> Deref for RingPtr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => empty_deref(),
        }
    }
}

#[cold]
#[inline(never)]
fn empty_deref() -> ! {
    panic!("dereferenced an empty RingPtr")
}

impl<T: fmt::Debug> fmt::Debug for RingPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("RingPtr").field(value).finish(),
            None => f.write_str("RingPtr(<empty>)"),
        }
    }
}

impl<T> fmt::Pointer for RingPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T> SharedOwner<T> for RingPtr<T> {
    fn from_box(boxed: Box<T>) -> Self {
        RingPtr::from_box(boxed)
    }

    fn get(&self) -> Option<&T> {
        RingPtr::get(self)
    }

    fn as_ptr(&self) -> *const T {
        RingPtr::as_ptr(self)
    }

    fn owner_count(&self) -> usize {
        RingPtr::owner_count(self)
    }

    fn assign(&mut self, src: &Self) {
        RingPtr::assign(self, src)
    }

    fn reset(&mut self, boxed: Box<T>) {
        RingPtr::reset(self, boxed)
    }

    fn release(&mut self) {
        RingPtr::release(self)
    }

    fn detach(&mut self) -> Detached<T> {
        RingPtr::detach(self)
    }
}
