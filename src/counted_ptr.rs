//! CountedPtr: the conventional counted alternative to `RingPtr`.
//!
//! Same surface, but owners are tallied in an `OwnerCount` stored next to
//! the value. Each live handle carries one owner token acquired from that
//! count and hands it back on release.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::owner::{Detached, SharedOwner};
use crate::tokens::{OwnerCount, OwnerToken};

struct CountedBox<T> {
    count: OwnerCount,
    value: T,
}

struct Held<T> {
    inner: NonNull<CountedBox<T>>,
    token: OwnerToken, // handed back by release()
}

/// A single-threaded reference-counted owning pointer.
///
/// Offered next to [`RingPtr`](crate::RingPtr) for callers that prefer an
/// O(1) clone and release at the price of a counter field on the heap.
pub struct CountedPtr<T> {
    held: Option<Held<T>>,
    _owns: PhantomData<T>,
    _nosend: PhantomData<*mut ()>,
}

impl<T> CountedPtr<T> {
    pub const fn empty() -> Self {
        Self {
            held: None,
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    pub fn new(value: T) -> Self {
        let inner = NonNull::from(Box::leak(Box::new(CountedBox {
            count: OwnerCount::new(),
            value,
        })));
        Self::mint(inner)
    }

    pub fn from_box(boxed: Box<T>) -> Self {
        Self::new(*boxed)
    }

    fn mint(inner: NonNull<CountedBox<T>>) -> Self {
        // SAFETY: the box stays allocated while any token is outstanding.
        let token = unsafe { inner.as_ref() }.count.acquire();
        Self {
            held: Some(Held { inner, token }),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    #[inline]
    fn inner(&self) -> Option<&CountedBox<T>> {
        // SAFETY: this handle's token keeps the box alive.
        self.held.as_ref().map(|h| unsafe { h.inner.as_ref() })
    }

    /// Returns this handle's token. Yields the box pointer and whether this
    /// was the last owner.
    fn leave(&mut self) -> Option<(NonNull<CountedBox<T>>, bool)> {
        let Held { inner, token } = self.held.take()?;
        // SAFETY: the box is alive until the last token comes back.
        let last = unsafe { inner.as_ref() }.count.release(token);
        Some((inner, last))
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_none()
    }

    pub fn owner_count(&self) -> usize {
        self.inner().map_or(0, |i| i.count.owners())
    }

    pub fn get(&self) -> Option<&T> {
        self.inner().map(|i| &i.value)
    }

    /// Mutable access, only while this handle is the sole owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match &self.held {
            // SAFETY: a count of one means no other handle can reach the box.
            Some(h) if unsafe { h.inner.as_ref() }.count.is_unique() => {
                Some(unsafe { &mut (*h.inner.as_ptr()).value })
            }
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> *const T {
        self.inner().map_or(ptr::null(), |i| &i.value as *const T)
    }

    /// True if both handles own the same object, or both are empty.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        ptr::eq(this.as_ptr(), other.as_ptr())
    }

    /// Makes `self` a co-owner of `src`'s object; a no-op if it already is.
    pub fn assign(&mut self, src: &Self) {
        if Self::ptr_eq(self, src) {
            return;
        }
        self.release();
        *self = src.clone();
    }

    pub fn reset(&mut self, boxed: Box<T>) {
        self.release();
        *self = Self::from_box(boxed);
    }

    pub fn release(&mut self) {
        if let Some((inner, true)) = self.leave() {
            // SAFETY: the last token is back; nobody else refers to the box.
            drop(unsafe { Box::from_raw(inner.as_ptr()) });
        }
    }

    pub fn detach(&mut self) -> Detached<T> {
        match self.leave() {
            Some((inner, true)) => {
                // SAFETY: the last token is back; the box is ours to take apart.
                let CountedBox { value, .. } = *unsafe { Box::from_raw(inner.as_ptr()) };
                Detached::Unique(Box::new(value))
            }
            Some((inner, false)) => {
                // SAFETY: other owners keep the box alive.
                let value = unsafe { ptr::addr_of_mut!((*inner.as_ptr()).value) };
                Detached::Shared(unsafe { NonNull::new_unchecked(value) })
            }
            None => Detached::Empty,
        }
    }
}

impl<T> Drop for CountedPtr<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Clone for CountedPtr<T> {
    fn clone(&self) -> Self {
        match &self.held {
            Some(h) => Self::mint(h.inner),
            None => Self::empty(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Default for CountedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for CountedPtr<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Deref for CountedPtr<T> {
    type Target = T;

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
    panic!("dereferenced an empty CountedPtr")
}

impl<T: fmt::Debug> fmt::Debug for CountedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("CountedPtr").field(value).finish(),
            None => f.write_str("CountedPtr(<empty>)"),
        }
    }
}

impl<T> SharedOwner<T> for CountedPtr<T> {
    fn from_box(boxed: Box<T>) -> Self {
        CountedPtr::from_box(boxed)
    }

    fn get(&self) -> Option<&T> {
        CountedPtr::get(self)
    }

    fn as_ptr(&self) -> *const T {
        CountedPtr::as_ptr(self)
    }

    fn owner_count(&self) -> usize {
        CountedPtr::owner_count(self)
    }

    fn assign(&mut self, src: &Self) {
        CountedPtr::assign(self, src)
    }

    fn reset(&mut self, boxed: Box<T>) {
        CountedPtr::reset(self, boxed)
    }

    fn release(&mut self) {
        CountedPtr::release(self)
    }

    fn detach(&mut self) -> Detached<T> {
        CountedPtr::detach(self)
    }
}
