//! Reference-slot guard handed out by [`RingPtr::refptr`].

use core::ops::{Deref, DerefMut};

use crate::RingPtr;

/// Writable storage of an emptied [`RingPtr`].
///
/// Dereferences to `Option<Box<T>>`. When the guard is dropped the handle
/// becomes the sole owner of whatever the slot holds; an empty slot leaves
/// the handle empty. The slot only accepts an owned `Box<T>`, so it cannot
/// be filled with an object that some other handle already owns.
pub struct RefSlot<'a, T> {
    owner: &'a mut RingPtr<T>,
    slot: Option<Box<T>>,
}

impl<'a, T> RefSlot<'a, T> {
    /// `owner` must already be released.
    pub(crate) fn new(owner: &'a mut RingPtr<T>) -> Self {
        debug_assert!(owner.is_empty());
        Self { owner, slot: None }
    }
}

impl<'a, T> Deref for RefSlot<'a, T> {
    type Target = Option<Box<T>>;

    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

impl<'a, T> DerefMut for RefSlot<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slot
    }
}

impl<'a, T> Drop for RefSlot<'a, T> {
    fn drop(&mut self) {
        if let Some(boxed) = self.slot.take() {
            self.owner.adopt(boxed);
        }
    }
}
