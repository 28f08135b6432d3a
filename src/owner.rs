//! The surface shared by every ownership strategy in this crate.

use core::ptr::{self, NonNull};

/// What a handle gave up when it was detached.
#[derive(Debug)]
pub enum Detached<T> {
    /// The handle owned nothing.
    Empty,
    /// The handle was the last owner; the object now belongs to the caller.
    Unique(Box<T>),
    /// Other owners remain and keep the object alive. The pointer does not
    /// own the object and is only valid while one of them does.
    Shared(NonNull<T>),
}

impl<T> Detached<T> {
    /// Returns the owned object, if the detached handle was its last owner.
    pub fn into_box(self) -> Option<Box<T>> {
        match self {
            Detached::Unique(boxed) => Some(boxed),
            Detached::Empty | Detached::Shared(_) => None,
        }
    }

    /// Raw pointer to the object, or null if the handle was empty.
    pub fn as_ptr(&self) -> *const T {
        match self {
            Detached::Empty => ptr::null(),
            Detached::Unique(boxed) => &**boxed as *const T,
            Detached::Shared(p) => p.as_ptr(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Detached::Empty)
    }
}

/// A value-semantic owning pointer to a `T` that may be shared with other
/// handles of the same kind.
///
/// Code storing handles as plain fields (for example records walked by a
/// serializer) can be generic over this trait: cloning duplicates ownership,
/// dropping releases it, and nothing needs to call retain/release by hand.
pub trait SharedOwner<T>: Clone + Default {
    /// Becomes the sole owner of `boxed`.
    fn from_box(boxed: Box<T>) -> Self;

    fn get(&self) -> Option<&T>;

    /// Raw pointer to the object, or null if empty. Ownership is unchanged.
    fn as_ptr(&self) -> *const T;

    /// Number of handles owning the same object; 0 if empty.
    fn owner_count(&self) -> usize;

    /// Makes `self` share `src`'s object. A no-op if both already share it.
    fn assign(&mut self, src: &Self);

    /// Drops current ownership and becomes sole owner of `boxed`.
    fn reset(&mut self, boxed: Box<T>);

    /// Drops current ownership, destroying the object if this was its last owner.
    fn release(&mut self);

    /// Gives up ownership without ever destroying the object.
    fn detach(&mut self) -> Detached<T>;
}
