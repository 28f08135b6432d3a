//! Owner tallies for `CountedPtr`.
//!
//! Each `CountedPtr` box carries one `OwnerCount`. Every live handle holds
//! exactly one `OwnerToken` acquired from that count, and the token only goes
//! away by being handed back through `OwnerCount::release`. Dropping a token
//! panics, so a handle that forgets to release is caught instead of leaking.

use core::cell::Cell;
use core::mem;
use core::ptr::{self, NonNull};

/// Proof that one handle co-owns the box whose count minted it.
pub(crate) struct OwnerToken {
    origin: NonNull<OwnerCount>,
}

impl Drop for OwnerToken {
    fn drop(&mut self) {
        panic!("owner token dropped without OwnerCount::release");
    }
}

/// Single-threaded count of outstanding owner tokens.
///
/// Must not move while tokens are outstanding; it lives inside a heap box
/// that is only freed after the last release.
#[derive(Debug)]
pub(crate) struct OwnerCount {
    owners: Cell<usize>,
}

impl OwnerCount {
    pub(crate) const fn new() -> Self {
        Self {
            owners: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn owners(&self) -> usize {
        self.owners.get()
    }

    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.owners.get() == 1
    }

    /// Registers one more owner.
    #[inline]
    pub(crate) fn acquire(&self) -> OwnerToken {
        let n = self.owners.get().wrapping_add(1);
        if n == 0 {
            // Same as Rc: aborting beats wrapping into a use-after-free.
            std::process::abort();
        }
        self.owners.set(n);
        OwnerToken {
            origin: NonNull::from(self),
        }
    }

    /// Takes back a token. Returns true if that was the last owner.
    #[inline]
    pub(crate) fn release(&self, token: OwnerToken) -> bool {
        let origin = token.origin;
        mem::forget(token);
        debug_assert!(
            ptr::eq(origin.as_ptr(), self),
            "owner token released to a different count"
        );
        let c = self.owners.get();
        assert!(c > 0, "owner count underflow");
        self.owners.set(c - 1);
        c == 1
    }
}
