//! ring-ptr: a single-threaded shared-ownership pointer whose owners are
//! linked into a ring instead of being counted.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let several handles jointly own one heap object without a
//!   reference-count field anywhere. The handles themselves form the
//!   ownership record: a circular chain in which every member points at
//!   the same object.
//! - Layers:
//!   - `ring`: the raw linkage. Allocates per-handle ring nodes, finds
//!     predecessors, splices nodes in and out, audits topology. This is
//!     the only module that follows or rewrites links.
//!   - `RingPtr<T>`: public handle built on `ring`. Clone joins, drop
//!     releases, `detach` leaves without destroying, `refptr` exposes the
//!     storage slot.
//!   - `CountedPtr<T>`: the conventional counted pointer with the same
//!     surface, built on the owner tokens in `tokens`.
//!   - `SharedOwner<T>`: the trait both handles implement.
//!
//! Ring representation
//! - Rust values move, so a ring cannot link handles by their own address.
//!   Each non-empty handle owns a two-word heap node (`object`, `next`)
//!   whose address is stable; the ring links nodes. An empty handle has no
//!   node and does not allocate.
//! - A sole owner has an empty link. A two-member ring that loses a member
//!   collapses back to a sole owner, never to a self-loop.
//! - Clone inserts the new node immediately before its source. The
//!   source's link is rewritten through `&self` (links are `Cell`s).
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (no atomics, no locks).
//! - Clone from a sole owner and release of a sole owner are O(1); clone
//!   from, release or detach of a ring member is O(ring size).
//! - The object is destroyed exactly once, after the releasing handle is
//!   already unlinked and empty.
//!
//! Hazards and how they are handled
//! - Assigning a handle from a member of its own ring is a no-op; literal
//!   self-assignment does not pass the borrow checker.
//! - `refptr` slots only accept an owned `Box<T>`, so they cannot be filled
//!   with an object another handle already owns. Raw adoption goes through
//!   the `unsafe` `RingPtr::from_raw`.
//! - `detach` on a handle that still has co-owners returns a non-owning
//!   pointer (`Detached::Shared`); only the last owner hands out a `Box`.
//! - Dereferencing an empty handle panics.
//!
//! Features
//! - `ring_audit`: audit the affected ring after every splice and panic on
//!   corruption. Costs O(ring size) per splice.
//!
//! Handles never cross threads:
//!
//! ```compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<ring_ptr::RingPtr<u32>>();
//! ```
//!
//! ```compile_fail
//! fn assert_sync<T: Sync>() {}
//! assert_sync::<ring_ptr::CountedPtr<u32>>();
//! ```
//!
//! `RingPtr<T>` is invariant in `T` because ring links live in a `Cell`,
//! so unlike `Rc` it does not shorten lifetimes in `T`:
//!
//! ```compile_fail
//! use ring_ptr::RingPtr;
//!
//! fn shorten<'a>(p: RingPtr<&'static str>) -> RingPtr<&'a str> {
//!     p
//! }
//! ```
//!
//! # Examples
//!
//! ```
//! use ring_ptr::RingPtr;
//!
//! let a = RingPtr::new(String::from("shared"));
//! let b = a.clone();
//! let c = b.clone();
//! assert_eq!(a.owner_count(), 3);
//! assert!(RingPtr::ptr_eq(&a, &c));
//!
//! drop(a);
//! drop(b);
//! assert!(c.is_sole_owner());
//! assert_eq!(*c, "shared");
//! ```

mod counted_ptr;
mod owner;
mod ring;
mod ring_proptest;
mod ring_ptr;
mod slot;
mod tokens;

// Public surface
pub use counted_ptr::CountedPtr;
pub use owner::{Detached, SharedOwner};
pub use ring::RingError;
pub use ring_ptr::RingPtr;
pub use slot::RefSlot;
