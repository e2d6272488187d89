//! paged-tables: two single-threaded containers with stable addressing.
//!
//! Internal Design:
//!
//! Summary
//! - `PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>`: a slot
//!   map whose storage is a chain of fixed-size pages. Inserts return a
//!   generation-checked [`Handle`]; values never move while they are live.
//! - `MphBase<E, N, X, H, Q>`: a minimal perfect hash table over exactly `N`
//!   entries fixed at construction, with [`MphSet`] and [`MphMap`] on top.
//!
//! Layers (slot map)
//! - `Handle`: index and generation packed into `TOTAL_BITS` bits; the
//!   all-ones index is null.
//! - `Page<T>`: `PAGE_SIZE` slots plus a skip field. Free slots form runs
//!   whose first and last skip entries hold the run length, so iteration
//!   jumps over a run in one step. Runs are chained into a per-page free
//!   list; erasure merges a freed slot with neighbouring runs.
//! - `PageAllocator`: where page buffers come from and go back to.
//! - `PagedSlotMap`: owns the pages, chains live pages in a doubly-linked
//!   list, and keeps emptied pages on a free list for reuse.
//!
//! Layers (perfect hashing)
//! - Policies: [`SaltedHash`] (a salted hash family), [`KeyEqual`] (key
//!   comparison), and [`KeyOf`] (key extraction from an entry).
//! - `MphBase`: bucket/salt construction and single-probe lookup.
//! - `MphSet`, `MphMap`: façades fixing `KeyOf` to the value itself or to
//!   the first half of a pair.
//!
//! Constraints
//! - Single-threaded; neither container synchronizes.
//! - Slot map: O(1) insert, erase, and lookup. Only the tail page takes
//!   new elements; holes in other pages are reused once their page empties
//!   and is recycled.
//! - Slot map inserts fail with [`CapacityError`] instead of handing out an
//!   index that the handle layout cannot represent. A failed insert leaves
//!   the map unchanged.
//! - Perfect hash tables are immutable after construction apart from
//!   `MphMap` values. Keys must be distinct.
//!
//! Handle semantics
//! - A handle is valid while the entry it was returned for is live.
//! - Each erase advances the slot's generation, modulo
//!   `2^GENERATION_BITS`. A stale handle can match again only after that
//!   many reuses of the same slot.
//!
//! Notes and non-goals
//! - No thread-safe variants and no serialization of either container.
//! - Perfect hash tables can be built at run time with `new`, or placed in
//!   a `const` via `from_raw_parts` using the storage and salts of a table
//!   built earlier.

pub mod handle;
mod page;
pub mod page_alloc;
pub mod paged_slot_map;
mod paged_slot_map_proptest;

pub mod mph;
pub mod mph_map;
pub mod mph_set;

// Public surface
pub use handle::Handle;
pub use mph::{
    DefaultKeyEqual, First, Identity, KeyEqual, KeyOf, MphBase, RapidSaltedHash, SaltedHash,
    PRIMARY_SALT,
};
pub use mph_map::MphMap;
pub use mph_set::MphSet;
pub use page_alloc::{Global, PageAllocator};
pub use paged_slot_map::{CapacityError, PagedSlotMap};
