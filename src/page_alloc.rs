//! PageAllocator: where a paged slot map gets its page storage from.
//!
//! A page is two buffers: `PAGE_SIZE` slots and `PAGE_SIZE + 1` skip-field
//! entries. The map asks its allocator for both when it needs a fresh page
//! and hands them back when it is dropped. Pages emptied during normal use
//! are kept by the map for reuse and are not returned early.
//!
//! Constructing and destroying elements is not part of this interface: a
//! slot is an enum, so placing a value is an assignment into storage the
//! allocator already produced.

/// Source of page storage.
///
/// `allocate` must return an empty vector with capacity of at least
/// `capacity`. The map never grows a page beyond the capacity it asked for,
/// so the buffer is never reallocated and element addresses stay put.
pub trait PageAllocator {
    fn allocate<S>(&mut self, capacity: usize) -> Vec<S>;

    /// Take back storage previously produced by `allocate`. Any elements
    /// still in `storage` are dropped here.
    fn deallocate<S>(&mut self, storage: Vec<S>);
}

/// The global heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

impl PageAllocator for Global {
    #[inline]
    fn allocate<S>(&mut self, capacity: usize) -> Vec<S> {
        Vec::with_capacity(capacity)
    }

    #[inline]
    fn deallocate<S>(&mut self, storage: Vec<S>) {
        drop(storage);
    }
}
