//! Handle: a generation-checked slot index packed into one integer.
//!
//! Layout is `(generation << INDEX_BITS) | index`, stored in the low
//! `TOTAL_BITS` bits of a `u64`. The all-ones index is reserved as the null
//! sentinel, so a handle space of `INDEX_BITS` bits addresses
//! `2^INDEX_BITS - 1` slots.

use core::fmt;

/// Opaque reference to an entry of a [`PagedSlotMap`](crate::PagedSlotMap).
///
/// Handles are plain values: copy them freely, compare and order them by
/// their packed bits. A handle stays valid until the entry it names is
/// erased; after that every copy of it is rejected by the map, until the
/// slot's generation wraps around after `2^GENERATION_BITS` reuses.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle<const TOTAL_BITS: u32 = 32, const GENERATION_BITS: u32 = 8> {
    raw: u64,
}

impl<const TOTAL_BITS: u32, const GENERATION_BITS: u32> Handle<TOTAL_BITS, GENERATION_BITS> {
    pub(crate) const LAYOUT_OK: () = assert!(
        GENERATION_BITS > 0 && GENERATION_BITS < TOTAL_BITS && TOTAL_BITS <= 64,
        "handle layout requires 0 < GENERATION_BITS < TOTAL_BITS <= 64"
    );

    /// Number of low bits holding the slot index.
    pub const INDEX_BITS: u32 = TOTAL_BITS - GENERATION_BITS;

    const INDEX_MASK: u64 = u64::MAX >> (64 - Self::INDEX_BITS);
    pub(crate) const GENERATION_MASK: u64 = u64::MAX >> (64 - GENERATION_BITS);

    /// Index reserved for the null handle (all index bits set).
    pub const NULL_INDEX: u64 = Self::INDEX_MASK;

    /// Largest index a live handle can carry.
    pub const MAX_INDEX: u64 = Self::NULL_INDEX - 1;

    /// Pack an index and a generation. Bits beyond the respective widths are
    /// discarded.
    #[inline]
    pub const fn new(index: u64, generation: u64) -> Self {
        let () = Self::LAYOUT_OK;
        Self {
            raw: ((generation & Self::GENERATION_MASK) << Self::INDEX_BITS)
                | (index & Self::INDEX_MASK),
        }
    }

    /// The null handle; never valid in any map.
    #[inline]
    pub const fn null() -> Self {
        Self::new(Self::NULL_INDEX, 0)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.index() == Self::NULL_INDEX
    }

    #[inline]
    pub const fn index(&self) -> u64 {
        self.raw & Self::INDEX_MASK
    }

    #[inline]
    pub const fn generation(&self) -> u64 {
        (self.raw >> Self::INDEX_BITS) & Self::GENERATION_MASK
    }

    /// The packed representation, suitable for storing outside the map.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.raw
    }

    /// Rebuild a handle from [`Handle::to_raw`]. Bits above `TOTAL_BITS` are
    /// dropped.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self::new(raw & Self::INDEX_MASK, raw >> Self::INDEX_BITS)
    }

    /// Next generation value, wrapping inside `GENERATION_BITS`.
    #[inline]
    pub(crate) const fn next_generation(generation: u64) -> u64 {
        generation.wrapping_add(1) & Self::GENERATION_MASK
    }
}

impl<const TOTAL_BITS: u32, const GENERATION_BITS: u32> Default
    for Handle<TOTAL_BITS, GENERATION_BITS>
{
    fn default() -> Self {
        Self::null()
    }
}

impl<const TOTAL_BITS: u32, const GENERATION_BITS: u32> fmt::Debug
    for Handle<TOTAL_BITS, GENERATION_BITS>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Handle(null)");
        }
        f.debug_struct("Handle")
            .field("index", &self.index())
            .field("generation", &self.generation())
            .finish()
    }
}
