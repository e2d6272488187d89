//! Page: fixed-capacity slot storage with a skip-field and a free list.
//!
//! Slots below `high_water` have been used at least once; slots at or above
//! it are raw. Vacant slots below `high_water` form maximal runs called skip
//! blocks. For a block `[start, end]` of length `n`, `skip[start] == skip[end]
//! == n`; interior entries are unspecified. Occupied and raw positions hold
//! 0, and the field has one trailing entry so `skip[i + 1]` is always in
//! bounds.
//!
//! Only block starts are linked into the page free list, through the
//! `next_free`/`prev_free` links of their vacant slot. Inserting into a hole
//! always reuses the start of the block at the head of that list.

use core::mem;

pub(crate) enum Slot<T> {
    Occupied {
        value: T,
        generation: u64,
    },
    Vacant {
        generation: u64,
        next_free: Option<usize>,
        prev_free: Option<usize>,
    },
}

impl<T> Slot<T> {
    const fn vacant(generation: u64) -> Self {
        Slot::Vacant {
            generation,
            next_free: None,
            prev_free: None,
        }
    }

    fn generation(&self) -> u64 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Vacant { generation, .. } => *generation,
        }
    }
}

pub(crate) struct Page<T> {
    slots: Vec<Slot<T>>,
    skip: Vec<usize>,
    high_water: usize,
    free_head: Option<usize>,
    occupied: usize,
    /// Neighbour in the live chain, or in the page free list (`next` only).
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl<T> Page<T> {
    /// Wrap storage from a page allocator. `slots` is used as-is and must
    /// have capacity for `page_size` slots; `skip` is resized to
    /// `page_size + 1` zeros.
    pub(crate) fn new(slots: Vec<Slot<T>>, mut skip: Vec<usize>, page_size: usize) -> Self {
        debug_assert!(slots.is_empty() && slots.capacity() >= page_size);
        skip.clear();
        skip.resize(page_size + 1, 0);
        Self {
            slots,
            skip,
            high_water: 0,
            free_head: None,
            occupied: 0,
            prev: None,
            next: None,
        }
    }

    #[inline]
    fn page_size(&self) -> usize {
        self.skip.len() - 1
    }

    #[inline]
    pub(crate) fn occupied(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.occupied == self.page_size()
    }

    /// Offset the next `insert` will use. Only meaningful when not full.
    #[inline]
    pub(crate) fn next_insert_offset(&self) -> usize {
        self.free_head.unwrap_or(self.high_water)
    }

    /// Store `value` in a hole if there is one, else in the next raw slot.
    /// Returns the offset and the generation the slot carries.
    ///
    /// The page must not be full.
    pub(crate) fn insert(&mut self, value: T) -> (usize, u64) {
        debug_assert!(!self.is_full());
        let offset = match self.free_head {
            Some(start) => {
                self.take_block_start(start);
                start
            }
            None => {
                let offset = self.high_water;
                self.high_water += 1;
                offset
            }
        };
        // Raw slots below `slots.len()` are left over from before a reset and
        // still carry their generation.
        let generation = self.slots.get(offset).map_or(0, Slot::generation);
        let slot = Slot::Occupied { value, generation };
        if offset < self.slots.len() {
            self.slots[offset] = slot;
        } else {
            debug_assert_eq!(offset, self.slots.len());
            self.slots.push(slot);
        }
        self.occupied += 1;
        (offset, generation)
    }

    /// Vacate an occupied slot, giving it the generation `bump` derives from
    /// its current one. Returns `None` if the slot is not occupied.
    ///
    /// When this empties the page the skip-field is left as is; the caller
    /// is expected to `reset` the page.
    pub(crate) fn remove(&mut self, offset: usize, bump: fn(u64) -> u64) -> Option<T> {
        let slot = self.slots.get_mut(offset)?;
        let generation = match slot {
            Slot::Occupied { generation, .. } => *generation,
            Slot::Vacant { .. } => return None,
        };
        let Slot::Occupied { value, .. } = mem::replace(slot, Slot::vacant(bump(generation)))
        else {
            unreachable!("slot was checked to be occupied");
        };
        self.occupied -= 1;
        if self.occupied > 0 {
            self.release(offset);
        }
        Some(value)
    }

    pub(crate) fn get(&self, offset: usize, generation: u64) -> Option<&T> {
        match self.slots.get(offset)? {
            Slot::Occupied {
                value,
                generation: g,
            } if *g == generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, offset: usize, generation: u64) -> Option<&mut T> {
        match self.slots.get_mut(offset)? {
            Slot::Occupied {
                value,
                generation: g,
            } if *g == generation => Some(value),
            _ => None,
        }
    }

    /// The value and generation at `offset`, regardless of generation.
    pub(crate) fn occupied_at(&self, offset: usize) -> Option<(&T, u64)> {
        match self.slots.get(offset)? {
            Slot::Occupied { value, generation } => Some((value, *generation)),
            Slot::Vacant { .. } => None,
        }
    }

    pub(crate) fn first_occupied(&self) -> Option<usize> {
        let first = self.skip[0];
        (first < self.high_water).then_some(first)
    }

    /// First occupied offset after the occupied slot at `offset`.
    pub(crate) fn next_occupied(&self, offset: usize) -> Option<usize> {
        let next = offset + 1;
        let next = next + self.skip[next];
        (next < self.high_water).then_some(next)
    }

    /// Last occupied offset before `offset`, where `offset` is occupied or
    /// equal to `high_water`.
    pub(crate) fn prev_occupied(&self, offset: usize) -> Option<usize> {
        let before = offset.checked_sub(1)?;
        before.checked_sub(self.skip[before])
    }

    pub(crate) fn last_occupied(&self) -> Option<usize> {
        self.prev_occupied(self.high_water)
    }

    /// Forget all holes and make every slot raw again. Generations are kept
    /// so handles into this page stay stale once it is reused.
    pub(crate) fn reset(&mut self) {
        debug_assert_eq!(self.occupied, 0);
        self.skip.fill(0);
        self.high_water = 0;
        self.free_head = None;
        self.prev = None;
        self.next = None;
    }

    /// Drop every live value, bumping each slot's generation, then `reset`.
    pub(crate) fn vacate_all(&mut self, bump: fn(u64) -> u64) {
        for slot in &mut self.slots[..self.high_water] {
            if let Slot::Occupied { generation, .. } = slot {
                let generation = bump(*generation);
                *slot = Slot::vacant(generation);
            }
        }
        self.occupied = 0;
        self.reset();
    }

    pub(crate) fn into_storage(self) -> (Vec<Slot<T>>, Vec<usize>) {
        (self.slots, self.skip)
    }

    /// Occupy the start of a free block: shrink the block from the front or,
    /// for a single-slot block, drop it from the free list.
    fn take_block_start(&mut self, start: usize) {
        let len = self.skip[start];
        debug_assert!(len > 0);
        self.skip[start] = 0;
        if len == 1 {
            self.unlink_block(start);
        } else {
            let end = start + len - 1;
            self.skip[start + 1] = len - 1;
            self.skip[end] = len - 1;
            self.move_block_start(start, start + 1);
        }
    }

    /// Fold the just-vacated slot `i` into the skip-field, merging with free
    /// neighbours.
    fn release(&mut self, i: usize) {
        let left = if i > 0 { self.skip[i - 1] } else { 0 };
        let right = self.skip[i + 1];
        match (left, right) {
            (0, 0) => {
                self.skip[i] = 1;
                self.push_block(i);
            }
            (left, 0) => {
                let start = i - left;
                self.skip[start] = left + 1;
                self.skip[i] = left + 1;
            }
            (0, right) => {
                let end = i + right;
                self.skip[i] = right + 1;
                self.skip[end] = right + 1;
                self.move_block_start(i + 1, i);
            }
            (left, right) => {
                let start = i - left;
                let end = i + right;
                self.unlink_block(i + 1);
                self.skip[start] = left + right + 1;
                self.skip[end] = left + right + 1;
            }
        }
    }

    fn links(&self, i: usize) -> (Option<usize>, Option<usize>) {
        match &self.slots[i] {
            Slot::Vacant {
                next_free,
                prev_free,
                ..
            } => (*next_free, *prev_free),
            Slot::Occupied { .. } => {
                debug_assert!(false, "free list points at an occupied slot");
                (None, None)
            }
        }
    }

    fn set_links(&mut self, i: usize, next: Option<usize>, prev: Option<usize>) {
        if let Slot::Vacant {
            next_free,
            prev_free,
            ..
        } = &mut self.slots[i]
        {
            *next_free = next;
            *prev_free = prev;
        }
    }

    fn set_next(&mut self, i: usize, next: Option<usize>) {
        if let Slot::Vacant { next_free, .. } = &mut self.slots[i] {
            *next_free = next;
        }
    }

    fn set_prev(&mut self, i: usize, prev: Option<usize>) {
        if let Slot::Vacant { prev_free, .. } = &mut self.slots[i] {
            *prev_free = prev;
        }
    }

    fn push_block(&mut self, start: usize) {
        let old = self.free_head;
        self.set_links(start, old, None);
        if let Some(old) = old {
            self.set_prev(old, Some(start));
        }
        self.free_head = Some(start);
    }

    fn unlink_block(&mut self, start: usize) {
        let (next, prev) = self.links(start);
        match prev {
            Some(prev) => self.set_next(prev, next),
            None => self.free_head = next,
        }
        if let Some(next) = next {
            self.set_prev(next, prev);
        }
    }

    /// Replace block start `from` with `to` in the free list, keeping its
    /// position.
    fn move_block_start(&mut self, from: usize, to: usize) {
        let (next, prev) = self.links(from);
        self.set_links(to, next, prev);
        match prev {
            Some(prev) => self.set_next(prev, Some(to)),
            None => self.free_head = Some(to),
        }
        if let Some(next) = next {
            self.set_prev(next, Some(to));
        }
    }
}

/// Mutable view of a page's used slots, consumed from both ends in skip
/// steps. `base` is the global index of `slots[0]`.
pub(crate) struct SlotSpan<'a, T> {
    base: usize,
    slots: &'a mut [Slot<T>],
    skip: &'a [usize],
}

impl<'a, T> SlotSpan<'a, T> {
    pub(crate) fn new(page: &'a mut Page<T>, base: usize) -> Self {
        let used = page.high_water;
        Self {
            base,
            slots: &mut page.slots[..used],
            skip: &page.skip[..used],
        }
    }

    /// Next occupied slot from the front as `(index, generation, value)`.
    pub(crate) fn pop_front(&mut self) -> Option<(usize, u64, &'a mut T)> {
        loop {
            let jump = *self.skip.first()?;
            let slots = mem::take(&mut self.slots);
            if jump >= slots.len() {
                self.skip = &[];
                return None;
            }
            let (slot, rest) = slots[jump..].split_first_mut()?;
            let index = self.base + jump;
            let skip = self.skip;
            self.base = index + 1;
            self.skip = &skip[jump + 1..];
            self.slots = rest;
            if let Slot::Occupied { value, generation } = slot {
                return Some((index, *generation, value));
            }
        }
    }

    /// Next occupied slot from the back as `(index, generation, value)`.
    pub(crate) fn pop_back(&mut self) -> Option<(usize, u64, &'a mut T)> {
        loop {
            let last = self.slots.len().checked_sub(1)?;
            let slots = mem::take(&mut self.slots);
            let Some(at) = last.checked_sub(self.skip[last]) else {
                self.skip = &[];
                return None;
            };
            let (rest, tail) = slots.split_at_mut(at);
            let (slot, _) = tail.split_first_mut()?;
            let skip = self.skip;
            self.skip = &skip[..at];
            self.slots = rest;
            if let Slot::Occupied { value, generation } = slot {
                return Some((self.base + at, *generation, value));
            }
        }
    }
}
