//! PagedSlotMap: handle-based object pool over non-relocating pages.
//!
//! Pages live in a `Vec` and are referred to by their position in it; a
//! handle's index is `page * PAGE_SIZE + offset`. A page's slot buffer is
//! allocated once at full capacity and never grows past it, so a stored
//! value does not move until it is removed.
//!
//! Pages with at least one live value form the live chain (`head` to
//! `tail`), in the order they were linked; iteration walks that chain. New
//! values always go into the tail page. A page whose last value is removed
//! is unlinked and pushed on the page free list, to be relinked as the tail
//! before any new page is allocated. The one exception is the last remaining
//! live page, which is reset in place and stays linked.

use crate::handle::Handle;
use crate::page::{Page, SlotSpan};
use crate::page_alloc::{Global, PageAllocator};
use core::fmt;
use core::iter::FusedIterator;
use std::collections::VecDeque;
use tracing::trace;

/// Returned when no slot with an addressable index is left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("paged slot map is full: handles can address at most {max_size} elements")]
pub struct CapacityError {
    max_size: usize,
}

impl CapacityError {
    /// The map's `max_size()` at the time of the failure.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

pub struct PagedSlotMap<
    T,
    const PAGE_SIZE: usize = 64,
    const TOTAL_BITS: u32 = 32,
    const GENERATION_BITS: u32 = 8,
    A: PageAllocator = Global,
> {
    pages: Vec<Page<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_pages: Option<usize>,
    len: usize,
    alloc: A,
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A>
    PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator + Default,
{
    pub fn new() -> Self {
        Self::with_allocator(A::default())
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A> Default
    for PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A>
    PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator,
{
    const PAGE_SIZE_OK: () = assert!(
        PAGE_SIZE.is_power_of_two(),
        "PAGE_SIZE must be a non-zero power of two"
    );

    /// Create an empty map. No page is allocated until the first insert.
    pub fn with_allocator(alloc: A) -> Self {
        let () = Self::PAGE_SIZE_OK;
        let () = Handle::<TOTAL_BITS, GENERATION_BITS>::LAYOUT_OK;
        Self {
            pages: Vec::new(),
            head: None,
            tail: None,
            free_pages: None,
            len: 0,
            alloc,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots across all allocated pages, including recycled ones.
    pub fn capacity(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of distinct indices a handle can carry; the null index is
    /// excluded.
    pub fn max_size(&self) -> usize {
        usize::try_from(Handle::<TOTAL_BITS, GENERATION_BITS>::NULL_INDEX).unwrap_or(usize::MAX)
    }

    /// Insert `value` and return its handle.
    pub fn insert(
        &mut self,
        value: T,
    ) -> Result<Handle<TOTAL_BITS, GENERATION_BITS>, CapacityError> {
        self.emplace(|| value)
    }

    /// Build a value in a fresh slot and return its handle. `make` is only
    /// called once a slot is known to be available.
    pub fn emplace<F>(
        &mut self,
        make: F,
    ) -> Result<Handle<TOTAL_BITS, GENERATION_BITS>, CapacityError>
    where
        F: FnOnce() -> T,
    {
        self.emplace_and_get(make).map(|(handle, _)| handle)
    }

    /// Like [`emplace`](Self::emplace), also returning the stored value.
    ///
    /// If `make` panics, the map is left exactly as it was.
    pub fn emplace_and_get<F>(
        &mut self,
        make: F,
    ) -> Result<(Handle<TOTAL_BITS, GENERATION_BITS>, &mut T), CapacityError>
    where
        F: FnOnce() -> T,
    {
        self.check_room()?;
        let value = make();
        let page_id = self.tail_with_room();
        let page = &mut self.pages[page_id];
        let (offset, generation) = page.insert(value);
        self.len += 1;
        let handle = Handle::new((page_id * PAGE_SIZE + offset) as u64, generation);
        let value = page
            .get_mut(offset, generation)
            .expect("slot must be occupied immediately after insert");
        Ok((handle, value))
    }

    /// Remove the value behind `handle` and return it. Stale, null, and
    /// foreign handles yield `None` and change nothing.
    pub fn remove(&mut self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) -> Option<T> {
        let (page_id, offset) = self.locate(handle)?;
        let page = &mut self.pages[page_id];
        page.get(offset, handle.generation())?;
        let value = page.remove(offset, Handle::<TOTAL_BITS, GENERATION_BITS>::next_generation)?;
        self.len -= 1;
        if page.occupied() == 0 {
            self.retire_page(page_id);
        }
        Some(value)
    }

    /// Drop the value behind `handle`. A no-op for handles that are not valid.
    pub fn erase(&mut self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) {
        drop(self.remove(handle));
    }

    pub fn is_valid(&self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) -> bool {
        self.lookup(handle).is_some()
    }

    pub fn lookup(&self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) -> Option<&T> {
        let (page_id, offset) = self.locate(handle)?;
        self.pages[page_id].get(offset, handle.generation())
    }

    pub fn lookup_mut(&mut self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) -> Option<&mut T> {
        let (page_id, offset) = self.locate(handle)?;
        self.pages[page_id].get_mut(offset, handle.generation())
    }

    /// Drop every value. All outstanding handles become stale; pages are kept
    /// for reuse.
    pub fn clear(&mut self) {
        let bump = Handle::<TOTAL_BITS, GENERATION_BITS>::next_generation;
        for page in &mut self.pages {
            page.vacate_all(bump);
        }
        self.free_pages = None;
        for id in (0..self.pages.len()).rev() {
            self.pages[id].next = self.free_pages;
            self.free_pages = Some(id);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS> {
        Iter {
            pages: &self.pages,
            front: first_from(&self.pages, self.head),
            back: last_from(&self.pages, self.tail),
            remaining: self.len,
        }
    }

    /// Mutable iteration in live-chain order.
    ///
    /// Unlike [`iter`](Self::iter), setup is not O(1): it walks every page,
    /// including pages parked on the page free list, and allocates one span
    /// per live page.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS> {
        let mut by_id: Vec<Option<&mut Page<T>>> = self.pages.iter_mut().map(Some).collect();
        let mut spans = VecDeque::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let Some(page) = by_id.get_mut(id).and_then(Option::take) else {
                break;
            };
            cursor = page.next;
            spans.push_back(SlotSpan::new(page, id * PAGE_SIZE));
        }
        IterMut {
            spans,
            remaining: self.len,
        }
    }

    fn locate(&self, handle: Handle<TOTAL_BITS, GENERATION_BITS>) -> Option<(usize, usize)> {
        if handle.is_null() {
            return None;
        }
        let index = usize::try_from(handle.index()).ok()?;
        if index >= self.capacity() {
            return None;
        }
        Some((index / PAGE_SIZE, index % PAGE_SIZE))
    }

    /// Fail unless the next insert would land on an index below `max_size`.
    /// Holes outside the tail page are not reused, so this can fail before
    /// `len` reaches `max_size`.
    fn check_room(&self) -> Result<(), CapacityError> {
        let max_size = self.max_size();
        let full = CapacityError { max_size };
        if self.len >= max_size {
            return Err(full);
        }
        let next_index = match self.tail {
            Some(tail) if !self.pages[tail].is_full() => {
                Some(tail * PAGE_SIZE + self.pages[tail].next_insert_offset())
            }
            _ => match self.free_pages {
                Some(page_id) => Some(page_id * PAGE_SIZE),
                None => self.pages.len().checked_mul(PAGE_SIZE),
            },
        };
        match next_index {
            Some(index) if index < max_size => Ok(()),
            _ => Err(full),
        }
    }

    /// The tail page, after linking a new one if the current tail is full or
    /// there is none.
    fn tail_with_room(&mut self) -> usize {
        if let Some(tail) = self.tail {
            if !self.pages[tail].is_full() {
                return tail;
            }
        }
        let id = self.acquire_page();
        match self.tail {
            Some(tail) => {
                self.pages[tail].next = Some(id);
                self.pages[id].prev = Some(tail);
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    fn acquire_page(&mut self) -> usize {
        if let Some(id) = self.free_pages {
            self.free_pages = self.pages[id].next;
            self.pages[id].next = None;
            trace!(page = id, pages = self.pages.len(), "recycled page");
            return id;
        }
        let id = self.pages.len();
        let slots = self.alloc.allocate(PAGE_SIZE);
        let skip = self.alloc.allocate(PAGE_SIZE + 1);
        self.pages.push(Page::new(slots, skip, PAGE_SIZE));
        trace!(page = id, pages = id + 1, "allocated page");
        id
    }

    /// Unlink a page that just became empty and park it on the page free
    /// list, or reset it if it is the only live page.
    fn retire_page(&mut self, id: usize) {
        let (prev, next) = (self.pages[id].prev, self.pages[id].next);
        if prev.is_none() && next.is_none() {
            self.pages[id].reset();
            trace!(page = id, "reset sole page");
            return;
        }
        match prev {
            Some(prev) => self.pages[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.pages[next].prev = prev,
            None => self.tail = prev,
        }
        self.pages[id].reset();
        self.pages[id].next = self.free_pages;
        self.free_pages = Some(id);
        trace!(page = id, len = self.len, "retired page");
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A> Drop
    for PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator,
{
    fn drop(&mut self) {
        for page in self.pages.drain(..) {
            let (slots, skip) = page.into_storage();
            self.alloc.deallocate(slots);
            self.alloc.deallocate(skip);
        }
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A> fmt::Debug
    for PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    T: fmt::Debug,
    A: PageAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn first_from<T>(pages: &[Page<T>], mut page: Option<usize>) -> Option<(usize, usize)> {
    while let Some(id) = page {
        if let Some(offset) = pages[id].first_occupied() {
            return Some((id, offset));
        }
        page = pages[id].next;
    }
    None
}

fn last_from<T>(pages: &[Page<T>], mut page: Option<usize>) -> Option<(usize, usize)> {
    while let Some(id) = page {
        if let Some(offset) = pages[id].last_occupied() {
            return Some((id, offset));
        }
        page = pages[id].prev;
    }
    None
}

/// Iterator over `(Handle, &T)` in live-chain order.
pub struct Iter<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> {
    pages: &'a [Page<T>],
    front: Option<(usize, usize)>,
    back: Option<(usize, usize)>,
    remaining: usize,
}

impl<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32>
    Iter<'a, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    fn item(
        &self,
        (page, offset): (usize, usize),
    ) -> Option<(Handle<TOTAL_BITS, GENERATION_BITS>, &'a T)> {
        let pages = self.pages;
        let (value, generation) = pages[page].occupied_at(offset)?;
        Some((Handle::new((page * PAGE_SIZE + offset) as u64, generation), value))
    }
}

impl<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> Iterator
    for Iter<'a, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    type Item = (Handle<TOTAL_BITS, GENERATION_BITS>, &'a T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let at = self.front?;
        self.remaining -= 1;
        let (page, offset) = at;
        self.front = match self.pages[page].next_occupied(offset) {
            Some(offset) => Some((page, offset)),
            None => first_from(self.pages, self.pages[page].next),
        };
        self.item(at)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32>
    DoubleEndedIterator for Iter<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let at = self.back?;
        self.remaining -= 1;
        let (page, offset) = at;
        self.back = match self.pages[page].prev_occupied(offset) {
            Some(offset) => Some((page, offset)),
            None => last_from(self.pages, self.pages[page].prev),
        };
        self.item(at)
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> ExactSizeIterator
    for Iter<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> FusedIterator
    for Iter<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> Clone
    for Iter<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    fn clone(&self) -> Self {
        Self {
            pages: self.pages,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

/// Iterator over `(Handle, &mut T)` in live-chain order.
pub struct IterMut<
    'a,
    T,
    const PAGE_SIZE: usize,
    const TOTAL_BITS: u32,
    const GENERATION_BITS: u32,
> {
    spans: VecDeque<SlotSpan<'a, T>>,
    remaining: usize,
}

impl<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> Iterator
    for IterMut<'a, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    type Item = (Handle<TOTAL_BITS, GENERATION_BITS>, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            let span = self.spans.front_mut()?;
            match span.pop_front() {
                Some((index, generation, value)) => {
                    self.remaining -= 1;
                    return Some((Handle::new(index as u64, generation), value));
                }
                None => {
                    self.spans.pop_front();
                }
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32>
    DoubleEndedIterator for IterMut<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            let span = self.spans.back_mut()?;
            match span.pop_back() {
                Some((index, generation, value)) => {
                    self.remaining -= 1;
                    return Some((Handle::new(index as u64, generation), value));
                }
                None => {
                    self.spans.pop_back();
                }
            }
        }
    }
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> ExactSizeIterator
    for IterMut<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
}

impl<T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32> FusedIterator
    for IterMut<'_, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>
{
}

impl<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A>
    IntoIterator for &'a PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator,
{
    type Item = (Handle<TOTAL_BITS, GENERATION_BITS>, &'a T);
    type IntoIter = Iter<'a, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, const PAGE_SIZE: usize, const TOTAL_BITS: u32, const GENERATION_BITS: u32, A>
    IntoIterator for &'a mut PagedSlotMap<T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS, A>
where
    A: PageAllocator,
{
    type Item = (Handle<TOTAL_BITS, GENERATION_BITS>, &'a mut T);
    type IntoIter = IterMut<'a, T, PAGE_SIZE, TOTAL_BITS, GENERATION_BITS>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_alloc::testing::CountingAllocator;
    use std::cell::Cell;
    use std::rc::Rc;

    type Map<T> = PagedSlotMap<T, 4>;

    fn values<const P: usize, const TB: u32, const GB: u32, A: PageAllocator>(
        m: &PagedSlotMap<u32, P, TB, GB, A>,
    ) -> Vec<u32> {
        m.iter().map(|(_, v)| *v).collect()
    }

    fn values_rev<const P: usize, const TB: u32, const GB: u32, A: PageAllocator>(
        m: &PagedSlotMap<u32, P, TB, GB, A>,
    ) -> Vec<u32> {
        m.iter().rev().map(|(_, v)| *v).collect()
    }

    struct DropCounter(Rc<Cell<usize>>);
    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Invariant: a freshly returned handle resolves to the inserted value.
    #[test]
    fn insert_then_lookup() {
        let mut m: Map<String> = Map::new();
        let a = m.insert("a".to_string()).unwrap();
        let b = m.insert("b".to_string()).unwrap();
        assert_ne!(a, b);
        assert_eq!(m.lookup(a).map(String::as_str), Some("a"));
        assert_eq!(m.lookup(b).map(String::as_str), Some("b"));
        assert!(m.is_valid(a));
        assert_eq!(m.len(), 2);
        assert!(!m.is_empty());
    }

    /// Invariant: `emplace_and_get` hands back the stored value itself.
    #[test]
    fn emplace_and_get_returns_stored_value() {
        let mut m: Map<u32> = Map::new();
        let (h, v) = m.emplace_and_get(|| 5).unwrap();
        *v += 1;
        let ptr = v as *const u32;
        assert_eq!(m.lookup(h), Some(&6));
        assert_eq!(m.lookup(h).map(|v| v as *const u32), Some(ptr));
    }

    /// Invariant: erase drops the value once, invalidates the handle, and a
    /// second erase of the same handle is a no-op.
    #[test]
    fn erase_invalidates_and_is_idempotent() {
        let drops = Rc::new(Cell::new(0));
        let mut m: Map<DropCounter> = Map::new();
        let h = m.insert(DropCounter(drops.clone())).unwrap();
        let keep = m.insert(DropCounter(drops.clone())).unwrap();
        m.erase(h);
        assert_eq!(drops.get(), 1);
        assert!(!m.is_valid(h));
        assert!(m.lookup(h).is_none());
        m.erase(h);
        assert!(m.remove(h).is_none());
        assert_eq!(drops.get(), 1);
        assert_eq!(m.len(), 1);
        assert!(m.is_valid(keep));
        drop(m);
        assert_eq!(drops.get(), 2);
    }

    /// Invariant: `remove` returns ownership of the value.
    #[test]
    fn remove_returns_value() {
        let mut m: Map<String> = Map::new();
        let h = m.insert("x".to_string()).unwrap();
        assert_eq!(m.remove(h), Some("x".to_string()));
        assert!(m.is_empty());
    }

    /// Invariant: PAGE_SIZE + 1 inserts need a second page.
    #[test]
    fn grows_by_whole_pages() {
        let mut m: Map<u32> = Map::new();
        assert_eq!((m.page_count(), m.capacity()), (0, 0));
        for v in 0..4 {
            m.insert(v).unwrap();
        }
        assert_eq!((m.page_count(), m.capacity()), (1, 4));
        m.insert(4).unwrap();
        assert_eq!((m.page_count(), m.capacity()), (2, 8));
        assert_eq!(values(&m), vec![0, 1, 2, 3, 4]);
    }

    /// Invariant: emptying the head page parks it; the next page the map
    /// needs is that one, not a fresh allocation.
    #[test]
    fn emptied_page_is_recycled() {
        let alloc = CountingAllocator::default();
        let mut m: PagedSlotMap<u32, 4, 32, 8, CountingAllocator> =
            PagedSlotMap::with_allocator(alloc.clone());
        let handles: Vec<_> = (0..8).map(|v| m.insert(v).unwrap()).collect();
        assert_eq!(alloc.allocated.get(), 4);
        for &h in &handles[..4] {
            m.erase(h);
        }
        assert_eq!(m.capacity(), 8);
        assert_eq!(values(&m), vec![4, 5, 6, 7]);
        for v in 8..12 {
            m.insert(v).unwrap();
        }
        assert_eq!(m.capacity(), 8);
        assert_eq!(alloc.allocated.get(), 4);
        assert_eq!(alloc.deallocated.get(), 0);
        assert_eq!(values(&m), vec![4, 5, 6, 7, 8, 9, 10, 11]);
        for &h in &handles[..4] {
            assert!(!m.is_valid(h));
        }
    }

    /// Invariant: erasing everything and inserting one value leaves exactly
    /// that value visible.
    #[test]
    fn erase_all_then_insert_one() {
        let mut m: Map<u32> = Map::new();
        let handles: Vec<_> = (0..10).map(|v| m.insert(v).unwrap()).collect();
        for h in handles {
            m.erase(h);
        }
        assert!(m.is_empty());
        assert_eq!(m.iter().count(), 0);
        let h = m.insert(42).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(h, &42)]);
        assert_eq!(m.iter().rev().collect::<Vec<_>>(), vec![(h, &42)]);
        assert_eq!(m.capacity(), 12);
    }

    /// Invariant: iteration steps over holes in the middle of a page in both
    /// directions.
    #[test]
    fn iteration_skips_holes() {
        let mut m: PagedSlotMap<u32, 16> = PagedSlotMap::new();
        let handles: Vec<_> = (0..10).map(|v| m.insert(v).unwrap()).collect();
        for i in [2, 5, 6] {
            m.erase(handles[i]);
        }
        assert_eq!(values(&m), vec![0, 1, 3, 4, 7, 8, 9]);
        assert_eq!(values_rev(&m), vec![9, 8, 7, 4, 3, 1, 0]);
        let seen: Vec<_> = m.iter().map(|(h, _)| h).collect();
        let expected: Vec<_> = [0, 1, 3, 4, 7, 8, 9].iter().map(|&i| handles[i]).collect();
        assert_eq!(seen, expected);
    }

    /// Invariant: front and back iteration meet without overlap.
    #[test]
    fn iteration_from_both_ends() {
        let mut m: Map<u32> = Map::new();
        let handles: Vec<_> = (0..11).map(|v| m.insert(v).unwrap()).collect();
        m.erase(handles[3]);
        m.erase(handles[6]);
        let mut it = m.iter();
        assert_eq!(it.len(), 9);
        assert_eq!(it.next().map(|(_, v)| *v), Some(0));
        assert_eq!(it.next_back().map(|(_, v)| *v), Some(10));
        assert_eq!(it.next_back().map(|(_, v)| *v), Some(9));
        assert_eq!(it.len(), 6);
        let middle: Vec<u32> = it.map(|(_, v)| *v).collect();
        assert_eq!(middle, vec![1, 2, 4, 5, 7, 8]);
    }

    /// Invariant: `iter_mut` visits the same slots as `iter` and its writes
    /// are visible afterwards.
    #[test]
    fn iter_mut_updates_values() {
        let mut m: Map<u32> = Map::new();
        let handles: Vec<_> = (0..9).map(|v| m.insert(v).unwrap()).collect();
        m.erase(handles[1]);
        m.erase(handles[4]);
        let before: Vec<_> = m.iter().map(|(h, _)| h).collect();
        let mut it = m.iter_mut();
        assert_eq!(it.len(), 7);
        let (last, v) = it.next_back().unwrap();
        *v += 100;
        assert_eq!(last, handles[8]);
        for (_, v) in it {
            *v += 10;
        }
        assert_eq!(values(&m), vec![10, 12, 13, 15, 16, 17, 108]);
        let after: Vec<_> = (&mut m).into_iter().map(|(h, _)| h).collect();
        assert_eq!(before, after);
    }

    /// Invariant: a slot reused after erase gets a new generation, so the old
    /// handle stays invalid.
    #[test]
    fn reused_slot_gets_new_generation() {
        let mut m: Map<&str> = Map::new();
        let a = m.insert("a").unwrap();
        let _b = m.insert("b").unwrap();
        m.erase(a);
        let c = m.insert("c").unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert_ne!(a, c);
        assert!(!m.is_valid(a));
        assert_eq!(m.lookup(c), Some(&"c"));
    }

    /// Invariant: generations wrap after 2^GENERATION_BITS reuses of a slot,
    /// at which point an old handle aliases the new value.
    #[test]
    fn generation_wraps_around() {
        let mut m: PagedSlotMap<u32, 4, 16, 1> = PagedSlotMap::new();
        let a = m.insert(1).unwrap();
        m.erase(a);
        let b = m.insert(2).unwrap();
        assert_eq!(b.index(), a.index());
        assert!(!m.is_valid(a));
        m.erase(b);
        let c = m.insert(3).unwrap();
        assert_eq!(c, a);
        assert_eq!(m.lookup(a), Some(&3));
    }

    /// Invariant: once the handle index space is used up inserts fail
    /// without touching the map or calling the constructor.
    #[test]
    fn full_map_reports_capacity_error() {
        let mut m: PagedSlotMap<u32, 4, 8, 5> = PagedSlotMap::new();
        assert_eq!(m.max_size(), 7);
        let handles: Vec<_> = (0..7).map(|v| m.insert(v).unwrap()).collect();
        let err = m
            .emplace(|| panic!("constructor must not run when full"))
            .unwrap_err();
        assert_eq!(err, CapacityError { max_size: 7 });
        assert_eq!(err.max_size(), 7);
        assert_eq!(m.len(), 7);
        assert_eq!(m.page_count(), 2);

        // A hole outside the tail page is not reused.
        m.erase(handles[1]);
        assert!(m.insert(100).is_err());
        assert_eq!(m.len(), 6);

        // A hole in the tail page is.
        m.erase(handles[6]);
        let h = m.insert(101).unwrap();
        assert_eq!(h.index(), 6);
        assert_eq!(values(&m), vec![0, 2, 3, 4, 5, 101]);
    }

    /// Invariant: the error message names the addressable maximum.
    #[test]
    fn capacity_error_message() {
        let err = CapacityError { max_size: 7 };
        assert_eq!(
            err.to_string(),
            "paged slot map is full: handles can address at most 7 elements"
        );
    }

    /// Invariant: a panicking constructor leaves the map unchanged and usable.
    #[test]
    fn panicking_constructor_leaves_map_intact() {
        let mut m: Map<u32> = Map::new();
        for v in 0..4 {
            m.insert(v).unwrap();
        }
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = m.emplace(|| panic!("boom"));
        }));
        assert!(res.is_err());
        assert_eq!(m.len(), 4);
        assert_eq!(m.page_count(), 1);
        m.insert(4).unwrap();
        assert_eq!(values(&m), vec![0, 1, 2, 3, 4]);
    }

    /// Invariant: values do not move while other values come and go.
    #[test]
    fn values_keep_their_address() {
        let mut m: Map<u64> = Map::new();
        let h = m.insert(7).unwrap();
        let before = m.lookup(h).map(|v| v as *const u64);
        let others: Vec<_> = (0..100).map(|v| m.insert(v).unwrap()).collect();
        for h in others.iter().step_by(3) {
            m.erase(*h);
        }
        assert_eq!(m.lookup(h).map(|v| v as *const u64), before);
    }

    /// Invariant: emptying a middle page splices it out; it is relinked after
    /// the tail when reused.
    #[test]
    fn middle_page_is_spliced_out() {
        let mut m: PagedSlotMap<u32, 2> = PagedSlotMap::new();
        let handles: Vec<_> = (0..6).map(|v| m.insert(v).unwrap()).collect();
        m.erase(handles[2]);
        m.erase(handles[3]);
        assert_eq!(values(&m), vec![0, 1, 4, 5]);
        assert_eq!(values_rev(&m), vec![5, 4, 1, 0]);
        m.insert(6).unwrap();
        m.insert(7).unwrap();
        assert_eq!(m.page_count(), 3);
        assert_eq!(values(&m), vec![0, 1, 4, 5, 6, 7]);
    }

    /// Invariant: `iter_mut` skips parked pages and follows chain order, not
    /// page id order, once a recycled page is relinked.
    #[test]
    fn iter_mut_follows_chain_past_parked_pages() {
        let mut m: PagedSlotMap<u32, 2> = PagedSlotMap::new();
        let handles: Vec<_> = (0..6).map(|v| m.insert(v).unwrap()).collect();
        m.erase(handles[2]);
        m.erase(handles[3]);
        let parked: Vec<u32> = m.iter_mut().map(|(_, v)| *v).collect();
        assert_eq!(parked, vec![0, 1, 4, 5]);

        m.insert(6).unwrap();
        m.insert(7).unwrap();
        let indices: Vec<u64> = m.iter_mut().map(|(h, _)| h.index()).collect();
        assert_eq!(indices, vec![0, 1, 4, 5, 2, 3]);
        let backward: Vec<u32> = m.iter_mut().rev().map(|(_, v)| *v).collect();
        assert_eq!(backward, vec![7, 6, 5, 4, 1, 0]);
    }

    /// Invariant: emptying the tail page makes its predecessor the tail.
    #[test]
    fn tail_page_retires_to_predecessor() {
        let mut m: PagedSlotMap<u32, 2> = PagedSlotMap::new();
        let handles: Vec<_> = (0..5).map(|v| m.insert(v).unwrap()).collect();
        m.erase(handles[4]);
        assert_eq!(values_rev(&m), vec![3, 2, 1, 0]);
        m.erase(handles[1]);
        let h = m.insert(9).unwrap();
        assert_eq!(h.index(), 4);
        assert_eq!(m.page_count(), 3);
        assert_eq!(values(&m), vec![0, 2, 3, 9]);
    }

    /// Invariant: null, out-of-range, and foreign handles resolve to nothing.
    #[test]
    fn invalid_handles_are_rejected() {
        let mut m: Map<u32> = Map::new();
        m.insert(1).unwrap();
        assert!(!m.is_valid(Handle::null()));
        assert!(!m.is_valid(Handle::new(3, 0)));
        assert!(!m.is_valid(Handle::new(400, 0)));
        assert!(!m.is_valid(Handle::new(0, 1)));
        m.erase(Handle::new(400, 0));
        assert!(m.lookup_mut(Handle::null()).is_none());
        assert_eq!(m.len(), 1);
    }

    /// Invariant: clear drops everything, invalidates every handle, and keeps
    /// the pages.
    #[test]
    fn clear_keeps_pages() {
        let drops = Rc::new(Cell::new(0));
        let alloc = CountingAllocator::default();
        let mut m: PagedSlotMap<DropCounter, 4, 32, 8, CountingAllocator> =
            PagedSlotMap::with_allocator(alloc.clone());
        let handles: Vec<_> = (0..6)
            .map(|_| m.insert(DropCounter(drops.clone())).unwrap())
            .collect();
        m.clear();
        assert_eq!(drops.get(), 6);
        assert!(m.is_empty());
        assert_eq!(m.capacity(), 8);
        assert_eq!(m.iter().count(), 0);
        assert!(handles.iter().all(|&h| !m.is_valid(h)));
        let h = m.insert(DropCounter(drops.clone())).unwrap();
        assert_eq!(h.index(), 0);
        assert_eq!(h.generation(), 1);
        assert_eq!(alloc.allocated.get(), 4);
    }

    /// Invariant: dropping the map returns every page buffer to its allocator.
    #[test]
    fn drop_returns_storage() {
        let alloc = CountingAllocator::default();
        {
            let mut m: PagedSlotMap<u32, 4, 32, 8, CountingAllocator> =
                PagedSlotMap::with_allocator(alloc.clone());
            for v in 0..9 {
                m.insert(v).unwrap();
            }
            assert_eq!(m.page_count(), 3);
        }
        assert_eq!(alloc.allocated.get(), 6);
        assert_eq!(alloc.deallocated.get(), 6);
    }

    /// Invariant: `Debug` renders handle-to-value pairs in chain order.
    #[test]
    fn debug_lists_entries() {
        let mut m: Map<u32> = Map::new();
        m.insert(5).unwrap();
        assert_eq!(format!("{:?}", m), "{Handle { index: 0, generation: 0 }: 5}");
    }
}
