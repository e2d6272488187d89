#![cfg(test)]

// Property tests for PagedSlotMap kept inside the crate so they can check
// page-level bookkeeping alongside the public behaviour.

use crate::handle::Handle;
use crate::paged_slot_map::PagedSlotMap;
use proptest::prelude::*;
use slotmap::{DefaultKey, SlotMap};
use std::collections::BTreeSet;

const P: usize = 4;

type Sut = PagedSlotMap<i32, P>;

// Ops refer to live entries by position in the tracked list, so they shrink
// toward earlier entries.
#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    Remove(usize),
    RemoveStale(usize),
    Lookup(usize),
    Mutate(usize, i32),
    Iterate,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => any::<i32>().prop_map(Op::Insert),
        3 => any::<usize>().prop_map(Op::Remove),
        1 => any::<usize>().prop_map(Op::RemoveStale),
        2 => any::<usize>().prop_map(Op::Lookup),
        1 => (any::<usize>(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..120)
}

// Property: state-machine equivalence against slotmap::SlotMap.
// Invariants exercised across random operation sequences:
// - Live handles resolve to the value the model holds for them.
// - `remove` returns the stored value and invalidates every copy of the handle.
// - Removing a stale handle changes nothing.
// - Iteration yields each live entry once, and backward is forward reversed.
// - `len` parity, and `len <= capacity == page_count * P` after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        let mut sut = Sut::new();
        let mut model: SlotMap<DefaultKey, i32> = SlotMap::new();
        let mut live: Vec<(Handle, DefaultKey)> = Vec::new();
        let mut stale: Vec<Handle> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let h = sut.insert(v).expect("32-bit handles do not run out here");
                    prop_assert!(!h.is_null());
                    prop_assert!(live.iter().all(|&(other, _)| other != h));
                    let k = model.insert(v);
                    live.push((h, k));
                }
                Op::Remove(i) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, k) = live.swap_remove(i % live.len());
                    let got = sut.remove(h);
                    prop_assert_eq!(got, model.remove(k));
                    prop_assert!(!sut.is_valid(h));
                    stale.push(h);
                }
                Op::RemoveStale(i) => {
                    if stale.is_empty() {
                        continue;
                    }
                    let h = stale[i % stale.len()];
                    let before: BTreeSet<_> = sut.iter().map(|(h, &v)| (h, v)).collect();
                    prop_assert_eq!(sut.remove(h), None);
                    sut.erase(h);
                    let after: BTreeSet<_> = sut.iter().map(|(h, &v)| (h, v)).collect();
                    prop_assert_eq!(before, after);
                }
                Op::Lookup(i) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, k) = live[i % live.len()];
                    prop_assert_eq!(sut.lookup(h), model.get(k));
                }
                Op::Mutate(i, d) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, k) = live[i % live.len()];
                    let v = sut.lookup_mut(h).expect("live handle should resolve");
                    *v = v.wrapping_add(d);
                    let m = model.get_mut(k).expect("model tracks live key");
                    *m = m.wrapping_add(d);
                }
                Op::Iterate => {
                    let forward: Vec<_> = sut.iter().map(|(h, &v)| (h, v)).collect();
                    let mut backward: Vec<_> = sut.iter().rev().map(|(h, &v)| (h, v)).collect();
                    backward.reverse();
                    prop_assert_eq!(&forward, &backward);

                    let got: BTreeSet<_> = forward.iter().copied().collect();
                    let want: BTreeSet<_> = live
                        .iter()
                        .map(|&(h, k)| (h, model[k]))
                        .collect();
                    prop_assert_eq!(got, want);

                    let mut via_mut = 0;
                    for (h, v) in sut.iter_mut() {
                        prop_assert!(live.iter().any(|&(lh, k)| lh == h && model[k] == *v));
                        via_mut += 1;
                    }
                    prop_assert_eq!(via_mut, live.len());
                }
                Op::Clear => {
                    let pages = sut.page_count();
                    sut.clear();
                    model.clear();
                    stale.extend(live.drain(..).map(|(h, _)| h));
                    prop_assert_eq!(sut.page_count(), pages);
                }
            }

            // Post-conditions after each op
            for &h in &stale {
                if !live.iter().any(|&(lh, _)| lh == h) {
                    prop_assert!(sut.lookup(h).is_none());
                }
            }
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            prop_assert_eq!(sut.capacity(), sut.page_count() * P);
            prop_assert!(sut.len() <= sut.capacity());
            prop_assert_eq!(sut.iter().len(), sut.len());
        }
    }
}

// Narrow generations wrap quickly, so a stale handle may legitimately match
// a later occupant of the same slot. Only the bookkeeping is checked here.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_bookkeeping_with_narrow_generations(ops in arb_ops()) {
        let mut sut: PagedSlotMap<i32, P, 16, 2> = PagedSlotMap::new();
        let mut live: Vec<(Handle<16, 2>, i32)> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let h = sut.insert(v).expect("16-bit handles do not run out here");
                    live.push((h, v));
                }
                Op::Remove(i) | Op::RemoveStale(i) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, v) = live.swap_remove(i % live.len());
                    prop_assert_eq!(sut.remove(h), Some(v));
                }
                Op::Lookup(i) | Op::Mutate(i, _) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, v) = live[i % live.len()];
                    prop_assert_eq!(sut.lookup(h), Some(&v));
                }
                Op::Iterate => {
                    let got: BTreeSet<_> = sut.iter().map(|(h, &v)| (h, v)).collect();
                    let want: BTreeSet<_> = live.iter().copied().collect();
                    prop_assert_eq!(got, want);
                }
                Op::Clear => {
                    sut.clear();
                    live.clear();
                }
            }
            prop_assert_eq!(sut.len(), live.len());
            prop_assert_eq!(sut.capacity(), sut.page_count() * P);
        }
    }
}
