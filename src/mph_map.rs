//! MphMap: an immutable-keyed map of `N` pairs backed by [`MphBase`].
//!
//! Keys are fixed at construction; values can be changed in place.

use crate::mph::{DefaultKeyEqual, First, KeyEqual, MphBase, RapidSaltedHash, SaltedHash};
use core::fmt;
use core::iter::FusedIterator;
use core::ops::Index;

pub struct MphMap<K, V, const N: usize, H = RapidSaltedHash, Q = DefaultKeyEqual> {
    base: MphBase<(K, V), N, First, H, Q>,
}

impl<K, V, const N: usize, H, Q> MphMap<K, V, N, H, Q>
where
    H: SaltedHash<K>,
    Q: KeyEqual<K>,
{
    /// Build the map. Keys must be distinct.
    pub fn new(entries: [(K, V); N]) -> Self {
        Self {
            base: MphBase::new(entries),
        }
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.base.find(key).map(|(_, v)| v)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.base.find_mut(key).map(|(_, v)| v)
    }

    #[inline]
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.base.find(key).map(|(k, v)| (k, v))
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.base.contains(key)
    }
}

impl<K, V, const N: usize, H, Q> MphMap<K, V, N, H, Q> {
    /// See [`MphBase::from_raw_parts`].
    pub const fn from_raw_parts(entries: [(K, V); N], salts: [i32; N]) -> Self {
        Self {
            base: MphBase::from_raw_parts(entries, salts),
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.base.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.base.as_mut_slice().iter_mut().map(|(_, v)| v)
    }

    pub const fn as_slice(&self) -> &[(K, V)] {
        self.base.as_slice()
    }

    pub const fn salts(&self) -> &[i32; N] {
        self.base.salts()
    }
}

impl<K, V, const N: usize, H, Q> Index<&K> for MphMap<K, V, N, H, Q>
where
    H: SaltedHash<K>,
    Q: KeyEqual<K>,
{
    type Output = V;

    /// Panics if `key` is not in the map.
    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not present in MphMap")
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, H, Q> fmt::Debug for MphMap<K, V, N, H, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, const N: usize, H, Q> IntoIterator for &'a MphMap<K, V, N, H, Q> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(&K, &V)` pairs of an [`MphMap`].
#[derive(Clone, Debug)]
pub struct Iter<'a, K, V> {
    inner: core::slice::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v)| (k, v))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn planets() -> MphMap<&'static str, u32, 4> {
        MphMap::new([("mercury", 1), ("venus", 2), ("earth", 3), ("mars", 4)])
    }

    /// Invariant: every key maps to the value it was built with.
    #[test]
    fn lookups() {
        let m = planets();
        assert_eq!(m.get(&"earth"), Some(&3));
        assert_eq!(m.get_key_value(&"mars"), Some((&"mars", &4)));
        assert_eq!(m[&"venus"], 2);
        assert!(m.contains_key(&"mercury"));
        assert!(!m.contains_key(&"pluto"));
        assert_eq!(m.get(&"pluto"), None);
    }

    /// Invariant: values change in place while keys stay findable.
    #[test]
    fn values_are_mutable() {
        let mut m = planets();
        *m.get_mut(&"earth").unwrap() = 30;
        assert_eq!(m[&"earth"], 30);
        assert!(m.get_mut(&"pluto").is_none());
        for v in m.values_mut() {
            *v += 100;
        }
        assert_eq!(m[&"mercury"], 101);
        assert_eq!(m[&"earth"], 130);
    }

    /// Invariant: keys, values and pairs all cover the full map.
    #[test]
    fn iteration() {
        let m = planets();
        let mut keys: Vec<_> = m.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["earth", "mars", "mercury", "venus"]);
        assert_eq!(m.values().sum::<u32>(), 10);
        assert_eq!(m.iter().len(), 4);
        let forward: Vec<_> = m.iter().collect();
        let mut backward: Vec<_> = m.iter().rev().collect();
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!((&m).into_iter().count(), 4);
    }

    /// Invariant: indexing with an absent key panics.
    #[test]
    #[should_panic(expected = "key not present")]
    fn index_missing_key_panics() {
        let m = planets();
        let _value: u32 = m[&"pluto"];
    }

    /// Invariant: `Debug` renders as a map of key to value.
    #[test]
    fn debug_is_a_map() {
        let m = MphMap::<u8, char, 1>::new([(1, 'a')]);
        assert_eq!(format!("{m:?}"), "{1: 'a'}");
    }
}
