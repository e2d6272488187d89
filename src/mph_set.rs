//! MphSet: an immutable set of `N` values backed by [`MphBase`].

use crate::mph::{DefaultKeyEqual, Identity, KeyEqual, MphBase, RapidSaltedHash, SaltedHash};
use core::fmt;

pub struct MphSet<V, const N: usize, H = RapidSaltedHash, Q = DefaultKeyEqual> {
    base: MphBase<V, N, Identity, H, Q>,
}

impl<V, const N: usize, H, Q> MphSet<V, N, H, Q>
where
    H: SaltedHash<V>,
    Q: KeyEqual<V>,
{
    /// Build the set. Values must be distinct.
    pub fn new(values: [V; N]) -> Self {
        Self {
            base: MphBase::new(values),
        }
    }

    #[inline]
    pub fn contains(&self, value: &V) -> bool {
        self.base.contains(value)
    }

    /// The stored value equal to `value`, if any.
    #[inline]
    pub fn get(&self, value: &V) -> Option<&V> {
        self.base.find(value)
    }
}

impl<V, const N: usize, H, Q> MphSet<V, N, H, Q> {
    /// See [`MphBase::from_raw_parts`].
    pub const fn from_raw_parts(values: [V; N], salts: [i32; N]) -> Self {
        Self {
            base: MphBase::from_raw_parts(values, salts),
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Values in slot order, which is unrelated to insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, V> {
        self.base.iter()
    }

    pub const fn as_slice(&self) -> &[V] {
        self.base.as_slice()
    }

    pub const fn salts(&self) -> &[i32; N] {
        self.base.salts()
    }
}

impl<V: fmt::Debug, const N: usize, H, Q> fmt::Debug for MphSet<V, N, H, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, V, const N: usize, H, Q> IntoIterator for &'a MphSet<V, N, H, Q> {
    type Item = &'a V;
    type IntoIter = core::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
