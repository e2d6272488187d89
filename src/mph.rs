//! MphBase: a minimal perfect hash table over a fixed array of `N` entries.
//!
//! Construction groups entries into `N` buckets by hashing their keys with
//! [`PRIMARY_SALT`]. Buckets with several members are placed first, largest
//! first: for each, salts `0, 1, 2, ...` are tried until every member hashes
//! to a distinct free slot. Single-member buckets then take the remaining
//! free slots in order, and their salt entry stores the slot directly as
//! `-(slot + 1)`.
//!
//! A lookup is therefore one or two hashes, one salt read and one key
//! comparison, without probing. Keys outside the build set are rejected by
//! that comparison.
//!
//! The salt search is unbounded: keys that collide under every salt (for
//! example, duplicate keys) make construction run until the `i32` salt space
//! is exhausted and then panic.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use tracing::debug;

/// Salt used to assign keys to buckets. Secondary salts are small integers
/// starting at 0.
pub const PRIMARY_SALT: u64 = 0x243f_6a88_85a3_08d3;

/// A family of hash functions indexed by a salt.
///
/// Implementations must be deterministic and should be stateless; the table
/// creates one with `Default` whenever it needs to hash.
pub trait SaltedHash<K: ?Sized>: Default {
    fn hash_with_salt(&self, key: &K, salt: u64) -> u64;
}

/// [`SaltedHash`] for any `K: Hash`, seeding rapidhash with the salt.
#[derive(Clone, Copy, Debug, Default)]
pub struct RapidSaltedHash;

impl<K: ?Sized + Hash> SaltedHash<K> for RapidSaltedHash {
    #[inline]
    fn hash_with_salt(&self, key: &K, salt: u64) -> u64 {
        let mut state = rapidhash::RapidHasher::new(salt);
        key.hash(&mut state);
        state.finish()
    }
}

/// Key comparison used to confirm a lookup.
pub trait KeyEqual<K: ?Sized>: Default {
    fn equal(&self, a: &K, b: &K) -> bool;
}

/// [`KeyEqual`] through `PartialEq`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyEqual;

impl<K: ?Sized + PartialEq> KeyEqual<K> for DefaultKeyEqual {
    #[inline]
    fn equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// How to find the key inside a stored entry.
pub trait KeyOf<E> {
    type Key: ?Sized;

    fn key_of(entry: &E) -> &Self::Key;
}

/// The entry is its own key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<E> KeyOf<E> for Identity {
    type Key = E;

    #[inline]
    fn key_of(entry: &E) -> &E {
        entry
    }
}

/// The key is the first element of a pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct First;

impl<K, V> KeyOf<(K, V)> for First {
    type Key = K;

    #[inline]
    fn key_of(entry: &(K, V)) -> &K {
        &entry.0
    }
}

pub struct MphBase<E, const N: usize, X, H = RapidSaltedHash, Q = DefaultKeyEqual> {
    storage: [E; N],
    salts: [i32; N],
    _policy: PhantomData<fn() -> (X, H, Q)>,
}

impl<E, const N: usize, X, H, Q> MphBase<E, N, X, H, Q>
where
    X: KeyOf<E>,
    H: SaltedHash<X::Key>,
    Q: KeyEqual<X::Key>,
{
    const SIZE_OK: () = assert!(
        N <= i32::MAX as usize,
        "slot indices must fit the negative range of an i32 salt"
    );

    /// Build the table, permuting `entries` into their final slots.
    ///
    /// Keys must be distinct; see the module docs for what happens otherwise.
    pub fn new(entries: [E; N]) -> Self {
        let () = Self::SIZE_OK;
        let hasher = H::default();
        let placement = place(&entries, |entry, salt| {
            hasher.hash_with_salt(X::key_of(entry), salt)
        });

        let mut entry_at = [0usize; N];
        for (entry, &slot) in placement.slot_of.iter().enumerate() {
            entry_at[slot] = entry;
        }
        let mut pending = entries.map(Some);
        let storage = core::array::from_fn(|slot| {
            pending[entry_at[slot]]
                .take()
                .expect("placement must assign each entry exactly one slot")
        });
        let salts = core::array::from_fn(|bucket| placement.salts[bucket]);
        Self::from_raw_parts(storage, salts)
    }

    /// Slot holding `key`, if it is in the table.
    #[inline]
    pub fn position(&self, key: &X::Key) -> Option<usize> {
        if N == 0 {
            return None;
        }
        let hasher = H::default();
        let bucket = reduce(hasher.hash_with_salt(key, PRIMARY_SALT), N);
        let salt = self.salts[bucket];
        let slot = if salt < 0 {
            (-(salt + 1)) as usize
        } else {
            reduce(hasher.hash_with_salt(key, salt as u64), N)
        };
        let candidate = self.storage.get(slot)?;
        Q::default()
            .equal(X::key_of(candidate), key)
            .then_some(slot)
    }

    #[inline]
    pub fn find(&self, key: &X::Key) -> Option<&E> {
        self.position(key).and_then(|slot| self.storage.get(slot))
    }

    /// Mutable access to an entry. Callers must not change its key.
    #[inline]
    pub fn find_mut(&mut self, key: &X::Key) -> Option<&mut E> {
        let slot = self.position(key)?;
        self.storage.get_mut(slot)
    }

    #[inline]
    pub fn contains(&self, key: &X::Key) -> bool {
        self.position(key).is_some()
    }
}

impl<E, const N: usize, X, H, Q> MphBase<E, N, X, H, Q> {
    /// Assemble a table from the output of [`as_slice`](Self::as_slice) and
    /// [`salts`](Self::salts) of a table built with the same policies, e.g.
    /// to place it in a `const`.
    pub const fn from_raw_parts(storage: [E; N], salts: [i32; N]) -> Self {
        Self {
            storage,
            salts,
            _policy: PhantomData,
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Entries in slot order.
    pub const fn as_slice(&self) -> &[E] {
        &self.storage
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [E] {
        &mut self.storage
    }

    /// Per-bucket salts: non-negative values are secondary salts, negative
    /// values `v` place the bucket's only entry in slot `-v - 1`.
    pub const fn salts(&self) -> &[i32; N] {
        &self.salts
    }

    pub fn iter(&self) -> core::slice::Iter<'_, E> {
        self.storage.iter()
    }
}

impl<E: fmt::Debug, const N: usize, X, H, Q> fmt::Debug for MphBase<E, N, X, H, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MphBase")
            .field("storage", &self.storage)
            .field("salts", &self.salts)
            .finish()
    }
}

impl<'a, E, const N: usize, X, H, Q> IntoIterator for &'a MphBase<E, N, X, H, Q> {
    type Item = &'a E;
    type IntoIter = core::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[inline]
fn reduce(hash: u64, n: usize) -> usize {
    (hash % n as u64) as usize
}

struct Placement {
    /// Final slot of each entry, by input position.
    slot_of: Vec<usize>,
    /// Salt of each bucket.
    salts: Vec<i32>,
}

fn place<E>(entries: &[E], hash: impl Fn(&E, u64) -> u64) -> Placement {
    let n = entries.len();
    let mut placement = Placement {
        slot_of: vec![0; n],
        salts: vec![0; n],
    };
    if n == 0 {
        return placement;
    }

    // Bucket members as singly-linked lists threaded through `next`.
    let mut head: Vec<Option<usize>> = vec![None; n];
    let mut next: Vec<Option<usize>> = vec![None; n];
    let mut count = vec![0usize; n];
    for (i, entry) in entries.iter().enumerate() {
        let bucket = reduce(hash(entry, PRIMARY_SALT), n);
        next[i] = head[bucket];
        head[bucket] = Some(i);
        count[bucket] += 1;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| count[b].cmp(&count[a]));

    let mut taken = vec![false; n];
    let mut tentative = Vec::new();
    let mut max_salt = 0;
    for &bucket in order.iter().take_while(|&&bucket| count[bucket] >= 2) {
        let salt = (0..=i32::MAX)
            .find(|&salt| {
                tentative.clear();
                let mut member = head[bucket];
                while let Some(i) = member {
                    let slot = reduce(hash(&entries[i], salt as u64), n);
                    if taken[slot] {
                        for &slot in &tentative {
                            taken[slot] = false;
                        }
                        return false;
                    }
                    taken[slot] = true;
                    tentative.push(slot);
                    placement.slot_of[i] = slot;
                    member = next[i];
                }
                true
            })
            .expect("no salt separates this bucket; are the keys distinct?");
        placement.salts[bucket] = salt;
        max_salt = max_salt.max(salt);
    }

    let mut cursor = 0;
    let mut singletons = 0usize;
    for &bucket in order.iter().filter(|&&bucket| count[bucket] == 1) {
        while taken[cursor] {
            cursor += 1;
        }
        taken[cursor] = true;
        let member = head[bucket].expect("bucket with one member has a head");
        placement.slot_of[member] = cursor;
        placement.salts[bucket] = -(cursor as i32) - 1;
        singletons += 1;
    }

    debug!(
        entries = n,
        largest_bucket = count[order[0]],
        max_salt,
        singletons,
        "built minimal perfect hash table"
    );
    placement
}
