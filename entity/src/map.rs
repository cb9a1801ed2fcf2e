//! Secondary, densely indexed side tables keyed by entity references.

use crate::iter::{Iter, IterMut};
use crate::keys::Keys;
use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A mapping `K -> V` for densely indexed entity references.
///
/// Unlike [`PrimaryMap`](crate::PrimaryMap), a `SecondaryMap` cannot allocate new entity
/// references; it only attaches side information (liveness, register assignment, source
/// location, ...) to entities already minted elsewhere. Reading an untouched key returns the
/// map's default value rather than `None` or panicking, which matches the way every pass in this
/// crate treats "no info recorded yet" as a valid, cheap default.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    /// Create a new empty map using `V::default()` as the fill value.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    /// Create a new empty map with an explicit default value.
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    /// Number of elements actually stored (not the key space).
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Is this map completely empty?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Get the element at `k`, if it has been written past the current length.
    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    /// Clear all recorded entries (reads afterwards return the default again).
    pub fn clear(&mut self) {
        self.elems.clear();
    }

    /// Iterate over the recorded keys and values.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.elems.iter())
    }

    /// Iterate over the recorded keys and values, mutably.
    pub fn iter_mut(&mut self) -> IterMut<K, V> {
        IterMut::new(self.elems.iter_mut())
    }

    /// Iterate over the recorded keys.
    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.elems.len())
    }

    /// Grow the backing storage to `n` entries, filling new slots with the default.
    pub fn resize(&mut self, n: usize) {
        self.elems.resize(n, self.default.clone());
    }
}

impl<K, V> Default for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Index<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k).unwrap_or(&self.default)
    }
}

impl<K, V> IndexMut<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    fn index_mut(&mut self, k: K) -> &mut V {
        let i = k.index();
        if i >= self.elems.len() {
            self.resize(i + 1);
        }
        &mut self.elems[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_impl;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    struct E(u32);
    entity_impl!(E, "e");

    #[test]
    fn default_fill() {
        let mut m: SecondaryMap<E, i32> = SecondaryMap::new();
        let e5 = E::new(5);
        m[e5] = 9;
        assert_eq!(m[E::new(0)], 0);
        assert_eq!(m[e5], 9);
        assert_eq!(m.len(), 6);
    }

    #[test]
    fn custom_default() {
        let m: SecondaryMap<E, bool> = SecondaryMap::with_default(true);
        assert_eq!(m[E::new(40)], true);
    }
}
