//! A mutable forward multimap with address-stable buckets.
//!
//! Every key owns a [`Bucket`], a chain of blocks whose capacities double (1, 2, 4,
//! ...). A push that fills the last block links a fresh one instead of reallocating,
//! so references to elements stay valid across pushes. All blocks but the last are
//! full, which keeps positional access O(1).
//!
//! The archived form is an [`ArchivedVecVec`]: buckets are flattened key by key.

use crate::archive::Archive;
use crate::containers::vecvec::ArchivedVecVec;
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use crate::strong::RowKey;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut, Index};

/// The values of one key.
pub struct Bucket<V> {
    blocks: Vec<Vec<V>>,
    len: usize,
}

/// Block and offset of element `index` when block `b` holds `1 << b` elements.
fn locate(index: usize) -> (usize, usize) {
    let n = index + 1;
    let block = (usize::BITS - 1 - n.leading_zeros()) as usize;
    (block, n - (1 << block))
}

impl<V> Bucket<V> {
    /// An empty bucket.
    pub const fn new() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the bucket holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of linked blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The value at `index`.
    pub fn get(&self, index: usize) -> Option<&V> {
        if index >= self.len {
            return None;
        }
        let (block, offset) = locate(index);
        self.blocks.get(block)?.get(offset)
    }

    /// The value at `index`, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        if index >= self.len {
            return None;
        }
        let (block, offset) = locate(index);
        self.blocks.get_mut(block)?.get_mut(offset)
    }

    /// The first value.
    pub fn first(&self) -> Option<&V> {
        self.get(0)
    }

    /// The last value.
    pub fn last(&self) -> Option<&V> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Appends `value`; earlier values never move.
    pub fn push(&mut self, value: V) -> &mut V {
        let full = match self.blocks.last() {
            Some(block) => block.len() == 1 << (self.blocks.len() - 1),
            None => true,
        };
        if full {
            let capacity = 1 << self.blocks.len();
            self.blocks.push(Vec::with_capacity(capacity));
        }
        self.len += 1;
        let index = self.blocks.len() - 1;
        let block = &mut self.blocks[index];
        block.push(value);
        let last = block.len() - 1;
        &mut block[last]
    }

    /// Removes and returns the last value.
    pub fn pop(&mut self) -> Option<V> {
        let block = self.blocks.last_mut()?;
        let value = block.pop();
        if block.is_empty() {
            self.blocks.pop();
        }
        if value.is_some() {
            self.len -= 1;
        }
        value
    }

    /// Inserts `value` at `at`, shifting later values back. Gives the value back if
    /// `at > len()`.
    pub fn insert(&mut self, at: usize, value: V) -> std::result::Result<(), V> {
        if at > self.len {
            return Err(value);
        }
        let mut carry = value;
        for i in at..self.len {
            if let Some(slot) = self.get_mut(i) {
                carry = std::mem::replace(slot, carry);
            }
        }
        self.push(carry);
        Ok(())
    }

    /// Removes the value at `at`, shifting later values forward.
    pub fn remove(&mut self, at: usize) -> Option<V> {
        if at >= self.len {
            return None;
        }
        let mut carry = self.pop()?;
        for i in (at..self.len).rev() {
            if let Some(slot) = self.get_mut(i) {
                carry = std::mem::replace(slot, carry);
            }
        }
        Some(carry)
    }

    /// Keeps only the values for which `keep` returns true, in order.
    pub fn retain<F: FnMut(&V) -> bool>(&mut self, mut keep: F) {
        let blocks = std::mem::take(&mut self.blocks);
        self.len = 0;
        for value in blocks.into_iter().flatten() {
            if keep(&value) {
                self.push(value);
            }
        }
    }

    /// Truncates to `len` values or appends clones of `fill` up to it.
    pub fn resize(&mut self, len: usize, fill: V)
    where
        V: Clone,
    {
        while self.len > len {
            self.pop();
        }
        while self.len < len {
            self.push(fill.clone());
        }
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }

    /// Iterates over the values in order.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.blocks.iter().flatten()
    }

    /// Iterates mutably over the values in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.blocks.iter_mut().flatten()
    }
}

impl<V> Default for Bucket<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Bucket<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<V: PartialEq> PartialEq for Bucket<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<V> Index<usize> for Bucket<V> {
    type Output = V;

    fn index(&self, index: usize) -> &V {
        let (block, offset) = locate(index);
        &self.blocks[block][offset]
    }
}

/// Buckets of `V` addressed by a dense key `K`.
pub struct MutableMultimap<K, V> {
    buckets: Vec<Bucket<V>>,
    elements: usize,
    _key: PhantomData<fn() -> K>,
}

/// Mutable access to one bucket of a [`MutableMultimap`].
///
/// The map's element count is brought up to date when the guard is dropped.
pub struct BucketMut<'m, V> {
    bucket: &'m mut Bucket<V>,
    elements: &'m mut usize,
    before: usize,
}

impl<'m, V> BucketMut<'m, V> {
    fn new(bucket: &'m mut Bucket<V>, elements: &'m mut usize) -> Self {
        let before = bucket.len();
        Self {
            bucket,
            elements,
            before,
        }
    }
}

impl<V> Deref for BucketMut<'_, V> {
    type Target = Bucket<V>;

    fn deref(&self) -> &Bucket<V> {
        self.bucket
    }
}

impl<V> DerefMut for BucketMut<'_, V> {
    fn deref_mut(&mut self) -> &mut Bucket<V> {
        self.bucket
    }
}

impl<V> Drop for BucketMut<'_, V> {
    fn drop(&mut self) {
        *self.elements = *self.elements - self.before + self.bucket.len();
    }
}

impl<K: RowKey, V> MutableMultimap<K, V> {
    /// An empty multimap.
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            elements: 0,
            _key: PhantomData,
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of values across all keys.
    pub fn element_count(&self) -> usize {
        self.elements
    }

    fn bucket_at(&mut self, key: K) -> &mut Bucket<V> {
        let index = key.index();
        if index >= self.buckets.len() {
            self.buckets.resize_with(index + 1, Bucket::new);
        }
        &mut self.buckets[index]
    }

    /// The bucket of `key`, adding empty buckets up to it if needed.
    pub fn entry(&mut self, key: K) -> BucketMut<'_, V> {
        let index = key.index();
        if index >= self.buckets.len() {
            self.buckets.resize_with(index + 1, Bucket::new);
        }
        BucketMut::new(&mut self.buckets[index], &mut self.elements)
    }

    /// Appends `value` to the bucket of `key`.
    pub fn push(&mut self, key: K, value: V) -> &mut V {
        self.elements += 1;
        self.bucket_at(key).push(value)
    }

    /// The bucket of `key`, if the key exists.
    pub fn get(&self, key: K) -> Option<&Bucket<V>> {
        self.buckets.get(key.index())
    }

    /// The bucket of `key`, mutably.
    pub fn get_mut(&mut self, key: K) -> Option<BucketMut<'_, V>> {
        let bucket = self.buckets.get_mut(key.index())?;
        Some(BucketMut::new(bucket, &mut self.elements))
    }

    /// The bucket of the first key.
    pub fn front(&self) -> Option<&Bucket<V>> {
        self.buckets.first()
    }

    /// The bucket of the last key.
    pub fn back(&self) -> Option<&Bucket<V>> {
        self.buckets.last()
    }

    /// Truncates to `keys` keys or appends empty buckets up to it.
    pub fn resize(&mut self, keys: usize) {
        let dropped: usize = self.buckets.iter().skip(keys).map(Bucket::len).sum();
        self.elements -= dropped;
        self.buckets.resize_with(keys, Bucket::new);
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.elements = 0;
    }

    /// Iterates over `(key, bucket)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (K, &Bucket<V>)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| (K::from_index(i), bucket))
    }
}

impl<K: RowKey, V> Default for MutableMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RowKey, V: fmt::Debug> fmt::Debug for MutableMultimap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.buckets.iter()).finish()
    }
}

impl<K: RowKey, V> Index<K> for MutableMultimap<K, V> {
    type Output = Bucket<V>;

    fn index(&self, key: K) -> &Bucket<V> {
        &self.buckets[key.index()]
    }
}

impl<K: RowKey, V: Archive> Archive for MutableMultimap<K, V> {
    type Archived = ArchivedVecVec<K, V::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        let mut starts = Vec::with_capacity(self.buckets.len() + 1);
        let mut items = Vec::new();
        starts.push(0u64);
        for bucket in &self.buckets {
            items.extend(bucket.iter());
            starts.push(items.len() as u64);
        }
        ArchivedVecVec::<K, V::Archived>::serialize_parts(&starts, &items, serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("vecvec");
        hasher.visit::<V>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, deserialize_mut, serialize, Mode};

    #[test]
    fn blocks_double_and_addresses_stay_put() {
        let mut bucket = Bucket::new();
        let first: *const u32 = bucket.push(0);
        for i in 1..10u32 {
            bucket.push(i);
        }
        assert_eq!(bucket.block_count(), 4);
        assert!(std::ptr::eq(first, &bucket[0]));
        assert_eq!(bucket.get(9), Some(&9));
        assert_eq!(bucket.last(), Some(&9));
        assert_eq!(locate(6), (2, 3));
    }

    #[test]
    fn positional_edits_keep_order() {
        let mut bucket = Bucket::new();
        for i in [1, 2, 4] {
            bucket.push(i);
        }
        assert!(bucket.insert(2, 3).is_ok());
        assert_eq!(bucket.insert(9, 0), Err(0));
        assert_eq!(bucket.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4]);
        assert_eq!(bucket.remove(0), Some(1));
        bucket.retain(|v| v % 2 == 0);
        assert_eq!(bucket.iter().copied().collect::<Vec<_>>(), [2, 4]);
        bucket.resize(4, 7);
        assert_eq!(bucket.pop(), Some(7));
        assert_eq!(bucket.len(), 3);
    }

    #[test]
    fn entry_grows_the_key_range() -> Result<()> {
        let mut map = MutableMultimap::<u32, u64>::new();
        map.push(2, 20);
        map.push(0, 1);
        map.entry(2).push(21);
        assert_eq!(map.len(), 3);
        assert_eq!(map.element_count(), 3);
        assert!(map[1].is_empty());
        assert_eq!(map.back().and_then(Bucket::first), Some(&20));

        let bytes = serialize(&map, Mode::DEEP_CHECK)?;
        let archived = deserialize::<MutableMultimap<u32, u64>>(&bytes, Mode::DEEP_CHECK)?;
        assert_eq!(archived.get(0), Some(&[1u64][..]));
        assert_eq!(archived.get(1), Some(&[][..]));
        assert_eq!(archived.get(2), Some(&[20u64, 21][..]));
        Ok(())
    }

    #[test]
    fn element_count_follows_bucket_edits() {
        let mut map = MutableMultimap::<u32, u32>::new();
        for i in 0..6 {
            map.push(i % 3, i);
        }
        assert_eq!(map.element_count(), 6);

        if let Some(mut bucket) = map.get_mut(1) {
            bucket.retain(|v| *v > 1);
            bucket.push(10);
            bucket.push(11);
        }
        assert_eq!(map.element_count(), 7);

        map.entry(0).clear();
        assert_eq!(map.element_count(), 5);
        map.entry(5).push(50);
        assert_eq!(map.element_count(), 6);

        map.resize(2);
        assert_eq!(map.element_count(), 3);
        map.clear();
        assert_eq!(map.element_count(), 0);
    }

    #[test]
    fn foreign_byte_order_round_trips() -> Result<()> {
        let mut map = MutableMultimap::<u32, String>::new();
        map.push(1, "one".into());
        map.push(1, "uno".into());
        map.push(3, "three".into());
        let foreign = if cfg!(target_endian = "little") {
            Mode::SERIALIZE_BIG_ENDIAN
        } else {
            Mode::NONE
        };
        let mut bytes = serialize(&map, foreign | Mode::WITH_INTEGRITY)?;
        let archived =
            deserialize_mut::<MutableMultimap<u32, String>>(&mut bytes, foreign | Mode::WITH_INTEGRITY)?;
        assert_eq!(archived.len(), 4);
        assert_eq!(archived.get(1).map(<[_]>::len), Some(2));
        assert_eq!(archived.get(3).and_then(<[_]>::first).map(|s| s.as_str()), Some("three"));
        Ok(())
    }
}
