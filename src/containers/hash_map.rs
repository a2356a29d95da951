//! Open-addressing hash map and set with a stable, relocatable archived form.
//!
//! The owned [`HashMap`] keeps one control byte per slot (7 bits of hash for full
//! slots, or an empty/deleted marker), probes linearly and doubles its power-of-two
//! capacity at a load factor of 7/8. Keys hash through
//! [`crate::hashing::FnvHasher`], so any key type with a derived `Hash` works and the
//! hash values are the same on every host.
//!
//! The archived form, [`ArchivedHashMap`], stores the entries densely and adds an
//! index table built at serialize time with the same hash function. Lookups in the
//! archive hash the query value exactly like the owned map hashed the key.

use crate::archive::{Archive, Verify};
use crate::containers::vec::ArchivedVec;
use crate::de::{EndianFixup, Validator};
use crate::error::Result;
use crate::fingerprint::TypeHasher;
use crate::hashing::hash;
use crate::impls::archived_len;
use crate::io::Target;
use crate::ser::Serializer;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem::offset_of;
use std::ops::Index;

const EMPTY: u8 = 0x80;
const DELETED: u8 = 0xFE;
const MIN_CAPACITY: usize = 8;

/// Marker for an unused slot in the archived index table.
pub const INDEX_EMPTY: u32 = u32::MAX;

fn h2(hash: u64) -> u8 {
    (hash >> 57) as u8
}

fn capacity_for(len: usize) -> usize {
    (len.saturating_mul(8).div_ceil(7))
        .next_power_of_two()
        .max(MIN_CAPACITY)
}

/// An open-addressing hash map.
pub struct HashMap<K, V> {
    ctrl: Vec<u8>,
    slots: Vec<Option<(K, V)>>,
    len: usize,
    tombstones: usize,
}

impl<K, V> HashMap<K, V> {
    /// An empty map; allocates on first insert.
    pub const fn new() -> Self {
        Self {
            ctrl: Vec::new(),
            slots: Vec::new(),
            len: 0,
            tombstones: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.ctrl.len()
    }

    /// Removes every entry, keeping the slots.
    pub fn clear(&mut self) {
        self.ctrl.fill(EMPTY);
        self.slots.iter_mut().for_each(|s| *s = None);
        self.len = 0;
        self.tombstones = 0;
    }

    /// Iterates over the entries in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    /// Iterates over the entries with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.as_mut().map(|(k, v)| (&*k, v)))
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Iterates over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Iterates over the values mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.iter_mut().map(|(_, v)| v)
    }

    /// A cursor over the slots that can remove the current entry.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut { map: self, pos: 0 }
    }

    fn erase_slot(&mut self, i: usize) -> Option<(K, V)> {
        let entry = self.slots.get_mut(i)?.take()?;
        let mask = self.ctrl.len() - 1;
        if self.ctrl[(i + 1) & mask] == EMPTY {
            self.ctrl[i] = EMPTY;
        } else {
            self.ctrl[i] = DELETED;
            self.tombstones += 1;
        }
        self.len -= 1;
        Some(entry)
    }
}

impl<K: Hash + Eq, V> HashMap<K, V> {
    /// An empty map with room for `n` entries before growing.
    pub fn with_capacity(n: usize) -> Self {
        let mut map = Self::new();
        if n > 0 {
            map.rehash(capacity_for(n));
        }
        map
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let cap = self.ctrl.len();
        if cap == 0 {
            return None;
        }
        let mask = cap - 1;
        let tag = h2(hash);
        let mut i = hash as usize & mask;
        for _ in 0..cap {
            match self.ctrl[i] {
                EMPTY => return None,
                c if c == tag => {
                    if let Some((k, _)) = &self.slots[i] {
                        if k.borrow() == key {
                            return Some(i);
                        }
                    }
                }
                _ => {}
            }
            i = (i + 1) & mask;
        }
        None
    }

    /// First empty or deleted slot on the probe path of `hash`.
    fn free_slot(&self, hash: u64) -> usize {
        let mask = self.ctrl.len() - 1;
        let mut i = hash as usize & mask;
        while self.ctrl[i] != EMPTY && self.ctrl[i] != DELETED {
            i = (i + 1) & mask;
        }
        i
    }

    fn rehash(&mut self, capacity: usize) {
        let old = std::mem::take(&mut self.slots);
        self.ctrl = vec![EMPTY; capacity];
        self.slots = (0..capacity).map(|_| None).collect();
        self.tombstones = 0;
        for (k, v) in old.into_iter().flatten() {
            let h = hash(&k);
            let i = self.free_slot(h);
            self.ctrl[i] = h2(h);
            self.slots[i] = Some((k, v));
        }
    }

    fn reserve_one(&mut self) {
        let cap = self.ctrl.len();
        if (self.len + self.tombstones + 1) * 8 > cap * 7 {
            self.rehash(capacity_for(self.len + 1).max(cap));
        }
    }

    fn insert_new(&mut self, h: u64, key: K, value: V) -> &mut V {
        self.reserve_one();
        let i = self.free_slot(h);
        if self.ctrl[i] == DELETED {
            self.tombstones -= 1;
        }
        self.ctrl[i] = h2(h);
        self.len += 1;
        &mut self.slots[i].insert((key, value)).1
    }

    /// Inserts `value` under `key` unless the key is present. Returns the stored value
    /// and whether an insertion happened; an existing value is left untouched.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        self.emplace(key, || value)
    }

    /// Like [`HashMap::insert`], constructing the value only if the key is absent.
    pub fn emplace<F: FnOnce() -> V>(&mut self, key: K, make: F) -> (&mut V, bool) {
        let h = hash(&key);
        match self.find(h, &key) {
            // The slot is full, so the closure never runs.
            Some(i) => (&mut self.slots[i].get_or_insert_with(|| (key, make())).1, false),
            None => (self.insert_new(h, key, make()), true),
        }
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<V> {
        let h = hash(&key);
        match self.find(h, &key) {
            Some(i) => self.slots[i]
                .as_mut()
                .map(|(_, v)| std::mem::replace(v, value)),
            None => {
                self.insert_new(h, key, value);
                None
            }
        }
    }

    /// The value for `key`, inserting `make()` first if absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        self.emplace(key, make).0
    }

    /// The value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.find(hash(key), key)?;
        self.slots[i].as_ref().map(|(_, v)| v)
    }

    /// The value for `key`, mutably.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.find(hash(key), key)?;
        self.slots[i].as_mut().map(|(_, v)| v)
    }

    /// True if `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(hash(key), key).is_some()
    }

    /// Removes `key`, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.find(hash(key), key)?;
        self.erase_slot(i).map(|(_, v)| v)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, mut keep: F) {
        for i in 0..self.slots.len() {
            let remove = match &mut self.slots[i] {
                Some((k, v)) => !keep(k, v),
                None => false,
            };
            if remove {
                self.erase_slot(i);
            }
        }
    }
}

/// Borrowing iterator over a [`HashMap`].
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    slots: std::slice::Iter<'a, Option<(K, V)>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Some((k, v)) = slot {
                self.remaining -= 1;
                return Some((k, v));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Slot cursor returned by [`HashMap::cursor_mut`].
///
/// Removing the current entry leaves the cursor on the following one, so every entry
/// is seen exactly once.
#[derive(Debug)]
pub struct CursorMut<'a, K, V> {
    map: &'a mut HashMap<K, V>,
    pos: usize,
}

impl<K, V> CursorMut<'_, K, V> {
    fn settle(&mut self) -> Option<usize> {
        while self.pos < self.map.slots.len() {
            if self.map.slots[self.pos].is_some() {
                return Some(self.pos);
            }
            self.pos += 1;
        }
        None
    }

    /// The entry under the cursor, `None` at the end.
    pub fn current(&mut self) -> Option<(&K, &mut V)> {
        let i = self.settle()?;
        self.map.slots[i].as_mut().map(|(k, v)| (&*k, v))
    }

    /// Moves to the next entry.
    pub fn move_next(&mut self) {
        if self.settle().is_some() {
            self.pos += 1;
        }
    }

    /// Removes the entry under the cursor and moves to the next one.
    pub fn remove(&mut self) -> Option<(K, V)> {
        let i = self.settle()?;
        let entry = self.map.erase_slot(i);
        self.pos = i + 1;
        entry
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for HashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            ctrl: self.ctrl.clone(),
            slots: self.slots.clone(),
            len: self.len,
            tombstones: self.tombstones,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for HashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for HashMap<K, V> {}

impl<K, Q, V> Index<&Q> for HashMap<K, V>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// # Panics
    /// If `key` is not present.
    #[allow(clippy::panic)]
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("key not found in HashMap"),
        }
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for HashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V> Extend<(K, V)> for HashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V> IntoIterator for HashMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Option<(K, V)>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter().flatten()
    }
}

impl<'a, K, V> IntoIterator for &'a HashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Serialize, V: Serialize> Serialize for HashMap<K, V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

struct MapVisitor<K, V>(PhantomData<fn() -> (K, V)>);

impl<'de, K, V> Visitor<'de> for MapVisitor<K, V>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
{
    type Value = HashMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = HashMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry()? {
            map.insert_or_assign(k, v);
        }
        Ok(map)
    }
}

impl<'de, K, V> Deserialize<'de> for HashMap<K, V>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

/// An open-addressing hash set over [`HashMap<T, ()>`].
pub struct HashSet<T> {
    map: HashMap<T, ()>,
}

impl<T> HashSet<T> {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.keys()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<T: Hash + Eq> HashSet<T> {
    /// Adds `value`; returns false if it was already present.
    pub fn insert(&mut self, value: T) -> bool {
        self.map.insert(value, ()).1
    }

    /// True if `value` is present.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(value)
    }

    /// Removes `value`; returns true if it was present.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(value).is_some()
    }

    /// Keeps only the elements for which `keep` returns true.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        self.map.retain(|k, _| keep(k));
    }
}

impl<T> Default for HashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for HashSet<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HashSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Hash + Eq> PartialEq for HashSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq> Eq for HashSet<T> {}

impl<T: Hash + Eq> FromIterator<T> for HashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|t| (t, ())).collect(),
        }
    }
}

impl<T: Hash + Eq> Extend<T> for HashSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.map.extend(iter.into_iter().map(|t| (t, ())));
    }
}

impl<T: Serialize> Serialize for HashSet<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

struct SetVisitor<T>(PhantomData<fn() -> T>);

impl<'de, T: Deserialize<'de> + Hash + Eq> Visitor<'de> for SetVisitor<T> {
    type Value = HashSet<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut set = HashSet::new();
        while let Some(v) = access.next_element()? {
            set.insert(v);
        }
        Ok(set)
    }
}

impl<'de, T: Deserialize<'de> + Hash + Eq> Deserialize<'de> for HashSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_seq(SetVisitor(PhantomData))
    }
}

/// A key/value pair of an archived map.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub struct Entry<K, V> {
    /// Archived key.
    pub key: K,
    /// Archived value.
    pub value: V,
}

// SAFETY: delegates to the key and value checks.
unsafe impl<K: Verify, V: Verify> Verify for Entry<K, V> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: field addresses of an in-range value.
        unsafe {
            K::verify(std::ptr::addr_of!((*ptr).key), validator)?;
            V::verify(std::ptr::addr_of!((*ptr).value), validator)
        }
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: as above.
        unsafe {
            K::fix_endian(std::ptr::addr_of_mut!((*ptr).key), fixup)?;
            V::fix_endian(std::ptr::addr_of_mut!((*ptr).value), fixup)
        }
    }
}

/// Archived form of [`HashMap`]: dense entries plus an open-addressed index.
#[repr(C)]
pub struct ArchivedHashMap<K, V> {
    entries: ArchivedVec<Entry<K, V>>,
    index: ArchivedVec<u32>,
}

impl<K, V> ArchivedHashMap<K, V> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in archive order.
    pub fn entries(&self) -> &[Entry<K, V>] {
        self.entries.as_slice()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Iterates over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|e| &e.value)
    }

    /// The value stored under a key equal to `key`.
    ///
    /// `key` is hashed with [`crate::hashing::FnvHasher`]; it must hash like the owned
    /// key it stands for (e.g. `&str` for `String`, the owned key type itself).
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: PartialEq<Q>,
        Q: Hash + ?Sized,
    {
        let index = self.index.as_slice();
        if index.is_empty() {
            return None;
        }
        let mask = index.len() - 1;
        let mut i = hash(key) as usize & mask;
        for _ in 0..index.len() {
            let slot = index[i];
            if slot == INDEX_EMPTY {
                return None;
            }
            let entry = self.entries.get(slot as usize)?;
            if entry.key == *key {
                return Some(&entry.value);
            }
            i = (i + 1) & mask;
        }
        None
    }

    /// True if a key equal to `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: PartialEq<Q>,
        Q: Hash + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ArchivedHashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn build_index<'a, K: Hash + 'a>(keys: impl ExactSizeIterator<Item = &'a K>) -> Result<Vec<u32>> {
    let n = keys.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut index = vec![INDEX_EMPTY; capacity_for(n)];
    let mask = index.len() - 1;
    for (pos, key) in keys.enumerate() {
        let mut i = hash(key) as usize & mask;
        while index[i] != INDEX_EMPTY {
            i = (i + 1) & mask;
        }
        index[i] = archived_len::<u32>(pos)?;
    }
    Ok(index)
}

impl<K, V> ArchivedHashMap<K, V> {
    /// Writes the archived form of `entries` at `pos`.
    pub fn serialize_entries<'e, OK, OV, W>(
        entries: impl IntoIterator<Item = (&'e OK, &'e OV)>,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()>
    where
        OK: Archive<Archived = K> + Hash + 'e,
        OV: Archive<Archived = V> + 'e,
        W: Target + ?Sized,
    {
        let pairs: Vec<(&OK, &OV)> = entries.into_iter().collect();
        let index = build_index(pairs.iter().map(|(k, _)| *k))?;
        let key_off = offset_of!(Entry<K, V>, key) as u64;
        let value_off = offset_of!(Entry<K, V>, value) as u64;
        ArchivedVec::<Entry<K, V>>::serialize_with(
            pairs.len(),
            serializer,
            pos + offset_of!(Self, entries) as u64,
            |s, i, at| {
                let (k, v) = pairs[i];
                k.serialize_into(s, at + key_off)?;
                v.serialize_into(s, at + value_off)
            },
        )?;
        ArchivedVec::serialize_from_slice(&index, serializer, pos + offset_of!(Self, index) as u64)
    }
}

impl<K, V> Archive for HashMap<K, V>
where
    K: Archive + Hash + Eq,
    V: Archive,
{
    type Archived = ArchivedHashMap<K::Archived, V::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedHashMap::serialize_entries(self.iter(), serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("hash_map");
        hasher.visit::<K>()?;
        hasher.visit::<V>()
    }
}

// SAFETY: entries and index are validated as vectors; index values are only used
// through bounds-checked slice access.
unsafe impl<K: Verify, V: Verify> Verify for ArchivedHashMap<K, V> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: field addresses of an in-range value.
        unsafe {
            ArchivedVec::verify(std::ptr::addr_of!((*ptr).entries), validator)?;
            ArchivedVec::verify(std::ptr::addr_of!((*ptr).index), validator)?;
        }
        if validator.deep_check() {
            // SAFETY: both vectors were validated above.
            let this = unsafe { &*ptr };
            check_index(this.index.as_slice(), this.entries.len(), validator)?;
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: field addresses of an in-range value.
        unsafe {
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).entries), fixup)?;
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).index), fixup)
        }
    }
}

fn check_index(index: &[u32], entries: usize, validator: &Validator<'_>) -> Result<()> {
    if entries == 0 {
        return Ok(());
    }
    if !index.len().is_power_of_two() || index.len() < entries {
        return Err(validator.invalid(format!(
            "hash index of {} slots for {entries} entries",
            index.len()
        )));
    }
    let mut seen = vec![false; entries];
    for &slot in index.iter().filter(|s| **s != INDEX_EMPTY) {
        match seen.get_mut(slot as usize) {
            Some(flag) if !*flag => *flag = true,
            _ => return Err(validator.invalid(format!("hash index slot {slot} invalid"))),
        }
    }
    if seen.iter().any(|s| !s) {
        return Err(validator.invalid("hash index does not cover every entry"));
    }
    Ok(())
}

/// Archived form of [`HashSet`].
#[repr(transparent)]
pub struct ArchivedHashSet<T> {
    map: ArchivedHashMap<T, ()>,
}

impl<T> ArchivedHashSet<T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.keys()
    }

    /// True if an element equal to `value` is present.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: PartialEq<Q>,
        Q: Hash + ?Sized,
    {
        self.map.contains_key(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for ArchivedHashSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Archive + Hash + Eq> Archive for HashSet<T> {
    type Archived = ArchivedHashSet<T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        self.map.serialize_into(serializer, pos)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("hash_set");
        hasher.visit::<T>()
    }
}

// SAFETY: same layout as the wrapped map.
unsafe impl<T: Verify> Verify for ArchivedHashSet<T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: transparent wrapper.
        unsafe { ArchivedHashMap::<T, ()>::verify(ptr.cast(), validator) }
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: transparent wrapper.
        unsafe { ArchivedHashMap::<T, ()>::fix_endian(ptr.cast(), fixup) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_at_seven_eighths() {
        let mut map = HashMap::new();
        for i in 0..7u32 {
            map.insert(i, i);
        }
        assert_eq!(map.capacity(), 8);
        map.insert(7, 7);
        assert_eq!(map.capacity(), 16);
        assert!((0..8).all(|i| map.get(&i) == Some(&i)));
    }

    #[test]
    fn insert_keeps_existing_value() {
        let mut map = HashMap::new();
        assert!(map.insert("a".to_string(), 1).1);
        let (v, inserted) = map.insert("a".to_string(), 2);
        assert!(!inserted);
        assert_eq!(*v, 1);
        assert_eq!(map.insert_or_assign("a".to_string(), 3), Some(1));
        assert_eq!(map["a"], 3);
    }

    #[test]
    fn tombstones_keep_probe_chains_intact() {
        let mut map = HashMap::with_capacity(64);
        for i in 0..40u64 {
            map.insert(i, i * 2);
        }
        for i in (0..40u64).step_by(3) {
            assert_eq!(map.remove(&i), Some(i * 2));
        }
        for i in 0..40u64 {
            assert_eq!(map.contains_key(&i), i % 3 != 0);
        }
        for i in 0..200u64 {
            map.insert(1000 + i, i);
        }
        assert_eq!(map.len(), 40 - 14 + 200);
    }

    #[test]
    fn index_table_covers_all_entries() -> Result<()> {
        let keys: Vec<u32> = (0..100).collect();
        let index = build_index(keys.iter())?;
        assert_eq!(index.len(), 128);
        assert_eq!(index.iter().filter(|s| **s != INDEX_EMPTY).count(), 100);
        Ok(())
    }
}
