//! Row stores: many variable-length rows over one flat element array.
//!
//! [`VecVec`] keeps rows back to back and delimits them with `n + 1` bucket starts.
//! Growing a row shifts the rows after it. [`PagedVecVec`] gives every row a page of
//! power-of-two capacity, so rows grow in place until their page is full.
//!
//! ```text
//! VecVec       starts: [0, 2, 2, 5]      data: [a b | | c d e]
//! PagedVecVec  pages:  [(0,2,2) (2,3,4)] data: [a b | c d e _]
//! ```

use crate::archive::{Archive, Verify};
use crate::containers::vec::ArchivedVec;
use crate::de::{EndianFixup, Validator};
use crate::error::{Result, TesseraError};
use crate::fingerprint::TypeHasher;
use crate::io::Target;
use crate::ser::Serializer;
use crate::strong::RowKey;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer as SerdeSerializer};
use std::fmt;
use std::marker::PhantomData;
use std::mem::offset_of;
use std::ops::{Index, Range};

/// Rows of `T` addressed by `K`, stored contiguously.
pub struct VecVec<K, T> {
    bucket_starts: Vec<u64>,
    data: Vec<T>,
    _key: PhantomData<fn() -> K>,
}

impl<K: RowKey, T> VecVec<K, T> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            bucket_starts: vec![0],
            data: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.bucket_starts.len() - 1
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements across all rows.
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// The row delimiters, `len() + 1` entries.
    pub fn bucket_starts(&self) -> &[u64] {
        &self.bucket_starts
    }

    /// All elements, row after row.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn range(&self, row: usize) -> Option<Range<usize>> {
        let start = *self.bucket_starts.get(row)? as usize;
        let end = *self.bucket_starts.get(row + 1)? as usize;
        Some(start..end)
    }

    /// Appends a row holding `items` and returns its key.
    pub fn push_row<I: IntoIterator<Item = T>>(&mut self, items: I) -> K {
        let key = K::from_index(self.len());
        self.data.extend(items);
        self.bucket_starts.push(self.data.len() as u64);
        key
    }

    /// The row at `key`.
    pub fn get(&self, key: K) -> Option<&[T]> {
        self.range(key.index()).map(|r| &self.data[r])
    }

    /// A mutable handle to the row at `key`.
    pub fn row_mut(&mut self, key: K) -> Option<RowMut<'_, K, T>> {
        let row = key.index();
        (row < self.len()).then_some(RowMut { store: self, row })
    }

    /// Truncates to `rows` rows or appends empty rows up to it.
    pub fn resize(&mut self, rows: usize) {
        if rows < self.len() {
            self.bucket_starts.truncate(rows + 1);
            self.data.truncate(self.bucket_starts[rows] as usize);
        } else {
            let end = self.data.len() as u64;
            self.bucket_starts.resize(rows + 1, end);
        }
    }

    /// Removes every row.
    pub fn clear(&mut self) {
        self.bucket_starts.truncate(1);
        self.data.clear();
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        self.bucket_starts
            .windows(2)
            .map(|w| &self.data[w[0] as usize..w[1] as usize])
    }

    fn insert_at_row_end<I: IntoIterator<Item = T>>(&mut self, row: usize, items: I) -> usize {
        let end = self.bucket_starts[row + 1] as usize;
        let before = self.data.len();
        self.data.splice(end..end, items);
        let added = self.data.len() - before;
        for start in &mut self.bucket_starts[row + 1..] {
            *start += added as u64;
        }
        added
    }
}

impl<K: RowKey, T> Default for VecVec<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T: Clone> Clone for VecVec<K, T> {
    fn clone(&self) -> Self {
        Self {
            bucket_starts: self.bucket_starts.clone(),
            data: self.data.clone(),
            _key: PhantomData,
        }
    }
}

impl<K: RowKey, T: fmt::Debug> fmt::Debug for VecVec<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K, T: PartialEq> PartialEq for VecVec<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.bucket_starts == other.bucket_starts && self.data == other.data
    }
}

impl<K, T: Eq> Eq for VecVec<K, T> {}

impl<K: RowKey, T> Index<K> for VecVec<K, T> {
    type Output = [T];

    fn index(&self, key: K) -> &[T] {
        let row = key.index();
        &self.data[self.bucket_starts[row] as usize..self.bucket_starts[row + 1] as usize]
    }
}

impl<K: RowKey, T, R: IntoIterator<Item = T>> FromIterator<R> for VecVec<K, T> {
    fn from_iter<I: IntoIterator<Item = R>>(rows: I) -> Self {
        let mut store = Self::new();
        for row in rows {
            store.push_row(row);
        }
        store
    }
}

impl<K: RowKey, T: Serialize> Serialize for VecVec<K, T> {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for row in self.iter() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

impl<'de, K: RowKey, T: Deserialize<'de>> Deserialize<'de> for VecVec<K, T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let rows = Vec::<Vec<T>>::deserialize(deserializer)?;
        Ok(rows.into_iter().collect())
    }
}

/// Mutable access to one row of a [`VecVec`].
pub struct RowMut<'a, K, T> {
    store: &'a mut VecVec<K, T>,
    row: usize,
}

impl<K: RowKey, T> RowMut<'_, K, T> {
    fn range(&self) -> Range<usize> {
        self.store.bucket_starts[self.row] as usize..self.store.bucket_starts[self.row + 1] as usize
    }

    /// Number of elements in the row.
    pub fn len(&self) -> usize {
        self.range().len()
    }

    /// True if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `value` to the row.
    pub fn push(&mut self, value: T) {
        self.store.insert_at_row_end(self.row, std::iter::once(value));
    }

    /// Appends every item to the row.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.store.insert_at_row_end(self.row, items);
    }

    /// Grows the row to `len` elements, filling with `T::default()`.
    pub fn grow(&mut self, len: usize) -> Result<()>
    where
        T: Default,
    {
        let extra = self.extra_for(len)?;
        self.extend(std::iter::repeat_with(T::default).take(extra));
        Ok(())
    }

    /// Grows the row to `len` elements, filling with clones of `value`.
    pub fn grow_with(&mut self, len: usize, value: T) -> Result<()>
    where
        T: Clone,
    {
        let extra = self.extra_for(len)?;
        self.extend(std::iter::repeat(value).take(extra));
        Ok(())
    }

    fn extra_for(&self, len: usize) -> Result<usize> {
        let current = self.len();
        if len < current {
            return Err(TesseraError::InvalidGrow {
                len: current as u64,
                requested: len as u64,
            });
        }
        Ok(len - current)
    }

    /// The row elements.
    pub fn as_slice(&self) -> &[T] {
        let range = self.range();
        &self.store.data[range]
    }

    /// The row elements, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let range = self.range();
        &mut self.store.data[range]
    }
}

/// Archived form of [`VecVec`] (and of [`crate::MutableMultimap`]).
#[repr(C)]
pub struct ArchivedVecVec<K, T> {
    bucket_starts: ArchivedVec<u64>,
    data: ArchivedVec<T>,
    _key: PhantomData<fn() -> K>,
}

impl<K: RowKey, T> ArchivedVecVec<K, T> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.bucket_starts.len().saturating_sub(1)
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements across all rows.
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// The row at `key`, `None` if out of range or inconsistent.
    pub fn get(&self, key: K) -> Option<&[T]> {
        let row = key.index();
        let start = usize::try_from(*self.bucket_starts.get(row)?).ok()?;
        let end = usize::try_from(*self.bucket_starts.get(row + 1)?).ok()?;
        self.data.get(start..end)
    }

    /// Iterates over the rows; an inconsistent row reads as empty.
    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.len()).map(|row| self.get(K::from_index(row)).unwrap_or(&[]))
    }

    /// Writes an archived row store at `pos` from its delimiters and its elements.
    pub(crate) fn serialize_parts<U, W>(
        bucket_starts: &[u64],
        items: &[&U],
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()>
    where
        U: Archive<Archived = T>,
        W: Target + ?Sized,
    {
        ArchivedVec::serialize_from_slice(
            bucket_starts,
            serializer,
            pos + offset_of!(Self, bucket_starts) as u64,
        )?;
        ArchivedVec::<T>::serialize_with(
            items.len(),
            serializer,
            pos + offset_of!(Self, data) as u64,
            |serializer, i, at| {
                if U::TRACK_ADDRESS {
                    serializer.register(items[i], at);
                }
                items[i].serialize_into(serializer, at)
            },
        )
    }
}

impl<K: RowKey, T: fmt::Debug> fmt::Debug for ArchivedVecVec<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: RowKey, T: PartialEq<U>, U> PartialEq<VecVec<K, U>> for ArchivedVecVec<K, T> {
    fn eq(&self, other: &VecVec<K, U>) -> bool {
        self.bucket_starts.as_slice() == other.bucket_starts() && self.data.as_slice() == other.data()
    }
}

impl<K: RowKey, T: Archive> Archive for VecVec<K, T> {
    type Archived = ArchivedVecVec<K, T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedVec::serialize_from_slice(
            &self.bucket_starts,
            serializer,
            pos + offset_of!(ArchivedVecVec<K, T::Archived>, bucket_starts) as u64,
        )?;
        ArchivedVec::serialize_from_slice(
            &self.data,
            serializer,
            pos + offset_of!(ArchivedVecVec<K, T::Archived>, data) as u64,
        )
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("vecvec");
        hasher.visit::<T>()
    }
}

// SAFETY: both arrays are checked by the validator.
unsafe impl<K: RowKey, T: Verify> Verify for ArchivedVecVec<K, T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: fields of an in-range value.
        let this = unsafe { &*ptr };
        // SAFETY: as above.
        unsafe {
            ArchivedVec::verify(&this.bucket_starts, validator)?;
            ArchivedVec::verify(&this.data, validator)?;
        }
        if validator.deep_check() {
            check_starts(this.bucket_starts.as_slice(), this.data.len() as u64)
                .map_err(|msg| validator.invalid(msg))?;
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: fields of an in-range value.
        unsafe {
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).bucket_starts), fixup)?;
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).data), fixup)
        }
    }
}

fn check_starts(starts: &[u64], data_len: u64) -> std::result::Result<(), String> {
    let Some((&first, _)) = starts.split_first() else {
        return match data_len {
            0 => Ok(()),
            _ => Err(format!("row store without rows holds {data_len} elements")),
        };
    };
    if first != 0 {
        return Err(format!("first row starts at {first}"));
    }
    if let Some(w) = starts.windows(2).find(|w| w[0] > w[1]) {
        return Err(format!("row starts decrease from {} to {}", w[0], w[1]));
    }
    match starts.last() {
        Some(&end) if end == data_len => Ok(()),
        end => Err(format!("rows end at {end:?}, data holds {data_len}")),
    }
}

/// One row of a [`PagedVecVec`]: `len` elements in a page of `capacity` slots
/// starting at `offset`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Page {
    /// First slot of the page.
    pub offset: u64,
    /// Elements in use.
    pub len: u64,
    /// Slots reserved.
    pub capacity: u64,
}

impl Page {
    fn used(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }

    fn end(&self) -> u64 {
        self.offset + self.capacity
    }
}

impl Archive for Page {
    type Archived = Page;
    const TRACK_ADDRESS: bool = false;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        serializer.write_scalars(pos, &[self.offset, self.len, self.capacity])
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("page");
        Ok(())
    }
}

// SAFETY: plain integers.
unsafe impl Verify for Page {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: in range per the caller.
        let page = unsafe { &*ptr };
        if page.len > page.capacity {
            return Err(validator.invalid(format!(
                "page holds {} elements in {} slots",
                page.len, page.capacity
            )));
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: fields of an in-range value.
        unsafe {
            fixup.swap(std::ptr::addr_of_mut!((*ptr).offset))?;
            fixup.swap(std::ptr::addr_of_mut!((*ptr).len))?;
            fixup.swap(std::ptr::addr_of_mut!((*ptr).capacity))?;
        }
        Ok(())
    }
}

/// Rows of `T` addressed by `K`, each in its own power-of-two page.
///
/// Unused page slots hold `T::default()`.
pub struct PagedVecVec<K, T> {
    pages: Vec<Page>,
    data: Vec<T>,
    _key: PhantomData<fn() -> K>,
}

impl<K: RowKey, T: Default> PagedVecVec<K, T> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            data: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The page table.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of slots in the store, used or not.
    pub fn slot_count(&self) -> usize {
        self.data.len()
    }

    /// Appends a row holding `items` and returns its key.
    pub fn push_row<I: IntoIterator<Item = T>>(&mut self, items: I) -> K {
        let key = K::from_index(self.len());
        let offset = self.data.len();
        self.data.extend(items);
        let len = self.data.len() - offset;
        let capacity = len.next_power_of_two();
        self.data.resize_with(offset + capacity, T::default);
        self.pages.push(Page {
            offset: offset as u64,
            len: len as u64,
            capacity: capacity as u64,
        });
        key
    }

    /// The row at `key`.
    pub fn get(&self, key: K) -> Option<&[T]> {
        self.pages.get(key.index()).map(|p| &self.data[p.used()])
    }

    /// A mutable handle to the row at `key`.
    pub fn row_mut(&mut self, key: K) -> Option<PagedRowMut<'_, K, T>> {
        let row = key.index();
        (row < self.len()).then_some(PagedRowMut { store: self, row })
    }

    /// Truncates to `rows` rows or appends empty rows up to it.
    pub fn resize(&mut self, rows: usize) {
        if rows < self.len() {
            self.pages.truncate(rows);
            let end = self.pages.last().map_or(0, Page::end);
            self.data.truncate(end as usize);
        } else {
            while self.len() < rows {
                self.push_row(std::iter::empty());
            }
        }
    }

    /// Removes every row.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.data.clear();
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        self.pages.iter().map(|p| &self.data[p.used()])
    }
}

impl<K: RowKey, T: Default> Default for PagedVecVec<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RowKey, T: Default + fmt::Debug> fmt::Debug for PagedVecVec<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: RowKey, T: Default> Index<K> for PagedVecVec<K, T> {
    type Output = [T];

    fn index(&self, key: K) -> &[T] {
        &self.data[self.pages[key.index()].used()]
    }
}

/// Mutable access to one row of a [`PagedVecVec`].
pub struct PagedRowMut<'a, K, T> {
    store: &'a mut PagedVecVec<K, T>,
    row: usize,
}

impl<K: RowKey, T: Default> PagedRowMut<'_, K, T> {
    fn page(&self) -> Page {
        self.store.pages[self.row]
    }

    /// Number of elements in the row.
    pub fn len(&self) -> usize {
        self.page().len as usize
    }

    /// True if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots reserved for the row.
    pub fn capacity(&self) -> usize {
        self.page().capacity as usize
    }

    /// Appends `value`, doubling the page if it is full and ends the store.
    pub fn push(&mut self, value: T) -> Result<()> {
        let mut page = self.page();
        if page.len == page.capacity {
            if page.end() != self.store.data.len() as u64 {
                return Err(TesseraError::InvalidGrow {
                    len: page.len,
                    requested: page.len + 1,
                });
            }
            page.capacity = (page.capacity * 2).max(1);
            self.store.data.resize_with(page.end() as usize, T::default);
        }
        self.store.data[(page.offset + page.len) as usize] = value;
        page.len += 1;
        self.store.pages[self.row] = page;
        Ok(())
    }

    /// Appends every item, stopping at the first that does not fit.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> Result<()> {
        items.into_iter().try_for_each(|item| self.push(item))
    }

    /// The row elements.
    pub fn as_slice(&self) -> &[T] {
        let used = self.page().used();
        &self.store.data[used]
    }

    /// The row elements, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let used = self.page().used();
        &mut self.store.data[used]
    }
}

/// Archived form of [`PagedVecVec`].
#[repr(C)]
pub struct ArchivedPagedVecVec<K, T> {
    pages: ArchivedVec<Page>,
    data: ArchivedVec<T>,
    _key: PhantomData<fn() -> K>,
}

impl<K: RowKey, T> ArchivedPagedVecVec<K, T> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The row at `key`.
    pub fn get(&self, key: K) -> Option<&[T]> {
        let page = self.pages.get(key.index())?;
        let start = usize::try_from(page.offset).ok()?;
        let len = usize::try_from(page.len).ok()?;
        self.data.get(start..start.checked_add(len)?)
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.len()).map(|row| self.get(K::from_index(row)).unwrap_or(&[]))
    }
}

impl<K: RowKey, T: fmt::Debug> fmt::Debug for ArchivedPagedVecVec<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: RowKey, T: Archive + Default> Archive for PagedVecVec<K, T> {
    type Archived = ArchivedPagedVecVec<K, T::Archived>;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> Result<()> {
        ArchivedVec::serialize_from_slice(
            &self.pages,
            serializer,
            pos + offset_of!(ArchivedPagedVecVec<K, T::Archived>, pages) as u64,
        )?;
        ArchivedVec::serialize_from_slice(
            &self.data,
            serializer,
            pos + offset_of!(ArchivedPagedVecVec<K, T::Archived>, data) as u64,
        )
    }

    fn fingerprint(hasher: &mut TypeHasher) -> Result<()> {
        hasher.write_tag("paged_vecvec");
        hasher.visit::<T>()
    }
}

// SAFETY: both arrays are checked by the validator and every page lies in the data.
unsafe impl<K: RowKey, T: Verify> Verify for ArchivedPagedVecVec<K, T> {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> Result<()> {
        // SAFETY: fields of an in-range value.
        let this = unsafe { &*ptr };
        // SAFETY: as above.
        unsafe {
            ArchivedVec::verify(&this.pages, validator)?;
            ArchivedVec::verify(&this.data, validator)?;
        }
        let slots = this.data.len() as u64;
        for (row, page) in this.pages.iter().enumerate() {
            match page.offset.checked_add(page.capacity) {
                Some(end) if end <= slots => {}
                _ => {
                    return Err(validator.invalid(format!(
                        "page {row} at {}+{} exceeds {slots} slots",
                        page.offset, page.capacity
                    )))
                }
            }
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> Result<()> {
        // SAFETY: fields of an in-range value.
        unsafe {
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).pages), fixup)?;
            ArchivedVec::fix_endian(std::ptr::addr_of_mut!((*ptr).data), fixup)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, Mode};

    #[test]
    fn growing_an_early_row_shifts_later_rows() -> Result<()> {
        let mut store = VecVec::<u32, u8>::new();
        let a = store.push_row([1, 2]);
        let b = store.push_row([3]);
        if let Some(mut row) = store.row_mut(a) {
            row.push(9);
        }
        assert_eq!(&store[a], &[1, 2, 9]);
        assert_eq!(&store[b], &[3]);
        assert_eq!(store.bucket_starts(), &[0, 3, 4]);

        let mut row = store.row_mut(b).ok_or(TesseraError::NullDereference)?;
        row.grow_with(3, 0)?;
        assert!(matches!(
            row.grow(1),
            Err(TesseraError::InvalidGrow { len: 3, requested: 1 })
        ));
        row.as_mut_slice().sort_unstable();
        assert_eq!(row.as_slice(), &[0, 0, 3]);
        Ok(())
    }

    #[test]
    fn resize_truncates_and_extends() {
        let mut store: VecVec<usize, i32> = [vec![1], vec![2, 3], vec![4]].into_iter().collect();
        store.resize(1);
        assert_eq!(store.element_count(), 1);
        store.resize(3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2), Some(&[][..]));
        assert_eq!(store.get(3), None);
    }

    #[test]
    fn inconsistent_starts_fail_the_deep_check() {
        assert!(check_starts(&[0, 2, 1, 3], 3).is_err());
        assert!(check_starts(&[0, 2, 4], 3).is_err());
        assert!(check_starts(&[1, 3], 3).is_err());
        assert!(check_starts(&[0, 1, 3], 3).is_ok());
        assert!(check_starts(&[], 0).is_ok());
    }

    #[test]
    fn only_the_last_page_grows_past_capacity() -> Result<()> {
        let mut store = PagedVecVec::<u32, u16>::new();
        let a = store.push_row([1, 2]);
        let b = store.push_row([3, 4, 5]);
        assert_eq!(store.pages()[1].capacity, 4);

        let mut last = store.row_mut(b).ok_or(TesseraError::NullDereference)?;
        last.extend([6, 7])?;
        assert_eq!(last.capacity(), 8);

        let mut first = store.row_mut(a).ok_or(TesseraError::NullDereference)?;
        assert!(matches!(
            first.push(8),
            Err(TesseraError::InvalidGrow { len: 2, requested: 3 })
        ));
        assert_eq!(&store[b], &[3, 4, 5, 6, 7]);
        Ok(())
    }

    #[test]
    fn paged_rows_read_back() -> Result<()> {
        let mut store = PagedVecVec::<u64, u32>::new();
        store.push_row([10, 20, 30]);
        store.push_row([]);
        let bytes = serialize(&store, Mode::DEEP_CHECK)?;
        let archived = deserialize::<PagedVecVec<u64, u32>>(&bytes, Mode::DEEP_CHECK)?;
        assert_eq!(archived.len(), 2);
        assert_eq!(archived.get(0), Some(&[10u32, 20, 30][..]));
        assert_eq!(archived.get(1), Some(&[][..]));
        assert_eq!(archived.get(2), None);
        Ok(())
    }
}
