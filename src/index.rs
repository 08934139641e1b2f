//! Immutable value-to-bitmap secondary index

use std::collections::HashMap;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::base::Len;
use crate::bitmaps::CompressedBitmap;
use crate::iterators::BitmapSequence;

/// Bounds required of an indexed value
pub trait ValueKey:
    Eq + Hash + Ord + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> ValueKey for T where
    T: Eq + Hash + Ord + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// One compressed bitmap of document identifiers per distinct indexed
/// value. Immutable once built; bitmaps are shared, so queries are safe
/// from any number of threads.
pub struct BitmapIndex<V> {
    entries: HashMap<V, CompressedBitmap>,
}

impl<V: ValueKey> BitmapIndex<V> {
    pub(crate) fn new(entries: HashMap<V, CompressedBitmap>) -> Self {
        Self { entries }
    }

    /// The bitmap of documents carrying `value`
    pub fn get(&self, value: &V) -> Option<&CompressedBitmap> {
        self.entries.get(value)
    }

    /// Number of documents carrying `value`
    pub fn count(&self, value: &V) -> u64 {
        self.get(value).map_or(0, |bitmap| bitmap.count_ones())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.keys()
    }

    /// Documents carrying every one of `values`, combined on the compressed
    /// form. Empty if `values` is empty or any value is unknown.
    pub fn all_of(&self, values: &[V]) -> CompressedBitmap {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return CompressedBitmap::empty();
        };
        let Some(mut result) = self.get(first).cloned() else {
            return CompressedBitmap::empty();
        };
        for value in iter {
            match self.get(value) {
                Some(bitmap) => result = result.and(bitmap),
                None => return CompressedBitmap::empty(),
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Documents carrying at least one of `values`
    pub fn any_of(&self, values: &[V]) -> CompressedBitmap {
        let mut result = CompressedBitmap::empty();
        for value in values {
            if let Some(bitmap) = self.get(value) {
                result = result.or(bitmap);
            }
        }
        result
    }

    /// The documents carrying `value` as an ordered pipeline source
    pub fn sequence(&self, value: &V) -> BitmapSequence {
        let bitmap = self.get(value).cloned().unwrap_or_else(CompressedBitmap::empty);
        BitmapSequence::new(bitmap)
    }
}

impl<V: ValueKey> Len for BitmapIndex<V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}
