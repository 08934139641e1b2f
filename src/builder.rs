//! Building and persisting bitmap indexes
//!
//! The builder stages one mutable bitmap per distinct value; freezing it
//! yields an immutable [`BitmapIndex`]. The persisted form is a CBOR
//! metadata file plus a flat, headerless payload of little-endian words,
//! written in sorted value order so that saving the same index always
//! produces the same bytes.

use std::collections::HashMap;
use std::fs::{create_dir, File};
use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::base::{DocId, Len, BITMAPS_DAT, INDEX_CBOR};
use crate::bitmaps::{CompressedBitmap, CompressedBitmapBuilder};
use crate::errors::{Error, Result};
use crate::index::{BitmapIndex, ValueKey};
use crate::utils::buffer::{read_words, Buffer, MemoryBuffer, MmapBuffer};

/// Accumulates one bitmap builder per distinct indexed value.
///
/// Exclusively owned by the single writer performing the updates (one
/// index-maintenance transaction); no internal locking.
pub struct BitmapIndexBuilder<V> {
    entries: HashMap<V, CompressedBitmapBuilder>,
}

impl<V: ValueKey> BitmapIndexBuilder<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Sets `docid`'s bit in `value`'s bitmap, creating the bitmap on first
    /// use; returns true if the bit was previously 0
    pub fn insert(&mut self, docid: DocId, value: V) -> Result<bool> {
        self.entries
            .entry(value)
            .or_insert_with(CompressedBitmapBuilder::new)
            .set(docid)
    }

    /// Clears `docid`'s bit in `value`'s bitmap; entries whose bitmap
    /// becomes empty are pruned. Returns true if the bit was previously 1.
    pub fn remove(&mut self, docid: DocId, value: &V) -> Result<bool> {
        let Some(builder) = self.entries.get_mut(value) else {
            return Ok(false);
        };
        let changed = builder.clear(docid)?;
        if changed && builder.is_empty() {
            self.entries.remove(value);
        }
        Ok(changed)
    }

    /// Tests `docid`'s bit in `value`'s bitmap
    pub fn test(&self, docid: DocId, value: &V) -> Result<bool> {
        match self.entries.get(value) {
            Some(builder) => builder.test(docid),
            None => Ok(false),
        }
    }

    /// Freezes every staged bitmap into its canonical immutable form
    pub fn build(self) -> BitmapIndex<V> {
        BitmapIndex::new(
            self.entries
                .into_iter()
                .map(|(value, builder)| (value, builder.to_bitmap()))
                .collect(),
        )
    }
}

impl<V: ValueKey> Default for BitmapIndexBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ValueKey> Len for BitmapIndexBuilder<V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Serialize, Deserialize)]
struct EntryInformation<V> {
    value: V,

    /// Byte offset of this entry's words inside the payload file
    position: u64,

    /// Number of words
    words: usize,
}

/// Global information on the index structure
#[derive(Serialize, Deserialize)]
struct IndexInformation<V> {
    entries: Vec<EntryInformation<V>>,
}

/// Serializes `index` under `path` (`index.cbor` + `bitmaps.dat`)
pub fn save_index<V: ValueKey>(index: &BitmapIndex<V>, path: &Path) -> Result<()> {
    if !path.is_dir() {
        info!("Creating path {}", path.display());
        create_dir(path)?;
    }

    let mut payload = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path.join(BITMAPS_DAT))?;

    // Sorted value order makes the output deterministic
    let mut values: Vec<&V> = index.values().collect();
    values.sort();

    let mut information = IndexInformation {
        entries: Vec::new(),
    };
    let mut position: u64 = 0;

    for value in values {
        let bitmap = index.get(value).expect("listed value without a bitmap");
        for word in bitmap.words() {
            payload.write_u32::<LittleEndian>(word.raw())?;
        }
        information.entries.push(EntryInformation {
            value: value.clone(),
            position,
            words: bitmap.word_count(),
        });
        position += bitmap.word_count() as u64 * 4;
    }
    payload.flush()?;

    let info_file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path.join(INDEX_CBOR))?;
    ciborium::ser::into_writer(&information, info_file).map_err(Error::fault)?;

    info!(
        "Saved {} bitmap entries ({} payload bytes)",
        information.entries.len(),
        position
    );
    Ok(())
}

/// Loads an index saved by [`save_index`], reading the payload from the
/// heap or through a memory map
pub fn load_index<V: ValueKey>(path: &Path, in_memory: bool) -> Result<BitmapIndex<V>> {
    let info_file = File::options().read(true).open(path.join(INDEX_CBOR))?;
    let information: IndexInformation<V> =
        ciborium::de::from_reader(info_file).map_err(Error::fault)?;

    let payload_path = path.join(BITMAPS_DAT);
    let buffer: Box<dyn Buffer> = if in_memory {
        Box::new(MemoryBuffer::new(&payload_path)?)
    } else {
        Box::new(MmapBuffer::new(&payload_path)?)
    };

    let mut entries = HashMap::with_capacity(information.entries.len());
    for entry in information.entries {
        let words = read_words(buffer.as_ref(), entry.position, entry.words)?;
        debug!(
            "Loaded entry at {} ({} words)",
            entry.position, entry.words
        );
        entries.insert(entry.value, CompressedBitmap::from_words(words));
    }
    Ok(BitmapIndex::new(entries))
}
