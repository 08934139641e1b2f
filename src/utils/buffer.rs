//! Buffers over the persisted bitmap payload

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::bitmaps::word::Word;
use crate::errors::{Error, Result};

/// Read access to the raw bytes of a payload file
pub trait Buffer: Send + Sync {
    fn data(&self) -> &[u8];

    fn len(&self) -> usize {
        self.data().len()
    }
}

/// Holds the whole payload on the heap
pub struct MemoryBuffer {
    data: Vec<u8>,
}

impl MemoryBuffer {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            data: std::fs::read(path)?,
        })
    }
}

impl Buffer for MemoryBuffer {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Maps the payload file into memory
pub struct MmapBuffer {
    mmap: Mmap,
}

impl MmapBuffer {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::options().read(true).open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl Buffer for MmapBuffer {
    fn data(&self) -> &[u8] {
        &self.mmap
    }
}

/// Decodes `count` little-endian words starting at byte offset `start`
pub fn read_words(buffer: &dyn Buffer, start: u64, count: usize) -> Result<Vec<Word>> {
    let start = start as usize;
    let end = start
        .checked_add(count * 4)
        .ok_or(Error::Malformed("word range overflows the payload"))?;
    let data = buffer.data();
    if end > data.len() {
        return Err(Error::Malformed("word range outside the payload"));
    }
    let mut words = Vec::with_capacity(count);
    for chunk in data[start..end].chunks_exact(4) {
        let raw = LittleEndian::read_u32(chunk);
        let word =
            Word::from_raw(raw).ok_or(Error::Malformed("filler word with a zero run length"))?;
        words.push(word);
    }
    Ok(words)
}
