//! Mutable staging structure for incremental bitmap edits

use std::fmt;

use crate::base::{BitOffset, MAX_OFFSET};
use crate::errors::{Error, Result};

use super::bitmap::{Bounds, CompressedBitmap};
use super::codec::{self, WordWriter};
use super::word::{Word, ALL_ONES, BITS_PER_WORD, MAX_FILL};

/// Where a chunk lives inside the staged word sequence
enum Location {
    Literal { ix: usize },
    Fill { ix: usize, start_chunk: u64 },
    End,
}

/// A mutable, bit-addressable view over one bitmap's word sequence.
///
/// Single bits are set and cleared in place: a patch inside a literal is a
/// plain bit operation, a patch inside a filler splits the run into up to
/// three pieces (prefix run, literal window, suffix run), and a set past the
/// current extent appends in amortized constant time. The staged sequence
/// may temporarily hold uniform literals; [`to_bitmap`](Self::to_bitmap)
/// re-canonicalizes before materializing.
///
/// Not thread-safe: a builder is exclusively owned by the single mutator
/// performing the updates.
pub struct CompressedBitmapBuilder {
    words: Vec<Word>,
    bounds: Option<Bounds>,
    cardinality: u64,
    /// Total number of 31-bit chunks currently covered by `words`
    total_chunks: u64,
}

impl CompressedBitmapBuilder {
    /// An empty builder
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            bounds: None,
            cardinality: 0,
            total_chunks: 0,
        }
    }

    /// A builder seeded with the contents of `bitmap`
    pub fn from_bitmap(bitmap: &CompressedBitmap) -> Self {
        let words = bitmap.words().to_vec();
        let total_chunks = words.iter().map(|w| w.chunks()).sum();
        Self {
            words,
            bounds: bitmap.bounds(),
            cardinality: bitmap.count_ones(),
            total_chunks,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn count_ones(&self) -> u64 {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Sets bit `offset`, returning true if it was previously 0
    pub fn set(&mut self, offset: BitOffset) -> Result<bool> {
        check_offset(offset)?;
        let chunk = (offset / BITS_PER_WORD) as u64;
        let mask = 1u32 << (offset % BITS_PER_WORD);

        let changed = if chunk >= self.total_chunks {
            self.append(chunk, mask);
            true
        } else {
            match self.locate(chunk) {
                Location::Literal { ix } => {
                    let payload = self.words[ix].payload();
                    if payload & mask != 0 {
                        false
                    } else {
                        self.words[ix] = Word::literal(payload | mask);
                        true
                    }
                }
                Location::Fill { ix, start_chunk } => {
                    if self.words[ix].fill_bit() {
                        false
                    } else {
                        self.split_run(ix, start_chunk, chunk, mask);
                        true
                    }
                }
                Location::End => unreachable!("chunk is within the covered extent"),
            }
        };
        if changed {
            self.cardinality += 1;
            self.grow_bounds(offset);
        }
        Ok(changed)
    }

    /// Clears bit `offset`, returning true if it was previously 1
    pub fn clear(&mut self, offset: BitOffset) -> Result<bool> {
        check_offset(offset)?;
        let chunk = (offset / BITS_PER_WORD) as u64;
        let mask = 1u32 << (offset % BITS_PER_WORD);

        let changed = match self.locate(chunk) {
            Location::Literal { ix } => {
                let payload = self.words[ix].payload();
                if payload & mask == 0 {
                    false
                } else {
                    self.words[ix] = Word::literal(payload & !mask);
                    true
                }
            }
            Location::Fill { ix, start_chunk } => {
                if !self.words[ix].fill_bit() {
                    false
                } else {
                    self.split_run(ix, start_chunk, chunk, ALL_ONES & !mask);
                    true
                }
            }
            Location::End => false,
        };
        if changed {
            self.cardinality -= 1;
            self.shrink_bounds(offset);
        }
        Ok(changed)
    }

    /// Tests bit `offset` against the staged words
    pub fn test(&self, offset: BitOffset) -> Result<bool> {
        check_offset(offset)?;
        let chunk = (offset / BITS_PER_WORD) as u64;
        let mask = 1u32 << (offset % BITS_PER_WORD);
        Ok(match self.locate(chunk) {
            Location::Literal { ix } => self.words[ix].payload() & mask != 0,
            Location::Fill { ix, .. } => self.words[ix].fill_bit(),
            Location::End => false,
        })
    }

    /// Materializes the staged state as a canonical immutable bitmap.
    ///
    /// Literals that edits have made uniform are re-merged with compatible
    /// neighbouring runs here, so the result is always in shortest form.
    pub fn to_bitmap(&self) -> CompressedBitmap {
        let mut writer = WordWriter::new();
        for &w in &self.words {
            writer.push_word(w);
        }
        CompressedBitmap::from_words(writer.finish())
    }

    /// Expands the staged state into one boolean per bit, up to the highest
    /// set bit. Testing aid, not meant for large bitmaps.
    pub fn to_bools(&self) -> Vec<bool> {
        let len = match self.bounds {
            None => return Vec::new(),
            Some(b) => b.highest as usize + 1,
        };
        let mut bools = vec![false; len];
        let mut base: usize = 0;
        for w in &self.words {
            if w.is_literal() {
                let payload = w.payload();
                for bit in 0..BITS_PER_WORD as usize {
                    if let Some(slot) = bools.get_mut(base + bit) {
                        *slot = payload & (1 << bit) != 0;
                    }
                }
                base += BITS_PER_WORD as usize;
            } else {
                let span = w.count() as usize * BITS_PER_WORD as usize;
                if w.fill_bit() {
                    for slot in bools.iter_mut().skip(base).take(span) {
                        *slot = true;
                    }
                }
                base += span;
            }
        }
        bools
    }

    /// Finds the word covering `chunk`
    fn locate(&self, chunk: u64) -> Location {
        let mut base: u64 = 0;
        for (ix, w) in self.words.iter().enumerate() {
            let span = w.chunks();
            if chunk < base + span {
                return if w.is_literal() {
                    Location::Literal { ix }
                } else {
                    Location::Fill { ix, start_chunk: base }
                };
            }
            base += span;
        }
        Location::End
    }

    /// Extends the sequence up to `chunk` and appends a literal with `mask`
    fn append(&mut self, chunk: u64, mask: u32) {
        let gap = chunk - self.total_chunks;
        if gap > 0 {
            self.append_fill(false, gap);
        }
        self.words.push(Word::literal(mask));
        self.total_chunks = chunk + 1;
    }

    /// Appends a run, merging with a trailing run of the same bit
    fn append_fill(&mut self, bit: bool, count: u64) {
        let mut total = count;
        if let Some(&last) = self.words.last() {
            if last.is_filler() && last.fill_bit() == bit {
                total += last.count() as u64;
                self.words.pop();
            }
        }
        while total > 0 {
            let c = total.min(MAX_FILL as u64) as u32;
            self.words.push(Word::filler(bit, c));
            total -= c as u64;
        }
    }

    /// Replaces the filler at `ix` by up to three pieces: the run before the
    /// patched chunk, a literal window carrying the patch, and the run after
    /// it. The split is the minimum promotion of a compressed region into a
    /// literal.
    fn split_run(&mut self, ix: usize, start_chunk: u64, chunk: u64, window: u32) {
        let word = self.words[ix];
        let bit = word.fill_bit();
        let before = chunk - start_chunk;
        let after = word.count() as u64 - before - 1;

        let mut pieces: Vec<Word> = Vec::with_capacity(3);
        if before > 0 {
            pieces.push(Word::filler(bit, before as u32));
        }
        pieces.push(Word::literal(window));
        if after > 0 {
            pieces.push(Word::filler(bit, after as u32));
        }
        self.words.splice(ix..=ix, pieces);
    }

    fn grow_bounds(&mut self, offset: BitOffset) {
        self.bounds = Some(match self.bounds {
            None => Bounds { lowest: offset, highest: offset },
            Some(b) => Bounds {
                lowest: b.lowest.min(offset),
                highest: b.highest.max(offset),
            },
        });
    }

    /// Clearing an extremal bit forces a rescan of the word sequence
    fn shrink_bounds(&mut self, offset: BitOffset) {
        if self.cardinality == 0 {
            self.bounds = None;
            return;
        }
        if let Some(b) = self.bounds {
            if offset == b.lowest || offset == b.highest {
                let (range, ones) = codec::scan_stats(&self.words);
                debug_assert_eq!(ones, self.cardinality);
                self.bounds = range.map(|(lowest, highest)| Bounds { lowest, highest });
            }
        }
    }
}

impl Default for CompressedBitmapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressedBitmapBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompressedBitmapBuilder")
            .field("words", &self.words)
            .field("bounds", &self.bounds)
            .field("ones", &self.cardinality)
            .finish()
    }
}

fn check_offset(offset: BitOffset) -> Result<()> {
    if offset > MAX_OFFSET {
        Err(Error::OutOfRange(offset as u64))
    } else {
        Ok(())
    }
}
