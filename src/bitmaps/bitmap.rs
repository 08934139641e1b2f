//! Immutable compressed bitmaps

use std::fmt;
use std::sync::Arc;

use crate::base::{BitOffset, MAX_OFFSET};
use crate::errors::{Error, Result};

use super::builder::CompressedBitmapBuilder;
use super::codec::{self, LogicalOp};
use super::word::{Word, BITS_PER_WORD};

/// Lowest and highest set bit of a non-empty bitmap
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bounds {
    pub lowest: BitOffset,
    pub highest: BitOffset,
}

/// An immutable, canonical compressed bitmap.
///
/// The word storage is shared, so cloning is cheap and a bitmap can be read
/// from any number of threads concurrently. Bounds and cardinality are
/// computed once at construction and are consistent with the word sequence
/// by definition.
#[derive(Clone)]
pub struct CompressedBitmap {
    words: Arc<[Word]>,
    bounds: Option<Bounds>,
    cardinality: u64,
}

impl CompressedBitmap {
    /// The empty bitmap (zero words)
    pub fn empty() -> Self {
        Self::from_words(Vec::new())
    }

    /// Builds a bitmap from a canonical word sequence
    pub(crate) fn from_words(words: Vec<Word>) -> Self {
        let (range, cardinality) = codec::scan_stats(&words);
        Self {
            words: Arc::from(words),
            bounds: range.map(|(lowest, highest)| Bounds { lowest, highest }),
            cardinality,
        }
    }

    /// Compresses a raw buffer (bit `i` is `(buffer[i/8] >> (i%8)) & 1`)
    pub fn from_bits(buffer: &[u8]) -> Self {
        Self::from_words(codec::compress(buffer))
    }

    pub(crate) fn words(&self) -> &[Word] {
        &self.words
    }

    /// Number of words in the compressed form
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Lowest/highest set bit, `None` for the empty bitmap
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Number of set bits
    pub fn count_ones(&self) -> u64 {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Tests bit `offset` by walking the word sequence, skipping fillers in
    /// one step each
    pub fn test(&self, offset: BitOffset) -> Result<bool> {
        if offset > MAX_OFFSET {
            return Err(Error::OutOfRange(offset as u64));
        }
        // Outside the cached bounds, the answer is known without a walk
        match self.bounds {
            None => return Ok(false),
            Some(b) if offset < b.lowest || offset > b.highest => return Ok(false),
            _ => {}
        }
        let chunk = (offset / BITS_PER_WORD) as u64;
        let bit = offset % BITS_PER_WORD;
        let mut base: u64 = 0;
        for w in self.words.iter() {
            let span = w.chunks();
            if chunk < base + span {
                return Ok(if w.is_literal() {
                    w.payload() & (1 << bit) != 0
                } else {
                    w.fill_bit()
                });
            }
            base += span;
        }
        Ok(false)
    }

    /// A fresh ascending iterator over the set-bit positions
    pub fn view(&self) -> SetBits {
        SetBits::new(Arc::clone(&self.words))
    }

    /// Serializes as a flat sequence of 4-byte little-endian words, with no
    /// header. Identical bitmaps always produce identical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * 4);
        for w in self.words.iter() {
            out.extend_from_slice(&w.raw().to_le_bytes());
        }
        out
    }

    /// Rebuilds a bitmap from its flat serialized form
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % 4 != 0 {
            return Err(Error::Malformed("payload length is not a multiple of 4"));
        }
        let mut words = Vec::with_capacity(data.len() / 4);
        for raw in data.chunks_exact(4) {
            let raw = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            let word =
                Word::from_raw(raw).ok_or(Error::Malformed("filler word with a zero run length"))?;
            words.push(word);
        }
        Ok(Self::from_words(words))
    }

    /// A mutable builder seeded with this bitmap's contents
    pub fn to_builder(&self) -> CompressedBitmapBuilder {
        CompressedBitmapBuilder::from_bitmap(self)
    }

    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::And)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::Or)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::Xor)
    }

    /// Bits set in `self` but not in `other`
    pub fn and_not(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::AndNot)
    }

    pub fn or_not(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::OrNot)
    }

    pub fn xor_not(&self, other: &Self) -> Self {
        self.combine(other, LogicalOp::XorNot)
    }

    fn combine(&self, other: &Self, op: LogicalOp) -> Self {
        Self::from_words(codec::combine(&self.words, &other.words, op))
    }
}

impl fmt::Debug for CompressedBitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompressedBitmap")
            .field("words", &self.words)
            .field("bounds", &self.bounds)
            .field("ones", &self.cardinality)
            .finish()
    }
}

/// Ascending iterator over set-bit positions.
///
/// Zero fillers are skipped in O(1); one fillers are expanded position by
/// position as they are consumed.
pub struct SetBits {
    words: Arc<[Word]>,
    ix: usize,
    /// Raw offset of the first bit of the next unread word
    next_base: u64,
    /// Unconsumed set bits of the current literal
    pending: u32,
    /// Raw offset matching bit 0 of `pending`
    pending_base: u64,
    /// Remaining positions of the current one filler
    fill_rem: u64,
    fill_pos: u64,
}

impl SetBits {
    pub(crate) fn new(words: Arc<[Word]>) -> Self {
        Self {
            words,
            ix: 0,
            next_base: 0,
            pending: 0,
            pending_base: 0,
            fill_rem: 0,
            fill_pos: 0,
        }
    }
}

impl Iterator for SetBits {
    type Item = BitOffset;

    fn next(&mut self) -> Option<BitOffset> {
        loop {
            if self.fill_rem > 0 {
                let pos = self.fill_pos;
                self.fill_pos += 1;
                self.fill_rem -= 1;
                return Some(pos as BitOffset);
            }
            if self.pending != 0 {
                let tz = self.pending.trailing_zeros();
                self.pending &= self.pending - 1;
                return Some((self.pending_base + tz as u64) as BitOffset);
            }
            let w = *self.words.get(self.ix)?;
            self.ix += 1;
            if w.is_literal() {
                self.pending = w.payload();
                self.pending_base = self.next_base;
                self.next_base += BITS_PER_WORD as u64;
            } else {
                let span = w.count() as u64 * BITS_PER_WORD as u64;
                if w.fill_bit() {
                    self.fill_pos = self.next_base;
                    self.fill_rem = span;
                }
                self.next_base += span;
            }
        }
    }
}
