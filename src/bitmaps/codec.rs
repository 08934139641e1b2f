//! Encoder, decoder and compressed logical operations
//!
//! Every word sequence produced by this module is in canonical shortest
//! form: a uniform 31-bit chunk is always stored as a filler (never as an
//! all-zero or all-one literal), adjacent runs of the same bit are merged,
//! and trailing zero runs are not stored at all.

use super::word::{Word, ALL_ONES, BITS_PER_WORD, MAX_FILL};

/// Canonicalizing appender for word streams.
///
/// The encoder, the logical operations and the builder all funnel their
/// output through this type, which is what guarantees the shortest-form
/// invariant everywhere.
pub(crate) struct WordWriter {
    words: Vec<Word>,
}

impl WordWriter {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Appends one 31-bit chunk, promoting uniform payloads to fillers
    pub fn push_payload(&mut self, payload: u32) {
        match payload {
            0 => self.push_fill(false, 1),
            ALL_ONES => self.push_fill(true, 1),
            _ => self.words.push(Word::literal(payload)),
        }
    }

    /// Appends a run of identical chunks, merging with a trailing run of the
    /// same bit and splitting at the maximum representable length
    pub fn push_fill(&mut self, bit: bool, count: u64) {
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

    /// Re-appends an existing word through the canonicalization rules
    pub fn push_word(&mut self, word: Word) {
        if word.is_literal() {
            self.push_payload(word.payload());
        } else {
            self.push_fill(word.fill_bit(), word.count() as u64);
        }
    }

    /// Finishes the stream, eliding the trailing zero run if any
    pub fn finish(mut self) -> Vec<Word> {
        if let Some(&last) = self.words.last() {
            if last.is_filler() && !last.fill_bit() {
                self.words.pop();
            }
        }
        self.words
    }
}

/// Compresses a raw buffer, bit `i` being `(buffer[i/8] >> (i%8)) & 1`.
///
/// A fully-zero buffer of any length compresses to zero words.
pub fn compress(buffer: &[u8]) -> Vec<Word> {
    let mut writer = WordWriter::new();
    let mut chunk: u32 = 0;
    let mut filled: u32 = 0;

    for &byte in buffer {
        let mut bits = byte as u32;
        let mut avail = 8u32;
        while avail > 0 {
            let take = avail.min(BITS_PER_WORD - filled);
            chunk |= (bits & ((1 << take) - 1)) << filled;
            filled += take;
            bits >>= take;
            avail -= take;
            if filled == BITS_PER_WORD {
                writer.push_payload(chunk);
                chunk = 0;
                filled = 0;
            }
        }
    }
    if filled > 0 {
        writer.push_payload(chunk);
    }
    writer.finish()
}

/// Binary operation over two compressed operands
#[derive(Clone, Copy, Debug)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Xor,
    AndNot,
    OrNot,
    XorNot,
}

impl LogicalOp {
    /// Combines two 31-bit payloads; the negation of the second operand is
    /// folded in for the `*Not` variants
    #[inline]
    fn apply(self, a: u32, b: u32) -> u32 {
        let r = match self {
            LogicalOp::And => a & b,
            LogicalOp::Or => a | b,
            LogicalOp::Xor => a ^ b,
            LogicalOp::AndNot => a & !b,
            LogicalOp::OrNot => a | !b,
            LogicalOp::XorNot => a ^ !b,
        };
        r & ALL_ONES
    }
}

/// One maximal homogeneous region of an operand stream
#[derive(Clone, Copy)]
enum Run {
    Literal(u32),
    Fill { bit: bool, len: u64 },
}

/// Walks a word sequence as a stream of runs, padding the tail with an
/// implicit zero run once the real words are exhausted
struct RunCursor<'a> {
    words: &'a [Word],
    ix: usize,
    /// Chunks already consumed from the word at `ix`
    consumed: u64,
}

impl<'a> RunCursor<'a> {
    fn new(words: &'a [Word]) -> Self {
        Self { words, ix: 0, consumed: 0 }
    }

    fn exhausted(&self) -> bool {
        self.ix >= self.words.len()
    }

    fn current(&self) -> Run {
        match self.words.get(self.ix) {
            None => Run::Fill { bit: false, len: u64::MAX },
            Some(w) if w.is_literal() => Run::Literal(w.payload()),
            Some(w) => Run::Fill {
                bit: w.fill_bit(),
                len: w.count() as u64 - self.consumed,
            },
        }
    }

    fn advance(&mut self, chunks: u64) {
        if self.exhausted() {
            return;
        }
        self.consumed += chunks;
        if self.consumed >= self.words[self.ix].chunks() {
            debug_assert!(self.consumed == self.words[self.ix].chunks());
            self.ix += 1;
            self.consumed = 0;
        }
    }
}

/// Applies `op` to two compressed word streams without expanding fillers.
///
/// The shorter operand is treated as zero-padded up to the longer one's
/// extent; for the `*Not` variants the folded negation therefore also
/// applies to that implicit tail. The result is canonical.
pub(crate) fn combine(a: &[Word], b: &[Word], op: LogicalOp) -> Vec<Word> {
    let mut ca = RunCursor::new(a);
    let mut cb = RunCursor::new(b);
    let mut out = WordWriter::new();

    while !ca.exhausted() || !cb.exhausted() {
        match (ca.current(), cb.current()) {
            (Run::Fill { bit: ba, len: la }, Run::Fill { bit: bb, len: lb }) => {
                let n = la.min(lb);
                let pa = if ba { ALL_ONES } else { 0 };
                let pb = if bb { ALL_ONES } else { 0 };
                let res = op.apply(pa, pb);
                debug_assert!(res == 0 || res == ALL_ONES);
                out.push_fill(res == ALL_ONES, n);
                ca.advance(n);
                cb.advance(n);
            }
            (Run::Literal(pa), Run::Fill { bit: bb, .. }) => {
                out.push_payload(op.apply(pa, if bb { ALL_ONES } else { 0 }));
                ca.advance(1);
                cb.advance(1);
            }
            (Run::Fill { bit: ba, .. }, Run::Literal(pb)) => {
                out.push_payload(op.apply(if ba { ALL_ONES } else { 0 }, pb));
                ca.advance(1);
                cb.advance(1);
            }
            (Run::Literal(pa), Run::Literal(pb)) => {
                out.push_payload(op.apply(pa, pb));
                ca.advance(1);
                cb.advance(1);
            }
        }
    }
    out.finish()
}

/// Bounds and cardinality of a word sequence, computed in one pass
pub(crate) fn scan_stats(words: &[Word]) -> (Option<(u32, u32)>, u64) {
    let mut lowest: Option<u64> = None;
    let mut highest: Option<u64> = None;
    let mut ones: u64 = 0;
    let mut base: u64 = 0;

    for w in words {
        if w.is_literal() {
            let p = w.payload();
            if p != 0 {
                let lo = base + p.trailing_zeros() as u64;
                let hi = base + (31 - p.leading_zeros()) as u64;
                lowest.get_or_insert(lo);
                highest = Some(hi);
                ones += p.count_ones() as u64;
            }
            base += BITS_PER_WORD as u64;
        } else {
            let span = w.count() as u64 * BITS_PER_WORD as u64;
            if w.fill_bit() {
                lowest.get_or_insert(base);
                highest = Some(base + span - 1);
                ones += span;
            }
            base += span;
        }
    }
    let bounds = match (lowest, highest) {
        (Some(lo), Some(hi)) => Some((lo as u32, hi as u32)),
        _ => None,
    };
    (bounds, ones)
}
