//! Naive boolean-array bitset used as the reference oracle

use rand::RngCore;
use rand_distr::{Bernoulli, Distribution, Poisson};

/// A plain boolean-array bitset: every operation the compressed types
/// support, implemented the obvious way
#[derive(Clone, Default)]
pub struct WitnessBits {
    bits: Vec<bool>,
}

impl WitnessBits {
    pub fn new() -> Self {
        Self { bits: Vec::new() }
    }

    pub fn from_bools(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Sets a bit, returning true if it was previously 0
    pub fn set(&mut self, offset: u32) -> bool {
        let ix = offset as usize;
        if ix >= self.bits.len() {
            self.bits.resize(ix + 1, false);
        }
        let was = self.bits[ix];
        self.bits[ix] = true;
        !was
    }

    /// Clears a bit, returning true if it was previously 1
    pub fn clear(&mut self, offset: u32) -> bool {
        let ix = offset as usize;
        if ix < self.bits.len() && self.bits[ix] {
            self.bits[ix] = false;
            true
        } else {
            false
        }
    }

    pub fn test(&self, offset: u32) -> bool {
        self.bits.get(offset as usize).copied().unwrap_or(false)
    }

    pub fn count_ones(&self) -> u64 {
        self.bits.iter().filter(|&&b| b).count() as u64
    }

    /// Lowest and highest set bit, `None` when no bit is set
    pub fn bounds(&self) -> Option<(u32, u32)> {
        let lowest = self.bits.iter().position(|&b| b)? as u32;
        let highest = self.bits.iter().rposition(|&b| b)? as u32;
        Some((lowest, highest))
    }

    /// Ascending positions of the set bits
    pub fn positions(&self) -> Vec<u32> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(ix, _)| ix as u32)
            .collect()
    }

    /// Packs the bits into bytes, bit `i` at `(buffer[i/8] >> (i%8)) & 1`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; (self.bits.len() + 7) / 8];
        for (ix, &bit) in self.bits.iter().enumerate() {
            if bit {
                bytes[ix / 8] |= 1 << (ix % 8);
            }
        }
        bytes
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

/// A bitset where every bit is set independently with probability `density`
pub fn random_bits(rng: &mut dyn RngCore, len: usize, density: f64) -> WitnessBits {
    let coin = Bernoulli::new(density).expect("density must be a probability");
    WitnessBits::from_bools((0..len).map(|_| coin.sample(rng)).collect())
}

/// A bitset made of alternating zero gaps and one runs with the given mean
/// lengths, so that the compressed form actually contains fillers
pub fn random_runs(
    rng: &mut dyn RngCore,
    len: usize,
    mean_gap: f32,
    mean_run: f32,
) -> WitnessBits {
    let gaps = Poisson::new(mean_gap).expect("invalid mean gap");
    let runs = Poisson::new(mean_run).expect("invalid mean run");
    let mut bits = Vec::with_capacity(len);
    while bits.len() < len {
        for _ in 0..gaps.sample(rng) as usize {
            bits.push(false);
        }
        for _ in 0..1 + runs.sample(rng) as usize {
            bits.push(true);
        }
    }
    bits.truncate(len);
    WitnessBits::from_bools(bits)
}

/// A script of `(set, offset)` operations over `0..max_offset`
pub fn random_ops(
    rng: &mut dyn RngCore,
    max_offset: u32,
    count: usize,
    set_ratio: f64,
) -> Vec<(bool, u32)> {
    let coin = Bernoulli::new(set_ratio).expect("ratio must be a probability");
    (0..count)
        .map(|_| (coin.sample(rng), rng.next_u32() % max_offset))
        .collect()
}
