//! Witness-based tests for the compressed bitmap engine

use bitmap_index::base::MAX_OFFSET;
use bitmap_index::bitmaps::{CompressedBitmap, CompressedBitmapBuilder};
use bitmap_index::errors::Error;
use helpers::bits::{random_bits, random_ops, random_runs, WitnessBits};
use ntest::timeout;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

const TYPE_BIT: u32 = 0x8000_0000;
const FILL_ONE_BIT: u32 = 0x4000_0000;
const COUNT_MASK: u32 = 0x3FFF_FFFF;
const ALL_ONES: u32 = 0x7FFF_FFFF;

/// Decodes the serialized form back into raw 32-bit words
fn raw_words(bitmap: &CompressedBitmap) -> Vec<u32> {
    bitmap
        .to_bytes()
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Checks every canonical-form rule on the serialized words
fn assert_canonical(bitmap: &CompressedBitmap) {
    let words = raw_words(bitmap);
    let mut previous_fill: Option<bool> = None;
    for (ix, &raw) in words.iter().enumerate() {
        if raw & TYPE_BIT == 0 {
            let payload = raw & ALL_ONES;
            assert!(
                payload != 0 && payload != ALL_ONES,
                "uniform literal {:#010x} at {}",
                raw,
                ix
            );
            previous_fill = None;
        } else {
            let bit = raw & FILL_ONE_BIT != 0;
            assert!(raw & COUNT_MASK > 0, "zero-length filler at {}", ix);
            assert!(
                previous_fill != Some(bit),
                "unmerged adjacent fillers at {}",
                ix
            );
            previous_fill = Some(bit);
        }
    }
    if let Some(&last) = words.last() {
        assert!(
            last & TYPE_BIT == 0 || last & FILL_ONE_BIT != 0,
            "stored trailing zero run"
        );
    }
}

/// Compares a bitmap with the witness on every observable
fn assert_same(bitmap: &CompressedBitmap, witness: &WitnessBits) {
    assert_eq!(bitmap.count_ones(), witness.count_ones());
    assert_eq!(
        bitmap.bounds().map(|b| (b.lowest, b.highest)),
        witness.bounds()
    );
    for offset in 0..(witness.len() as u32 + 64) {
        assert_eq!(
            bitmap.test(offset).unwrap(),
            witness.test(offset),
            "bit {} differs",
            offset
        );
    }
    let positions: Vec<u32> = bitmap.view().collect();
    assert_eq!(positions, witness.positions());
}

#[rstest]
#[case(0, 0.5, 1)]
#[case(1, 0.5, 2)]
#[case(31, 0.2, 3)]
#[case(32, 0.8, 4)]
#[case(62, 0.5, 5)]
#[case(100, 0.01, 6)]
#[case(1000, 0.99, 7)]
#[case(4096, 0.5, 8)]
fn roundtrip_random(#[case] len: usize, #[case] density: f64, #[case] seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let witness = random_bits(&mut rng, len, density);
    let bitmap = CompressedBitmap::from_bits(&witness.to_bytes());
    assert_same(&bitmap, &witness);
    assert_canonical(&bitmap);
}

#[rstest]
#[case(2000, 50., 80., 10)]
#[case(5000, 200., 10., 11)]
#[case(3000, 5., 300., 12)]
fn roundtrip_run_heavy(
    #[case] len: usize,
    #[case] mean_gap: f32,
    #[case] mean_run: f32,
    #[case] seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let witness = random_runs(&mut rng, len, mean_gap, mean_run);
    let bitmap = CompressedBitmap::from_bits(&witness.to_bytes());
    assert_same(&bitmap, &witness);
    assert_canonical(&bitmap);
    // Runs must actually compress
    assert!(bitmap.word_count() < len / 31 + 2);
}

#[test]
fn compression_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);
    let witness = random_bits(&mut rng, 500, 0.3);
    let bytes = witness.to_bytes();
    let first = CompressedBitmap::from_bits(&bytes);
    let second = CompressedBitmap::from_bits(&bytes);
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
fn zero_input_compresses_to_nothing() {
    for len in [0usize, 1, 10, 1000] {
        let bitmap = CompressedBitmap::from_bits(&vec![0u8; len]);
        assert_eq!(bitmap.word_count(), 0);
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.bounds(), None);
    }
}

#[test]
fn ones_input_compresses_to_one_filler() {
    // 93 bits = exactly 3 chunks
    let mut witness = WitnessBits::new();
    for offset in 0..93 {
        witness.set(offset);
    }
    let bitmap = CompressedBitmap::from_bits(&witness.to_bytes());
    let words = raw_words(&bitmap);
    assert_eq!(words, vec![TYPE_BIT | FILL_ONE_BIT | 3]);
    assert_same(&bitmap, &witness);
}

#[test]
#[timeout(30000)]
fn serialized_roundtrip_is_byte_exact() {
    let mut rng = StdRng::seed_from_u64(9);
    let witness = random_runs(&mut rng, 4000, 100., 60.);
    let bitmap = CompressedBitmap::from_bits(&witness.to_bytes());
    let bytes = bitmap.to_bytes();
    let reloaded = CompressedBitmap::from_bytes(&bytes).unwrap();
    assert_eq!(reloaded.to_bytes(), bytes);
    assert_same(&reloaded, &witness);
}

#[test]
fn malformed_payloads_are_rejected() {
    assert!(matches!(
        CompressedBitmap::from_bytes(&[1, 2, 3]),
        Err(Error::Malformed(_))
    ));
    // A filler word with a zero run length
    let raw = TYPE_BIT.to_le_bytes();
    assert!(matches!(
        CompressedBitmap::from_bytes(&raw),
        Err(Error::Malformed(_))
    ));
}

// --- Logical operations

fn expected_bits(
    a: &CompressedBitmap,
    b: &CompressedBitmap,
    extent: u32,
    op: impl Fn(bool, bool) -> bool,
) -> Vec<u32> {
    (0..extent)
        .filter(|&i| op(a.test(i).unwrap(), b.test(i).unwrap()))
        .collect()
}

#[rstest]
#[case(300, 300, 0.5, 0.5, 21)]
#[case(300, 900, 0.1, 0.9, 22)]
#[case(1000, 40, 0.9, 0.1, 23)]
#[case(500, 500, 0.02, 0.02, 24)]
fn logical_ops_match_the_witness(
    #[case] len_a: usize,
    #[case] len_b: usize,
    #[case] density_a: f64,
    #[case] density_b: f64,
    #[case] seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let wa = random_bits(&mut rng, len_a, density_a);
    let wb = random_bits(&mut rng, len_b, density_b);
    let a = CompressedBitmap::from_bits(&wa.to_bytes());
    let b = CompressedBitmap::from_bits(&wb.to_bytes());

    // Cover both operands' extents plus the padding rules' edge
    let extent = (len_a.max(len_b) as u32 / 31 + 2) * 31;

    let cases: Vec<(CompressedBitmap, Box<dyn Fn(bool, bool) -> bool>)> = vec![
        (a.and(&b), Box::new(|x, y| x && y)),
        (a.or(&b), Box::new(|x, y| x || y)),
        (a.xor(&b), Box::new(|x, y| x ^ y)),
        (a.and_not(&b), Box::new(|x, y| x && !y)),
        (a.or_not(&b), Box::new(|x, y| x || !y)),
        (a.xor_not(&b), Box::new(|x, y| x ^ !y)),
    ];
    for (result, op) in cases {
        assert_canonical(&result);
        let positions: Vec<u32> = result.view().take(extent as usize).collect();
        let expected = expected_bits(&a, &b, extent, op);
        // Within the combined extent the results must agree exactly; the
        // *_not variants may extend past it only through one fillers, which
        // the take() above already excludes from the comparison
        let clipped: Vec<u32> = positions.into_iter().filter(|&p| p < extent).collect();
        assert_eq!(clipped, expected);
    }
}

#[test]
fn concrete_logical_scenario() {
    // A has bits {1,2}, B has bits {2,3}
    let mut wa = WitnessBits::new();
    wa.set(1);
    wa.set(2);
    let mut wb = WitnessBits::new();
    wb.set(2);
    wb.set(3);
    let a = CompressedBitmap::from_bits(&wa.to_bytes());
    let b = CompressedBitmap::from_bits(&wb.to_bytes());

    assert_eq!(a.and(&b).view().collect::<Vec<_>>(), vec![2]);
    assert_eq!(a.or(&b).view().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(a.xor(&b).view().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(a.and_not(&b).view().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn ops_merge_runs_without_expansion() {
    let mut wa = WitnessBits::new();
    let mut wb = WitnessBits::new();
    for offset in 0..3100 {
        wa.set(offset);
    }
    for offset in 1000..2000 {
        wb.set(offset);
    }
    let a = CompressedBitmap::from_bits(&wa.to_bytes());
    let b = CompressedBitmap::from_bits(&wb.to_bytes());

    let and = a.and(&b);
    assert_eq!(and.count_ones(), 1000);
    assert_eq!(
        and.bounds().map(|r| (r.lowest, r.highest)),
        Some((1000, 1999))
    );
    // The result stays a handful of words
    assert!(and.word_count() <= 4, "got {} words", and.word_count());
    assert_canonical(&and);
}

// --- Builder

#[test]
fn builder_concrete_scenario() {
    let mut builder = CompressedBitmapBuilder::new();
    assert!(builder.set(0).unwrap());
    assert!(builder.set(17).unwrap());
    assert!(!builder.set(17).unwrap());
    assert!(builder.clear(17).unwrap());
    assert!(!builder.clear(17).unwrap());

    assert!(builder.test(0).unwrap());
    assert!(!builder.test(17).unwrap());
    assert_eq!(builder.count_ones(), 1);
    let bounds = builder.bounds().unwrap();
    assert_eq!((bounds.lowest, bounds.highest), (0, 0));
}

#[rstest]
#[case(200, 400, 0.7, 31)]
#[case(2000, 1500, 0.5, 32)]
#[case(100, 3000, 0.3, 33)]
fn builder_matches_the_witness(
    #[case] max_offset: u32,
    #[case] operations: usize,
    #[case] set_ratio: f64,
    #[case] seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let script = random_ops(&mut rng, max_offset, operations, set_ratio);

    let mut builder = CompressedBitmapBuilder::new();
    let mut witness = WitnessBits::new();

    for (step, (set, offset)) in script.into_iter().enumerate() {
        let (actual, expected) = if set {
            (builder.set(offset).unwrap(), witness.set(offset))
        } else {
            (builder.clear(offset).unwrap(), witness.clear(offset))
        };
        assert_eq!(actual, expected, "change report differs at step {}", step);
        assert_eq!(builder.count_ones(), witness.count_ones());
        assert_eq!(builder.bounds().map(|b| (b.lowest, b.highest)), witness.bounds());
        assert_eq!(builder.test(offset).unwrap(), witness.test(offset));
    }

    // The materialized bitmap is canonical: byte-identical to compressing
    // the witness directly
    let bitmap = builder.to_bitmap();
    assert_same(&bitmap, &witness);
    assert_canonical(&bitmap);
    let direct = CompressedBitmap::from_bits(&witness.to_bytes());
    assert_eq!(bitmap.to_bytes(), direct.to_bytes());
}

#[test]
fn builder_splits_a_zero_run() {
    let mut builder = CompressedBitmapBuilder::new();
    // Two distant bits create a long zero run in between
    assert!(builder.set(0).unwrap());
    assert!(builder.set(10_000).unwrap());
    assert!(builder.set(5_000).unwrap());

    let mut witness = WitnessBits::new();
    witness.set(0);
    witness.set(10_000);
    witness.set(5_000);

    let bitmap = builder.to_bitmap();
    assert_same(&bitmap, &witness);
    // Three literals and two fillers at most
    assert!(bitmap.word_count() <= 5, "got {} words", bitmap.word_count());
}

#[test]
fn builder_splits_a_one_run() {
    let mut witness = WitnessBits::new();
    for offset in 0..310 {
        witness.set(offset);
    }
    let mut builder = CompressedBitmap::from_bits(&witness.to_bytes()).to_builder();

    assert!(builder.clear(155).unwrap());
    assert!(!builder.clear(155).unwrap());
    witness.clear(155);

    let bitmap = builder.to_bitmap();
    assert_same(&bitmap, &witness);
    assert_canonical(&bitmap);
}

#[test]
fn clearing_an_extremal_bit_rescans_the_bounds() {
    let mut builder = CompressedBitmapBuilder::new();
    for offset in [5u32, 100, 9000] {
        builder.set(offset).unwrap();
    }

    assert!(builder.clear(9000).unwrap());
    let bounds = builder.bounds().unwrap();
    assert_eq!((bounds.lowest, bounds.highest), (5, 100));

    assert!(builder.clear(5).unwrap());
    let bounds = builder.bounds().unwrap();
    assert_eq!((bounds.lowest, bounds.highest), (100, 100));

    assert!(builder.clear(100).unwrap());
    assert_eq!(builder.bounds(), None);
    assert_eq!(builder.count_ones(), 0);
}

#[test]
fn builder_append_extends_the_trailing_run() {
    let mut builder = CompressedBitmapBuilder::new();
    for offset in (0..31_000).step_by(1000) {
        builder.set(offset).unwrap();
    }
    let bitmap = builder.to_bitmap();
    assert_eq!(bitmap.count_ones(), 31);
    // 31 literals interleaved with zero runs
    assert!(bitmap.word_count() <= 62, "got {} words", bitmap.word_count());
    assert_canonical(&bitmap);
}

#[test]
fn offsets_past_the_bound_fail_fast() {
    let mut builder = CompressedBitmapBuilder::new();
    assert!(matches!(
        builder.set(MAX_OFFSET + 1),
        Err(Error::OutOfRange(_))
    ));
    assert!(matches!(
        builder.clear(u32::MAX),
        Err(Error::OutOfRange(_))
    ));
    assert!(matches!(
        builder.test(MAX_OFFSET + 1),
        Err(Error::OutOfRange(_))
    ));
    let bitmap = CompressedBitmap::empty();
    assert!(matches!(
        bitmap.test(MAX_OFFSET + 1),
        Err(Error::OutOfRange(_))
    ));

    // The bound itself is addressable
    assert!(builder.set(MAX_OFFSET).unwrap());
    assert!(builder.test(MAX_OFFSET).unwrap());
}

#[test]
fn to_bools_matches_the_witness() {
    let mut rng = StdRng::seed_from_u64(77);
    let witness = random_bits(&mut rng, 200, 0.4);
    let mut builder = CompressedBitmapBuilder::new();
    for position in witness.positions() {
        builder.set(position).unwrap();
    }
    let bools = builder.to_bools();
    for (ix, &bit) in bools.iter().enumerate() {
        assert_eq!(bit, witness.test(ix as u32));
    }
    assert_eq!(
        bools.len() as u32,
        witness.bounds().map(|(_, high)| high + 1).unwrap_or(0)
    );
}
