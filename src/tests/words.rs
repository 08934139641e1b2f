//! Tests for the crate-private word writer and stream combiner

use crate::bitmaps::codec::{combine, compress, scan_stats, LogicalOp, WordWriter};
use crate::bitmaps::word::{Word, ALL_ONES, MAX_FILL};

#[test]
fn uniform_payloads_become_fillers() {
    let mut writer = WordWriter::new();
    writer.push_payload(0);
    writer.push_payload(0);
    writer.push_payload(ALL_ONES);
    writer.push_payload(0b101);
    let words = writer.finish();
    assert_eq!(
        words,
        vec![
            Word::filler(false, 2),
            Word::filler(true, 1),
            Word::literal(0b101)
        ]
    );
}

#[test]
fn adjacent_runs_merge() {
    let mut writer = WordWriter::new();
    writer.push_fill(true, 2);
    writer.push_fill(true, 3);
    writer.push_payload(1);
    let words = writer.finish();
    assert_eq!(words, vec![Word::filler(true, 5), Word::literal(1)]);
}

#[test]
fn oversized_runs_split_at_max_fill() {
    let mut writer = WordWriter::new();
    writer.push_fill(false, MAX_FILL as u64 + 5);
    writer.push_payload(1);
    let words = writer.finish();
    assert_eq!(
        words,
        vec![
            Word::filler(false, MAX_FILL),
            Word::filler(false, 5),
            Word::literal(1)
        ]
    );
}

#[test]
fn trailing_zero_run_is_elided() {
    let mut writer = WordWriter::new();
    writer.push_payload(7);
    writer.push_fill(false, 10);
    assert_eq!(writer.finish(), vec![Word::literal(7)]);
}

#[test]
fn compress_empty_and_zero_buffers() {
    assert!(compress(&[]).is_empty());
    assert!(compress(&[0u8; 100]).is_empty());
}

#[test]
fn compress_all_ones_is_one_filler() {
    // 31 bytes = 248 bits = exactly 8 chunks
    let words = compress(&[0xFFu8; 31]);
    assert_eq!(words, vec![Word::filler(true, 8)]);
}

#[test]
fn combine_pads_the_missing_tail_with_zeros() {
    let a = vec![Word::filler(true, 3)];
    let b = vec![Word::filler(true, 1)];
    // Beyond b's extent the AND result is all zero, which is not stored
    assert_eq!(
        combine(&a, &b, LogicalOp::And),
        vec![Word::filler(true, 1)]
    );

    // The negation applies to b's implicit zero tail as well
    let a = vec![Word::literal(0b101)];
    let b = Vec::new();
    assert_eq!(
        combine(&a, &b, LogicalOp::OrNot),
        vec![Word::filler(true, 1)]
    );
}

#[test]
fn combine_merges_overlapping_runs_without_expansion() {
    let a = vec![Word::filler(true, 10), Word::literal(0b11)];
    let b = vec![Word::filler(true, 4), Word::filler(false, 7)];
    let result = combine(&a, &b, LogicalOp::And);
    // Ones only where both runs are ones
    assert_eq!(result, vec![Word::filler(true, 4)]);
}

#[test]
fn scan_stats_reports_bounds_and_cardinality() {
    let words = vec![Word::filler(false, 2), Word::literal(0b100)];
    let (bounds, ones) = scan_stats(&words);
    assert_eq!(bounds, Some((64, 64)));
    assert_eq!(ones, 1);

    let words = vec![Word::filler(true, 2)];
    let (bounds, ones) = scan_stats(&words);
    assert_eq!(bounds, Some((0, 61)));
    assert_eq!(ones, 62);

    assert_eq!(scan_stats(&[]), (None, 0));
}
