// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! End-to-end tests for arithmetic-coded JPEG (SOF9 / SOF10).
//!
//! The vectors encode the same coefficient set as the Huffman-coded
//! `baseline_rich_13x13_420.jpg`, so both codings must converge on the
//! identical raster and coefficient grids.

use lumajpeg::frame::CodingProcess;
use lumajpeg::{decode, EntropyCoding};
use std::path::Path;

fn read_test_vector(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test-vectors")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

#[test]
fn arithmetic_sequential_metadata() {
    let img = decode(&read_test_vector("arith_seq_13x13_420.jpg")).unwrap();
    let fi = img.frame_info();
    assert_eq!(fi.process, CodingProcess::ExtendedSequential);
    assert_eq!(fi.coding, EntropyCoding::Arithmetic);
}

#[test]
fn arithmetic_sequential_matches_huffman() {
    let arith = decode(&read_test_vector("arith_seq_13x13_420.jpg")).unwrap();
    let expected = read_test_vector("rich_13x13_420.rgb");
    assert_eq!(arith.pixels(), &expected[..]);
}

#[test]
fn arithmetic_sequential_coefficients_match_huffman() {
    let arith = decode(&read_test_vector("arith_seq_13x13_420.jpg")).unwrap();
    let huffman = decode(&read_test_vector("baseline_rich_13x13_420.jpg")).unwrap();
    for ci in 0..3 {
        assert_eq!(
            arith.coefficients(ci).blocks(),
            huffman.coefficients(ci).blocks(),
            "component {ci} coefficients differ"
        );
    }
}

#[test]
fn arithmetic_progressive_matches_huffman() {
    let img = decode(&read_test_vector("arith_prog_13x13_420.jpg")).unwrap();
    let fi = img.frame_info();
    assert_eq!(fi.process, CodingProcess::Progressive);
    assert_eq!(fi.coding, EntropyCoding::Arithmetic);
    let expected = read_test_vector("rich_13x13_420.rgb");
    assert_eq!(img.pixels(), &expected[..]);
}

#[test]
fn arithmetic_streams_are_smaller_here() {
    // not a law, but a sanity anchor: on this content the arithmetic coder
    // outperforms the Huffman tables the vector was built with
    let arith = read_test_vector("arith_seq_13x13_420.jpg");
    let huffman = read_test_vector("baseline_rich_13x13_420.jpg");
    assert!(arith.len() < huffman.len());
}

#[test]
fn truncated_arithmetic_scan_still_decodes_or_fails_cleanly() {
    // the arithmetic decoder zero-fills past the end of a segment, so a cut
    // inside the scan body must never panic
    let original = read_test_vector("arith_seq_13x13_420.jpg");
    for cut in [60, 100, 150, original.len() - 10] {
        let _ = decode(&original[..cut]);
    }
}

#[test]
fn corrupted_arithmetic_does_not_panic() {
    let original = read_test_vector("arith_prog_13x13_420.jpg");
    for i in 0..original.len() {
        let mut data = original.clone();
        data[i] ^= 0xA5;
        let _ = decode(&data);
    }
}
