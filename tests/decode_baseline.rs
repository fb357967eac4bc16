// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! End-to-end decoding tests for sequential (baseline / extended) JPEG.
//!
//! Inputs live in `test-vectors/`; `.rgb` files hold the expected raster
//! bytes for images whose output is not a trivial solid fill.

use lumajpeg::frame::CodingProcess;
use lumajpeg::{decode, EntropyCoding, Error};
use std::path::Path;

fn read_test_vector(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test-vectors")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

#[test]
fn solid_black_8x8() {
    let img = decode(&read_test_vector("black_8x8.jpg")).unwrap();
    assert_eq!((img.width(), img.height()), (8, 8));
    assert_eq!(img.pixels().len(), 192);
    assert!(img.pixels().iter().all(|&b| b == 0));
}

#[test]
fn solid_white_8x8() {
    let img = decode(&read_test_vector("white_8x8.jpg")).unwrap();
    assert_eq!(img.pixels().len(), 192);
    assert!(img.pixels().iter().all(|&b| b == 255));
}

#[test]
fn four_color_13x13_420() {
    let img = decode(&read_test_vector("color_13x13_420.jpg")).unwrap();
    let fi = img.frame_info();
    assert_eq!((fi.width, fi.height), (13, 13));
    assert_eq!(fi.components.len(), 3);
    assert_eq!(fi.process, CodingProcess::Baseline);
    assert_eq!(fi.coding, EntropyCoding::Huffman);
    assert_eq!((fi.max_h_sampling, fi.max_v_sampling), (2, 2));
    assert_eq!(img.pixels().len(), 13 * 13 * 3);
    assert_eq!(img.pixels(), &read_test_vector("color_13x13_420.rgb")[..]);
}

#[test]
fn non_aligned_size_is_crop_of_aligned() {
    // The 13x13 raster must equal the top-left 13x13 rectangle of the
    // 16x16 image built from the same coefficients.
    let small = decode(&read_test_vector("color_13x13_420.jpg")).unwrap();
    let large = decode(&read_test_vector("color_16x16_420.jpg")).unwrap();
    assert_eq!(large.pixels().len(), 16 * 16 * 3);

    let mut crop = Vec::with_capacity(13 * 13 * 3);
    for y in 0..13 {
        let row = &large.pixels()[y * 16 * 3..(y * 16 + 13) * 3];
        crop.extend_from_slice(row);
    }
    assert_eq!(small.pixels(), &crop[..]);
}

#[test]
fn restart_intervals() {
    let img = decode(&read_test_vector("restart_32x8_r2.jpg")).unwrap();
    assert_eq!((img.width(), img.height()), (32, 8));
    assert_eq!(img.pixels(), &read_test_vector("restart_32x8_r2.rgb")[..]);
}

#[test]
fn non_interleaved_scans() {
    // three single-component sequential scans produce the same raster as
    // the interleaved encoding of the same coefficients
    let img = decode(&read_test_vector("noninterleaved_13x13_420.jpg")).unwrap();
    assert_eq!(img.pixels(), &read_test_vector("rich_13x13_420.rgb")[..]);
}

#[test]
fn extended_sequential_16bit_dqt() {
    let img = decode(&read_test_vector("ext16_16x8.jpg")).unwrap();
    let fi = img.frame_info();
    assert_eq!(fi.process, CodingProcess::ExtendedSequential);
    assert_eq!(fi.coding, EntropyCoding::Huffman);
    assert_eq!(img.pixels(), &read_test_vector("ext16_16x8.rgb")[..]);
}

#[test]
fn grayscale_replicates_channels() {
    let img = decode(&read_test_vector("black_8x8.jpg")).unwrap();
    assert_eq!(img.frame_info().components.len(), 1);
    for px in img.pixels().chunks(3) {
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }
}

#[test]
fn coefficients_are_exposed() {
    // the all-black image is a single DC-only block of -1024 (so that
    // Y + 128 == 0 with a unit quantizer)
    let img = decode(&read_test_vector("black_8x8.jpg")).unwrap();
    let grid = img.coefficients(0);
    assert_eq!((grid.cols(), grid.rows()), (1, 1));
    let block = grid.block(0, 0);
    assert_eq!(block[0], -1024);
    assert!(block[1..].iter().all(|&c| c == 0));
}

#[test]
fn output_stays_in_byte_range() {
    // trivially true for u8 output; kept as the clamp law anchor over the
    // richest vector
    let img = decode(&read_test_vector("baseline_rich_13x13_420.jpg")).unwrap();
    assert_eq!(img.pixels().len(), 507);
}

#[test]
fn truncated_scan_data_fails_cleanly() {
    let mut data = read_test_vector("color_13x13_420.jpg");
    data.truncate(data.len() - 40);
    assert!(matches!(
        decode(&data),
        Err(Error::UnexpectedEof) | Err(Error::HuffmanDecode)
    ));
}

#[test]
fn truncated_header_fails_cleanly() {
    let data = read_test_vector("color_13x13_420.jpg");
    for cut in [3, 5, 10, 25, 60] {
        assert!(decode(&data[..cut]).is_err());
    }
}

#[test]
fn corrupted_entropy_data_does_not_panic() {
    let original = read_test_vector("color_13x13_420.jpg");
    for i in 0..original.len() {
        let mut data = original.clone();
        data[i] ^= 0x55;
        let _ = decode(&data); // any Result is fine, panics are not
    }
}
