// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! Coefficient-to-pixel pipeline: dequantization, inverse DCT, chroma
//! alignment and color conversion.
//!
//! The IDCT is the reference cosine form computed separably in f64. Samples
//! leave the IDCT unshifted; the JFIF +128 level shift is applied in the
//! color stage, identically for grayscale and Y′CbCr images. Components with
//! lower sampling factors are aligned to pixel resolution by nearest-
//! neighbour replication.

use std::sync::OnceLock;

use rayon::prelude::*;

use super::dct::{Block, DctGrid, QuantTable};
use super::error::{JpegError, Result};
use super::frame::FrameInfo;

/// Pre-computed 8×8 cosine table.
/// `COSINE[u][x] = cos((2*x + 1) * u * PI / 16)`
static COSINE: OnceLock<[[f64; 8]; 8]> = OnceLock::new();

/// Normalization constants: C(0) = 1/sqrt(8), C(u>0) = 1/2.
static NORM: OnceLock<[f64; 8]> = OnceLock::new();

fn cosine_table() -> &'static [[f64; 8]; 8] {
    COSINE.get_or_init(|| {
        let mut table = [[0.0f64; 8]; 8];
        for u in 0..8 {
            for x in 0..8 {
                table[u][x] =
                    ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos();
            }
        }
        table
    })
}

fn norm_table() -> &'static [f64; 8] {
    NORM.get_or_init(|| {
        let mut n = [0.5f64; 8];
        n[0] = 1.0 / (8.0f64).sqrt();
        n
    })
}

/// Dequantize + 8×8 IDCT → 64 spatial samples, unshifted.
///
/// Input: one quantized coefficient block in natural (row-major) order.
/// Output: signed sample values (approximately -128..128).
pub fn idct_block(quantized: &Block, qt: &QuantTable) -> [f64; 64] {
    let cos = cosine_table();
    let c = norm_table();

    // Dequantize
    let mut f = [0.0f64; 64];
    for i in 0..64 {
        f[i] = quantized[i] as f64 * qt[i] as f64;
    }

    // Separable IDCT: columns then rows.
    let mut temp = [0.0f64; 64];
    for col in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0;
            for v in 0..8 {
                sum += c[v] * f[v * 8 + col] * cos[v][y];
            }
            temp[y * 8 + col] = sum;
        }
    }

    let mut samples = [0.0f64; 64];
    for row in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0;
            for u in 0..8 {
                sum += c[u] * temp[row * 8 + u] * cos[u][x];
            }
            samples[row * 8 + x] = sum;
        }
    }

    samples
}

/// One component's spatial samples at full block resolution.
struct SamplePlane {
    samples: Vec<f64>,
    width: usize,
}

/// IDCT every block of a component into a sample plane.
///
/// Block rows are independent: the grid's block-row chunks are zipped with
/// the matching eight-row bands of the plane and the pairs fan out across
/// the rayon pool.
fn idct_plane(grid: &DctGrid, qt: &QuantTable) -> SamplePlane {
    let cols = grid.cols();
    let width = cols * 8;
    let mut samples = vec![0.0f64; width * grid.rows() * 8];

    samples
        .par_chunks_mut(width * 8)
        .zip(grid.blocks().par_chunks(cols))
        .for_each(|(band, row_blocks)| {
            for (bc, coeffs) in row_blocks.iter().enumerate() {
                let block = idct_block(coeffs, qt);
                for row in 0..8 {
                    for col in 0..8 {
                        band[row * width + bc * 8 + col] = block[row * 8 + col];
                    }
                }
            }
        });

    SamplePlane { samples, width }
}

/// Clamp to [0, 255] and round to the nearest integer.
#[inline]
fn clamp_round(x: f64) -> u8 {
    x.clamp(0.0, 255.0).round() as u8
}

/// Convert decoded coefficient grids into an interleaved RGB raster.
///
/// The raster is `height * width * 3` bytes, row-major, top-to-bottom. For
/// 1-component images the level-shifted luminance is replicated into all
/// three channels; 3-component images are converted per JFIF 1.02.
pub fn render_rgb(
    frame: &FrameInfo,
    grids: &[DctGrid],
    quant: &[Option<QuantTable>; 4],
) -> Result<Vec<u8>> {
    if frame.components.len() != 1 && frame.components.len() != 3 {
        return Err(JpegError::UnsupportedComponentCount(
            frame.components.len() as u8,
        ));
    }

    let mut planes = Vec::with_capacity(frame.components.len());
    for (ci, comp) in frame.components.iter().enumerate() {
        let qt = quant[comp.quant_table_id as usize]
            .as_ref()
            .ok_or(JpegError::MissingQuantTable(comp.quant_table_id))?;
        planes.push(idct_plane(&grids[ci], qt));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let max_h = frame.max_h_sampling as usize;
    let max_v = frame.max_v_sampling as usize;
    let mut raster = vec![0u8; width * height * 3];

    if planes.len() == 1 {
        let plane = &planes[0];
        for y in 0..height {
            for x in 0..width {
                let v = clamp_round(plane.samples[y * plane.width + x] + 128.0);
                let o = (y * width + x) * 3;
                raster[o] = v;
                raster[o + 1] = v;
                raster[o + 2] = v;
            }
        }
    } else {
        for y in 0..height {
            for x in 0..width {
                // nearest-neighbour alignment of subsampled components
                let mut s = [0.0f64; 3];
                for (ci, comp) in frame.components.iter().enumerate() {
                    let plane = &planes[ci];
                    let sx = x * comp.h_sampling as usize / max_h;
                    let sy = y * comp.v_sampling as usize / max_v;
                    s[ci] = plane.samples[sy * plane.width + sx];
                }
                let (yy, cb, cr) = (s[0], s[1], s[2]);
                let o = (y * width + x) * 3;
                raster[o] = clamp_round(yy + 1.402 * cr + 128.0);
                raster[o + 1] = clamp_round(yy - 0.34414 * cb - 0.71414 * cr + 128.0);
                raster[o + 2] = clamp_round(yy + 1.772 * cb + 128.0);
            }
        }
    }

    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{parse_sof, CodingProcess, EntropyCoding};

    fn unit_qt() -> QuantTable {
        [1u16; 64]
    }

    #[test]
    fn dc_only_block_is_flat() {
        let mut quantized = [0i16; 64];
        quantized[0] = 16;
        let samples = idct_block(&quantized, &unit_qt());

        // DC contribution = (1/sqrt(8))^2 * 16 = 2, no level shift here
        let expected = 16.0 / 8.0;
        for (i, &s) in samples.iter().enumerate() {
            assert!(
                (s - expected).abs() < 1e-10,
                "sample {i} = {s}, expected uniform {expected}"
            );
        }
    }

    #[test]
    fn dequantization_scales_samples() {
        let mut quantized = [0i16; 64];
        quantized[0] = 4;
        let mut qvals = [1u16; 64];
        qvals[0] = 20;
        let samples = idct_block(&quantized, &qvals);
        // 4 * 20 / 8 = 10
        assert!((samples[0] - 10.0).abs() < 1e-10);
    }

    #[test]
    fn idct_is_linear_in_coefficients() {
        let mut a = [0i16; 64];
        a[0] = 24;
        let mut b = [0i16; 64];
        b[9] = -13;
        let mut ab = [0i16; 64];
        ab[0] = 24;
        ab[9] = -13;
        let qt = unit_qt();
        let sa = idct_block(&a, &qt);
        let sb = idct_block(&b, &qt);
        let sab = idct_block(&ab, &qt);
        for i in 0..64 {
            assert!((sa[i] + sb[i] - sab[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn grayscale_render_replicates_channels() {
        let frame = parse_sof(
            &[8, 0, 8, 0, 8, 1, 1, 0x11, 0],
            CodingProcess::Baseline,
            EntropyCoding::Huffman,
        )
        .unwrap();
        let mut grid = DctGrid::new(1, 1);
        grid.block_mut(0, 0)[0] = -1024; // Y + 128 = 0 everywhere
        let quant = [Some(unit_qt()), None, None, None];
        let raster = render_rgb(&frame, &[grid], &quant).unwrap();
        assert_eq!(raster.len(), 192);
        assert!(raster.iter().all(|&b| b == 0));
    }

    #[test]
    fn render_clamps_out_of_range_samples() {
        let frame = parse_sof(
            &[8, 0, 8, 0, 8, 1, 1, 0x11, 0],
            CodingProcess::Baseline,
            EntropyCoding::Huffman,
        )
        .unwrap();
        let mut grid = DctGrid::new(1, 1);
        grid.block_mut(0, 0)[0] = 8000; // far above the representable range
        let quant = [Some(unit_qt()), None, None, None];
        let raster = render_rgb(&frame, &[grid], &quant).unwrap();
        assert!(raster.iter().all(|&b| b == 255));
    }

    #[test]
    fn missing_quant_table_is_rejected() {
        let frame = parse_sof(
            &[8, 0, 8, 0, 8, 1, 1, 0x11, 2],
            CodingProcess::Baseline,
            EntropyCoding::Huffman,
        )
        .unwrap();
        let grid = DctGrid::new(1, 1);
        let quant = [Some(unit_qt()), None, None, None];
        assert_eq!(
            render_rgb(&frame, &[grid], &quant),
            Err(JpegError::MissingQuantTable(2))
        );
    }

    #[test]
    fn two_component_frame_is_unsupported_output() {
        let frame = parse_sof(
            &[8, 0, 8, 0, 8, 2, 1, 0x11, 0, 2, 0x11, 0],
            CodingProcess::Baseline,
            EntropyCoding::Huffman,
        )
        .unwrap();
        let grids = vec![DctGrid::new(1, 1), DctGrid::new(1, 1)];
        let quant = [Some(unit_qt()), None, None, None];
        assert_eq!(
            render_rgb(&frame, &grids, &quant),
            Err(JpegError::UnsupportedComponentCount(2))
        );
    }
}
