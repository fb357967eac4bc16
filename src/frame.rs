// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! JPEG frame header (SOF) parsing.
//!
//! Extracts image dimensions, component information, sampling factors and
//! the coding process from the Start of Frame marker segment. Supported
//! frames are SOF0 (baseline), SOF1 (extended sequential), SOF2
//! (progressive) and their arithmetic-coded counterparts SOF9 and SOF10.
//! Lossless and hierarchical frames are recognized and rejected cleanly.

use super::error::{JpegError, Result};
use super::marker;

/// DCT coding process of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingProcess {
    Baseline,
    ExtendedSequential,
    Progressive,
}

/// Entropy coding used by the frame's scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyCoding {
    Huffman,
    Arithmetic,
}

/// Information about one image component from SOF.
#[derive(Debug, Clone)]
pub struct Component {
    /// Component ID (typically 1=Y, 2=Cb, 3=Cr).
    pub id: u8,
    /// Horizontal sampling factor (1–4).
    pub h_sampling: u8,
    /// Vertical sampling factor (1–4).
    pub v_sampling: u8,
    /// Quantization table ID (0–3).
    pub quant_table_id: u8,
}

/// Frame information parsed from an SOF marker.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Sample precision in bits (must be 8).
    pub precision: u8,
    /// Image height in pixels.
    pub height: u16,
    /// Image width in pixels.
    pub width: u16,
    /// Components in frame order.
    pub components: Vec<Component>,
    /// Maximum horizontal sampling factor across all components.
    pub max_h_sampling: u8,
    /// Maximum vertical sampling factor across all components.
    pub max_v_sampling: u8,
    /// MCU width in pixels (= max_h_sampling * 8).
    pub mcu_width: u16,
    /// MCU height in pixels (= max_v_sampling * 8).
    pub mcu_height: u16,
    /// Number of MCUs horizontally.
    pub mcus_wide: u16,
    /// Number of MCUs vertically.
    pub mcus_tall: u16,
    /// DCT coding process.
    pub process: CodingProcess,
    /// Entropy coding of the scans.
    pub coding: EntropyCoding,
}

impl FrameInfo {
    /// Number of 8×8 blocks wide in a component's coefficient grid.
    ///
    /// Grids are sized for interleaved MCU coverage (padded to whole MCUs).
    pub fn blocks_wide(&self, comp_idx: usize) -> usize {
        (self.mcus_wide as usize) * (self.components[comp_idx].h_sampling as usize)
    }

    /// Number of 8×8 blocks tall in a component's coefficient grid.
    pub fn blocks_tall(&self, comp_idx: usize) -> usize {
        (self.mcus_tall as usize) * (self.components[comp_idx].v_sampling as usize)
    }

    /// Blocks per row a non-interleaved scan walks for this component:
    /// `ceil(width / (8 * maxH / h))`, which can be smaller than the padded
    /// grid width.
    pub fn comp_blocks_per_row(&self, comp_idx: usize) -> usize {
        let c = &self.components[comp_idx];
        let w = self.width as usize * c.h_sampling as usize;
        let unit = 8 * self.max_h_sampling as usize;
        (w + unit - 1) / unit
    }

    /// Blocks per column a non-interleaved scan walks for this component.
    pub fn comp_blocks_per_col(&self, comp_idx: usize) -> usize {
        let c = &self.components[comp_idx];
        let h = self.height as usize * c.v_sampling as usize;
        let unit = 8 * self.max_v_sampling as usize;
        (h + unit - 1) / unit
    }

    /// Index of the component with the given SOF component ID.
    pub fn component_index(&self, id: u8) -> Result<usize> {
        self.components
            .iter()
            .position(|c| c.id == id)
            .ok_or(JpegError::UnknownComponentId(id))
    }
}

/// Map an SOF marker byte to its coding process and entropy coding.
///
/// Returns `None` for markers that are not SOF markers at all; lossless and
/// differential SOFs yield an `UnsupportedMarker` error.
pub fn classify_sof(m: u8) -> Option<Result<(CodingProcess, EntropyCoding)>> {
    use CodingProcess::*;
    use EntropyCoding::*;
    match m {
        marker::SOF0 => Some(Ok((Baseline, Huffman))),
        marker::SOF1 => Some(Ok((ExtendedSequential, Huffman))),
        marker::SOF2 => Some(Ok((Progressive, Huffman))),
        marker::SOF9 => Some(Ok((ExtendedSequential, Arithmetic))),
        marker::SOF10 => Some(Ok((Progressive, Arithmetic))),
        // SOF3/SOF11 lossless, SOF5-7/13-15 differential, SOF8 reserved
        0xC3 | 0xC5..=0xC7 | 0xC8 | 0xCB | 0xCD..=0xCF => {
            Some(Err(JpegError::UnsupportedMarker(m)))
        }
        _ => None,
    }
}

/// Parse an SOF marker segment body (after the 2-byte length).
pub fn parse_sof(data: &[u8], process: CodingProcess, coding: EntropyCoding) -> Result<FrameInfo> {
    if data.len() < 6 {
        return Err(JpegError::UnexpectedEof);
    }

    let precision = data[0];
    if precision != 8 {
        return Err(JpegError::UnsupportedPrecision(precision));
    }

    let height = u16::from_be_bytes([data[1], data[2]]);
    let width = u16::from_be_bytes([data[3], data[4]]);
    let num_components = data[5] as usize;

    if width == 0 || height == 0 {
        return Err(JpegError::InvalidDimensions);
    }
    if num_components == 0 || num_components > 4 {
        return Err(JpegError::UnsupportedComponentCount(num_components as u8));
    }
    if data.len() < 6 + num_components * 3 {
        return Err(JpegError::UnexpectedEof);
    }

    let mut components = Vec::with_capacity(num_components);
    let mut max_h = 0u8;
    let mut max_v = 0u8;

    for i in 0..num_components {
        let offset = 6 + i * 3;
        let id = data[offset];
        let sampling = data[offset + 1];
        let h_sampling = sampling >> 4;
        let v_sampling = sampling & 0x0F;
        let quant_table_id = data[offset + 2];

        if h_sampling == 0 || v_sampling == 0 || h_sampling > 4 || v_sampling > 4 {
            return Err(JpegError::InvalidDimensions);
        }
        if quant_table_id > 3 {
            return Err(JpegError::InvalidQuantTableId(quant_table_id));
        }
        if components.iter().any(|c: &Component| c.id == id) {
            return Err(JpegError::InvalidMarkerData("duplicate component ID"));
        }

        max_h = max_h.max(h_sampling);
        max_v = max_v.max(v_sampling);

        components.push(Component {
            id,
            h_sampling,
            v_sampling,
            quant_table_id,
        });
    }

    let mcu_width = (max_h as u16) * 8;
    let mcu_height = (max_v as u16) * 8;
    let mcus_wide = (width + mcu_width - 1) / mcu_width;
    let mcus_tall = (height + mcu_height - 1) / mcu_height;

    Ok(FrameInfo {
        precision,
        height,
        width,
        components,
        max_h_sampling: max_h,
        max_v_sampling: max_v,
        mcu_width,
        mcu_height,
        mcus_wide,
        mcus_tall,
        process,
        coding,
    })
}
