// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! Error types for JPEG decoding.

use std::fmt;

/// Errors that can occur during JPEG decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JpegError {
    /// Input data is too short or truncated (inside a header, a segment,
    /// or an entropy-coded segment).
    UnexpectedEof,
    /// Missing SOI (0xFFD8) at start of data.
    InvalidSoi,
    /// Unexpected marker, or a marker segment with an inconsistent length.
    InvalidMarkerData(&'static str),
    /// Lossless, hierarchical or otherwise unsupported SOF marker.
    UnsupportedMarker(u8),
    /// Huffman decode error: no code matches the consumed bits, or the
    /// canonical code construction is impossible.
    HuffmanDecode,
    /// Arithmetic decode error: magnitude overflow or runaway coefficient
    /// index in the entropy-coded data.
    ArithmeticDecode,
    /// Quantization table ID out of range (0–3).
    InvalidQuantTableId(u8),
    /// Huffman table ID out of range, or a scan references an undefined table.
    InvalidHuffmanTableId(u8),
    /// Arithmetic conditioning value out of range (DAC segment).
    InvalidConditioning(u8),
    /// A scan references a quantization table that was never defined.
    MissingQuantTable(u8),
    /// Component ID referenced in SOS not found in SOF.
    UnknownComponentId(u8),
    /// Image dimensions or sampling factors are invalid.
    InvalidDimensions,
    /// Only 8-bit sample precision is supported.
    UnsupportedPrecision(u8),
    /// The raster output is defined for 1- or 3-component images only.
    UnsupportedComponentCount(u8),
}

impl fmt::Display for JpegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of JPEG data"),
            Self::InvalidSoi => write!(f, "missing SOI marker (not a JPEG)"),
            Self::InvalidMarkerData(msg) => write!(f, "invalid marker data: {msg}"),
            Self::UnsupportedMarker(m) => write!(f, "unsupported JPEG marker: 0xFF{m:02X}"),
            Self::HuffmanDecode => write!(f, "Huffman decode error"),
            Self::ArithmeticDecode => write!(f, "arithmetic decode error"),
            Self::InvalidQuantTableId(id) => write!(f, "invalid quantization table ID: {id}"),
            Self::InvalidHuffmanTableId(id) => write!(f, "invalid Huffman table ID: {id}"),
            Self::InvalidConditioning(v) => write!(f, "invalid arithmetic conditioning value: {v}"),
            Self::MissingQuantTable(id) => write!(f, "quantization table {id} not defined"),
            Self::UnknownComponentId(id) => write!(f, "unknown component ID in SOS: {id}"),
            Self::InvalidDimensions => write!(f, "invalid image dimensions or sampling factors"),
            Self::UnsupportedPrecision(p) => write!(f, "unsupported sample precision: {p}-bit"),
            Self::UnsupportedComponentCount(n) => {
                write!(f, "unsupported component count for RGB output: {n}")
            }
        }
    }
}

impl std::error::Error for JpegError {}

pub type Result<T> = std::result::Result<T, JpegError>;
