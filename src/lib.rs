// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! # lumajpeg
//!
//! Pure-Rust reference JPEG decoder. Consumes an ITU-T T.81 byte stream and
//! produces a 24-bit RGB raster (grayscale images are expanded to RGB).
//!
//! Supports:
//! - Baseline sequential DCT (SOF0), extended sequential (SOF1), and
//!   progressive DCT (SOF2), 8-bit precision
//! - Both entropy codings: Huffman (nibble-DFA decoder) and arithmetic
//!   (T.81 Annex D, 113-state probability machine)
//! - YCbCr and grayscale output; chroma subsampling 4:2:0, 4:2:2, 4:4:4
//!   and friends via nearest-neighbour alignment
//! - Restart markers (DRI/RST), 8- and 16-bit quantization tables,
//!   interleaved and non-interleaved scans
//!
//! Does NOT support:
//! - Lossless and hierarchical/differential modes -- rejected at parse time
//! - 12-bit precision -- rejected at parse time
//! - CMYK / 4-component output (coefficients decode, painting errors out)
//!
//! # Quick start
//!
//! ```rust,ignore
//! let data = std::fs::read("photo.jpg").unwrap();
//! let image = lumajpeg::decode(&data).unwrap();
//! println!("{}x{}", image.width(), image.height());
//! let rgb: &[u8] = image.pixels();
//! ```

pub mod arith;
pub mod bitio;
pub mod dct;
pub mod error;
pub mod frame;
pub mod huffman;
pub mod marker;
pub mod pixels;
pub mod scan;
pub mod tables;
pub mod zigzag;

use log::{debug, trace};

use dct::{DctGrid, QuantTable};
use error::{JpegError, Result};
use frame::{CodingProcess, FrameInfo};
use huffman::{build_codes, HuffmanDecoder};
use scan::{EntropyTables, ScanComponent};
use tables::ArithConditioning;

pub use error::JpegError as Error;
pub use frame::{Component, EntropyCoding};

/// A fully decoded JPEG image: frame metadata, coefficient grids and the
/// interleaved RGB raster.
#[derive(Debug)]
pub struct DecodedImage {
    frame: FrameInfo,
    grids: Vec<DctGrid>,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Decode a JPEG byte stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Decoder::new().decode(data)
    }

    /// Image width in pixels.
    pub fn width(&self) -> u16 {
        self.frame.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u16 {
        self.frame.height
    }

    /// Frame metadata: dimensions, components, coding process.
    pub fn frame_info(&self) -> &FrameInfo {
        &self.frame
    }

    /// The RGB raster: `height * width * 3` bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the image, returning the raster.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Decoded quantized DCT coefficients of one component.
    /// Component index is in frame order (typically 0=Y, 1=Cb, 2=Cr).
    pub fn coefficients(&self, component: usize) -> &DctGrid {
        &self.grids[component]
    }
}

/// Decode a JPEG byte stream into frame metadata and an RGB raster.
///
/// Convenience alias for [`DecodedImage::from_bytes`].
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    DecodedImage::from_bytes(data)
}

/// Table storage and frame state accumulated while walking marker segments.
struct Decoder {
    quant: [Option<QuantTable>; 4],
    tables: EntropyTables,
    restart_interval: u16,
    frame: Option<FrameInfo>,
    grids: Vec<DctGrid>,
}

impl Decoder {
    fn new() -> Self {
        Self {
            quant: [None, None, None, None],
            tables: EntropyTables::default(),
            restart_interval: 0,
            frame: None,
            grids: Vec::new(),
        }
    }

    fn decode(mut self, data: &[u8]) -> Result<DecodedImage> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != marker::SOI {
            return Err(JpegError::InvalidSoi);
        }
        self.restart_interval = 0;
        let mut pos = 2usize;

        loop {
            let (m, after) = marker::next_marker(data, pos)?;
            pos = after;
            trace!("marker 0xFF{m:02X} at {}", after - 2);

            match m {
                marker::EOI => break,
                marker::SOI => {
                    self.restart_interval = 0;
                    continue;
                }
                // standalone markers without a length field
                marker::TEM | marker::RST0..=marker::RST7 => continue,
                0x00 => continue,
                _ => {}
            }

            let (body, next) = marker::read_segment(data, pos)?;
            pos = next;

            if let Some(classified) = frame::classify_sof(m) {
                let (process, coding) = classified?;
                if self.frame.is_some() {
                    return Err(JpegError::InvalidMarkerData("multiple SOF markers"));
                }
                let fi = frame::parse_sof(body, process, coding)?;
                debug!(
                    "SOF 0xFF{m:02X}: {}x{}, {} component(s), {:?}/{:?}",
                    fi.width,
                    fi.height,
                    fi.components.len(),
                    fi.process,
                    fi.coding
                );
                self.grids = (0..fi.components.len())
                    .map(|ci| DctGrid::new(fi.blocks_wide(ci), fi.blocks_tall(ci)))
                    .collect();
                self.frame = Some(fi);
                continue;
            }

            match m {
                marker::DQT => {
                    for (id, qt) in tables::parse_dqt(body)? {
                        trace!("DQT table {id}");
                        self.quant[id as usize] = Some(qt);
                    }
                }
                marker::DHT => {
                    for spec in tables::parse_dht(body)? {
                        trace!("DHT class {} id {}", spec.class, spec.id);
                        let decoder =
                            HuffmanDecoder::build(&build_codes(&spec.bits, &spec.huffval)?);
                        if spec.class == 0 {
                            self.tables.dc_decoders[spec.id as usize] = Some(decoder);
                        } else {
                            self.tables.ac_decoders[spec.id as usize] = Some(decoder);
                        }
                    }
                }
                marker::DAC => {
                    for entry in tables::parse_dac(body)? {
                        match entry {
                            ArithConditioning::Dc { id, cond } => {
                                self.tables.dc_cond[id as usize] = cond;
                            }
                            ArithConditioning::Ac { id, kx } => {
                                self.tables.ac_kx[id as usize] = kx;
                            }
                        }
                    }
                }
                marker::DRI => {
                    self.restart_interval = marker::parse_dri(body)?;
                    trace!("DRI {}", self.restart_interval);
                }
                marker::SOS => {
                    pos = self.decode_scan(data, body, pos)?;
                }
                marker::COM => {}
                // APPn and anything else: length-skip
                _ => {}
            }
        }

        let frame = self
            .frame
            .ok_or(JpegError::InvalidMarkerData("no SOF marker"))?;
        let pixels = pixels::render_rgb(&frame, &self.grids, &self.quant)?;
        Ok(DecodedImage {
            frame,
            grids: self.grids,
            pixels,
        })
    }

    /// Handle one SOS segment: resolve scan components and run the
    /// sequential or progressive scan decoder over the entropy-coded data
    /// that follows the header.
    fn decode_scan(&mut self, data: &[u8], body: &[u8], scan_start: usize) -> Result<usize> {
        let header = marker::parse_sos(body)?;
        let fi = self
            .frame
            .as_ref()
            .ok_or(JpegError::InvalidMarkerData("SOS before SOF"))?;

        let mut components = Vec::with_capacity(header.components.len());
        for &(comp_id, dc_id, ac_id) in &header.components {
            let comp_idx = fi.component_index(comp_id)?;
            if components
                .iter()
                .any(|sc: &ScanComponent| sc.comp_idx == comp_idx)
            {
                return Err(JpegError::InvalidMarkerData("duplicate scan component"));
            }
            if dc_id > 3 || ac_id > 3 {
                return Err(JpegError::InvalidHuffmanTableId(dc_id.max(ac_id)));
            }
            components.push(ScanComponent {
                comp_idx,
                dc_table: dc_id as usize,
                ac_table: ac_id as usize,
            });
        }

        debug!(
            "SOS: {} component(s), Ss={} Se={} Ah={} Al={}",
            components.len(),
            header.ss,
            header.se,
            header.ah,
            header.al
        );

        if fi.process == CodingProcess::Progressive {
            scan::decode_progressive_scan(
                data,
                scan_start,
                fi,
                &components,
                &self.tables,
                self.restart_interval,
                &header,
                &mut self.grids,
            )
        } else {
            if header.ss != 0 || header.se != 63 || header.ah != 0 || header.al != 0 {
                return Err(JpegError::InvalidMarkerData(
                    "sequential scan with progressive parameters",
                ));
            }
            scan::decode_sequential_scan(
                data,
                scan_start,
                fi,
                &components,
                &self.tables,
                self.restart_interval,
                &mut self.grids,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_soi() {
        assert_eq!(decode(&[0x00, 0x01, 0x02]).unwrap_err(), JpegError::InvalidSoi);
        assert_eq!(decode(&[]).unwrap_err(), JpegError::InvalidSoi);
    }

    #[test]
    fn rejects_empty_stream_after_soi() {
        assert_eq!(decode(&[0xFF, 0xD8]).unwrap_err(), JpegError::UnexpectedEof);
    }

    #[test]
    fn rejects_frameless_stream() {
        assert_eq!(
            decode(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap_err(),
            JpegError::InvalidMarkerData("no SOF marker")
        );
    }

    #[test]
    fn rejects_lossless_sof() {
        let data = [0xFF, 0xD8, 0xFF, 0xC3, 0x00, 0x02, 0xFF, 0xD9];
        assert_eq!(decode(&data).unwrap_err(), JpegError::UnsupportedMarker(0xC3));
    }

    #[test]
    fn skips_unknown_app_segments() {
        // APP7 with junk body, then EOI; fails only for the missing frame
        let data = [0xFF, 0xD8, 0xFF, 0xE7, 0x00, 0x04, 0xAB, 0xCD, 0xFF, 0xD9];
        assert_eq!(
            decode(&data).unwrap_err(),
            JpegError::InvalidMarkerData("no SOF marker")
        );
    }

    #[test]
    fn rejects_bad_segment_length() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01];
        assert!(matches!(
            decode(&data).unwrap_err(),
            JpegError::InvalidMarkerData(_)
        ));
    }

    #[test]
    fn rejects_sos_before_sof() {
        let data = [
            0xFF, 0xD8, // SOI
            0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0, // SOS
            0xFF, 0xD9,
        ];
        assert_eq!(
            decode(&data).unwrap_err(),
            JpegError::InvalidMarkerData("SOS before SOF")
        );
    }

    #[test]
    fn rejects_scan_component_not_in_frame() {
        let data = [
            0xFF, 0xD8, // SOI
            0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0, // SOF0, 1 comp, id=1
            0xFF, 0xDA, 0x00, 0x08, 1, 9, 0x00, 0, 63, 0, // SOS references id=9
        ];
        assert_eq!(decode(&data).unwrap_err(), JpegError::UnknownComponentId(9));
    }

    #[test]
    fn rejects_undefined_huffman_table() {
        let data = [
            0xFF, 0xD8, //
            0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0, //
            0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0, // no DHT seen
        ];
        assert_eq!(
            decode(&data).unwrap_err(),
            JpegError::InvalidHuffmanTableId(0)
        );
    }
}
