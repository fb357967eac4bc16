// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! Scan decoding: entropy-coded data into coefficient grids.
//!
//! Drives blocks within MCUs, tracks DC predictors and arithmetic
//! conditioning state, dispatches to the Huffman or arithmetic path selected
//! once per scan, and handles restart intervals by pulling one de-stuffed
//! entropy-coded segment per interval. Progressive scans implement the four
//! T.81 scan kinds (DC/AC, first/refinement) for both entropy codings.

use log::trace;

use super::arith::{
    decode_ac_coefficients, decode_dc_diff, ArithDecoder, Statistics, AC_STAT_BINS, DC_STAT_BINS,
};
use super::bitio::BitCursor;
use super::dct::{Block, DctGrid};
use super::error::{JpegError, Result};
use super::frame::{EntropyCoding, FrameInfo};
use super::huffman::{extend_sign, HuffmanDecoder};
use super::marker::{extract_ecs, is_restart, ScanHeader};
use super::tables::DcConditioning;
use super::zigzag::ZIGZAG_TO_NATURAL;

/// Component selector for one scan component.
#[derive(Clone)]
pub struct ScanComponent {
    /// Index into FrameInfo.components.
    pub comp_idx: usize,
    /// DC entropy table index (Huffman decoder or arithmetic conditioning).
    pub dc_table: usize,
    /// AC entropy table index.
    pub ac_table: usize,
}

/// Entropy tables and conditioning owned by the decoder, shared by scans.
pub struct EntropyTables {
    pub dc_decoders: [Option<HuffmanDecoder>; 4],
    pub ac_decoders: [Option<HuffmanDecoder>; 4],
    pub dc_cond: [DcConditioning; 4],
    pub ac_kx: [u8; 4],
}

impl Default for EntropyTables {
    fn default() -> Self {
        Self {
            dc_decoders: [None, None, None, None],
            ac_decoders: [None, None, None, None],
            dc_cond: [DcConditioning::default(); 4],
            ac_kx: [super::tables::DEFAULT_AC_KX; 4],
        }
    }
}

impl EntropyTables {
    fn dc_decoder(&self, id: usize) -> Result<&HuffmanDecoder> {
        self.dc_decoders[id]
            .as_ref()
            .ok_or(JpegError::InvalidHuffmanTableId(id as u8))
    }

    fn ac_decoder(&self, id: usize) -> Result<&HuffmanDecoder> {
        self.ac_decoders[id]
            .as_ref()
            .ok_or(JpegError::InvalidHuffmanTableId(id as u8))
    }
}

/// Geometry of one scan: MCU count and the block walk per MCU index.
struct ScanGeometry {
    interleaved: bool,
    total_mcus: usize,
    /// Blocks per row of the walked grid for non-interleaved scans.
    blocks_per_row: usize,
}

impl ScanGeometry {
    fn new(frame: &FrameInfo, scan_components: &[ScanComponent]) -> Self {
        let interleaved = scan_components.len() > 1;
        if interleaved {
            Self {
                interleaved,
                total_mcus: frame.mcus_wide as usize * frame.mcus_tall as usize,
                blocks_per_row: 0,
            }
        } else {
            // A non-interleaved scan walks the component's own block grid,
            // which can be narrower than the MCU-padded coefficient grid.
            let ci = scan_components[0].comp_idx;
            let bpr = frame.comp_blocks_per_row(ci);
            Self {
                interleaved,
                total_mcus: bpr * frame.comp_blocks_per_col(ci),
                blocks_per_row: bpr,
            }
        }
    }

    /// Blocks contributed by `comp` to one MCU.
    fn blocks_in_mcu(&self, frame: &FrameInfo, comp_idx: usize) -> (usize, usize) {
        if self.interleaved {
            let c = &frame.components[comp_idx];
            (c.h_sampling as usize, c.v_sampling as usize)
        } else {
            (1, 1)
        }
    }

    /// Coefficient-grid coordinates of block (`bh`, `bv`) of `comp` in MCU `m`.
    fn block_coords(
        &self,
        frame: &FrameInfo,
        comp_idx: usize,
        m: usize,
        bh: usize,
        bv: usize,
    ) -> (usize, usize) {
        if self.interleaved {
            let c = &frame.components[comp_idx];
            let row = (m / frame.mcus_wide as usize) * c.v_sampling as usize + bv;
            let col = (m % frame.mcus_wide as usize) * c.h_sampling as usize + bh;
            (row, col)
        } else {
            (m / self.blocks_per_row, m % self.blocks_per_row)
        }
    }
}

/// Write a zigzag-order block into the grid at (br, bc) in natural order.
///
/// Out-of-range coordinates (possible in malformed interleaved streams) are
/// decoded but discarded to keep the bitstream in sync.
fn store_block(grid: &mut DctGrid, br: usize, bc: usize, zz: &[i32; 64]) {
    if !grid.contains(br, bc) {
        return;
    }
    let block = grid.block_mut(br, bc);
    for zi in 0..64 {
        block[ZIGZAG_TO_NATURAL[zi]] = zz[zi].clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}

/// Decode one sequential (baseline / extended) block into `zz` (zigzag order).
fn decode_huffman_block(
    cur: &mut BitCursor<'_>,
    dc: &HuffmanDecoder,
    ac: &HuffmanDecoder,
    dc_pred: &mut i32,
    zz: &mut [i32; 64],
) -> Result<()> {
    let size = dc.decode(cur)?;
    if size > 15 {
        return Err(JpegError::HuffmanDecode);
    }
    if size > 0 {
        let bits = cur.read_bits(size)?;
        *dc_pred = dc_pred.wrapping_add(extend_sign(bits, size));
    }
    zz[0] = *dc_pred;

    let mut k = 1;
    while k < 64 {
        let rs = ac.decode(cur)?;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16; // ZRL
                continue;
            }
            break; // EOB
        }
        k += run;
        if k >= 64 {
            return Err(JpegError::HuffmanDecode);
        }
        let bits = cur.read_bits(size)?;
        zz[k] = extend_sign(bits, size);
        k += 1;
    }
    Ok(())
}

/// Decode a sequential scan (baseline or extended, either entropy coding).
///
/// Returns the position of the 0xFF of the marker that terminated the scan.
pub fn decode_sequential_scan(
    data: &[u8],
    scan_start: usize,
    frame: &FrameInfo,
    scan_components: &[ScanComponent],
    tables: &EntropyTables,
    restart_interval: u16,
    grids: &mut [DctGrid],
) -> Result<usize> {
    let arithmetic = frame.coding == EntropyCoding::Arithmetic;
    let geom = ScanGeometry::new(frame, scan_components);

    if !arithmetic {
        // resolve table references up front so a missing table fails the
        // scan before any entropy data is consumed
        for sc in scan_components {
            tables.dc_decoder(sc.dc_table)?;
            tables.ac_decoder(sc.ac_table)?;
        }
    }

    let mut dc_pred = vec![0i32; scan_components.len()];
    let mut dc_ctx = vec![0usize; scan_components.len()];
    let mut dc_stats: [Statistics; 4] = std::array::from_fn(|_| Statistics::new(DC_STAT_BINS));
    let mut ac_stats: [Statistics; 4] = std::array::from_fn(|_| Statistics::new(AC_STAT_BINS));

    let interval = if restart_interval > 0 {
        restart_interval as usize
    } else {
        geom.total_mcus
    };

    let mut mcu = 0usize;
    let mut pos = scan_start;
    loop {
        let ecs = extract_ecs(data, pos)?;
        let mut cur = BitCursor::new(&ecs.bytes);
        let mut adec = ArithDecoder::new(&ecs.bytes);
        let count = interval.min(geom.total_mcus - mcu);

        for m in mcu..mcu + count {
            for (sci, sc) in scan_components.iter().enumerate() {
                let (hb, vb) = geom.blocks_in_mcu(frame, sc.comp_idx);
                for bv in 0..vb {
                    for bh in 0..hb {
                        let (br, bc) = geom.block_coords(frame, sc.comp_idx, m, bh, bv);
                        let mut zz = [0i32; 64];
                        if arithmetic {
                            let (diff, ctx) = decode_dc_diff(
                                &mut adec,
                                &mut dc_stats[sc.dc_table],
                                tables.dc_cond[sc.dc_table],
                                dc_ctx[sci],
                            )?;
                            dc_ctx[sci] = ctx;
                            dc_pred[sci] = dc_pred[sci].wrapping_add(diff);
                            zz[0] = dc_pred[sci];
                            decode_ac_coefficients(
                                &mut adec,
                                &mut ac_stats[sc.ac_table],
                                tables.ac_kx[sc.ac_table],
                                &mut zz,
                                1,
                                63,
                                0,
                            )?;
                        } else {
                            decode_huffman_block(
                                &mut cur,
                                tables.dc_decoder(sc.dc_table)?,
                                tables.ac_decoder(sc.ac_table)?,
                                &mut dc_pred[sci],
                                &mut zz,
                            )?;
                        }
                        store_block(&mut grids[sc.comp_idx], br, bc, &zz);
                    }
                }
            }
        }

        mcu += count;
        if mcu >= geom.total_mcus {
            return Ok(ecs.end - 2);
        }
        if !is_restart(ecs.marker) {
            return Err(JpegError::InvalidMarkerData("expected restart marker"));
        }
        trace!("restart boundary after {mcu} MCUs");
        pos = ecs.end;
        dc_pred.iter_mut().for_each(|p| *p = 0);
        dc_ctx.iter_mut().for_each(|c| *c = 0);
        dc_stats.iter_mut().for_each(Statistics::reset);
        ac_stats.iter_mut().for_each(Statistics::reset);
    }
}

/// Decode one progressive scan into the coefficient grids.
///
/// The four scan kinds are selected by the header's spectral range and
/// successive-approximation bits:
/// - DC first (Ss=0, Se=0, Ah=0): DC deltas, stored shifted left by Al
/// - DC refinement (Ss=0, Ah>0): one low-order bit per DC coefficient
/// - AC first (Ss>0, Ah=0): coefficients of the band, shifted left by Al
/// - AC refinement (Ss>0, Ah>0): one correction bit per nonzero coefficient,
///   plus newly nonzero ±1 values
pub fn decode_progressive_scan(
    data: &[u8],
    scan_start: usize,
    frame: &FrameInfo,
    scan_components: &[ScanComponent],
    tables: &EntropyTables,
    restart_interval: u16,
    header: &ScanHeader,
    grids: &mut [DctGrid],
) -> Result<usize> {
    let ss = header.ss as usize;
    let se = header.se as usize;
    let (ah, al) = (header.ah, header.al);

    if ss > 63 || se > 63 || ss > se || (ss == 0 && se != 0) {
        return Err(JpegError::InvalidMarkerData("invalid spectral selection"));
    }
    if ss > 0 && scan_components.len() > 1 {
        return Err(JpegError::InvalidMarkerData(
            "AC progressive scan must have a single component",
        ));
    }

    let arithmetic = frame.coding == EntropyCoding::Arithmetic;
    let geom = ScanGeometry::new(frame, scan_components);

    if !arithmetic {
        for sc in scan_components {
            if ss == 0 && ah == 0 {
                tables.dc_decoder(sc.dc_table)?;
            }
            if ss > 0 {
                tables.ac_decoder(sc.ac_table)?;
            }
        }
    }

    let mut dc_pred = vec![0i32; scan_components.len()];
    let mut dc_ctx = vec![0usize; scan_components.len()];
    let mut dc_stats: [Statistics; 4] = std::array::from_fn(|_| Statistics::new(DC_STAT_BINS));
    let mut ac_stats: [Statistics; 4] = std::array::from_fn(|_| Statistics::new(AC_STAT_BINS));

    let interval = if restart_interval > 0 {
        restart_interval as usize
    } else {
        geom.total_mcus
    };

    let mut mcu = 0usize;
    let mut pos = scan_start;
    loop {
        let ecs = extract_ecs(data, pos)?;
        let mut cur = BitCursor::new(&ecs.bytes);
        let mut adec = ArithDecoder::new(&ecs.bytes);
        let mut eob_run = 0u32;
        let count = interval.min(geom.total_mcus - mcu);

        for m in mcu..mcu + count {
            for (sci, sc) in scan_components.iter().enumerate() {
                let (hb, vb) = geom.blocks_in_mcu(frame, sc.comp_idx);
                for bv in 0..vb {
                    for bh in 0..hb {
                        let (br, bc) = geom.block_coords(frame, sc.comp_idx, m, bh, bv);
                        let grid = &mut grids[sc.comp_idx];
                        if !grid.contains(br, bc) {
                            return Err(JpegError::InvalidMarkerData(
                                "progressive block outside coefficient grid",
                            ));
                        }

                        if ss == 0 {
                            // DC scan
                            if ah == 0 {
                                let diff = if arithmetic {
                                    let (diff, ctx) = decode_dc_diff(
                                        &mut adec,
                                        &mut dc_stats[sc.dc_table],
                                        tables.dc_cond[sc.dc_table],
                                        dc_ctx[sci],
                                    )?;
                                    dc_ctx[sci] = ctx;
                                    diff
                                } else {
                                    let size =
                                        tables.dc_decoder(sc.dc_table)?.decode(&mut cur)?;
                                    if size > 15 {
                                        return Err(JpegError::HuffmanDecode);
                                    }
                                    if size > 0 {
                                        extend_sign(cur.read_bits(size)?, size)
                                    } else {
                                        0
                                    }
                                };
                                dc_pred[sci] = dc_pred[sci].wrapping_add(diff);
                                let shifted = (dc_pred[sci] << al)
                                    .clamp(i16::MIN as i32, i16::MAX as i32);
                                grid.block_mut(br, bc)[0] = shifted as i16;
                            } else {
                                let bit = if arithmetic {
                                    adec.decode_fixed()
                                } else {
                                    cur.read_bit()?
                                };
                                if bit {
                                    grid.block_mut(br, bc)[0] |= 1i16 << al;
                                }
                            }
                        } else {
                            let block = grid.block_mut(br, bc);
                            if ah == 0 {
                                if arithmetic {
                                    arith_ac_first(
                                        &mut adec,
                                        &mut ac_stats[sc.ac_table],
                                        tables.ac_kx[sc.ac_table],
                                        block,
                                        ss,
                                        se,
                                        al,
                                    )?;
                                } else {
                                    huffman_ac_first(
                                        &mut cur,
                                        tables.ac_decoder(sc.ac_table)?,
                                        block,
                                        ss,
                                        se,
                                        al,
                                        &mut eob_run,
                                    )?;
                                }
                            } else if arithmetic {
                                arith_ac_refine(
                                    &mut adec,
                                    &mut ac_stats[sc.ac_table],
                                    block,
                                    ss,
                                    se,
                                    al,
                                )?;
                            } else {
                                huffman_ac_refine(
                                    &mut cur,
                                    tables.ac_decoder(sc.ac_table)?,
                                    block,
                                    ss,
                                    se,
                                    al,
                                    &mut eob_run,
                                )?;
                            }
                        }
                    }
                }
            }
        }

        mcu += count;
        if mcu >= geom.total_mcus {
            return Ok(ecs.end - 2);
        }
        if !is_restart(ecs.marker) {
            return Err(JpegError::InvalidMarkerData("expected restart marker"));
        }
        trace!("restart boundary after {mcu} progressive MCUs");
        pos = ecs.end;
        dc_pred.iter_mut().for_each(|p| *p = 0);
        dc_ctx.iter_mut().for_each(|c| *c = 0);
        dc_stats.iter_mut().for_each(Statistics::reset);
        ac_stats.iter_mut().for_each(Statistics::reset);
    }
}

/// AC first scan, Huffman coding: band coefficients with EOBRUN batching.
fn huffman_ac_first(
    cur: &mut BitCursor<'_>,
    ac: &HuffmanDecoder,
    block: &mut Block,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
) -> Result<()> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }

    let mut k = ss;
    while k <= se {
        let rs = ac.decode(cur)?;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;

        if size == 0 {
            if run == 15 {
                k += 16; // ZRL
                continue;
            }
            // EOBn: a run of 2^run - 1 + extra further all-zero bands
            *eob_run = (1u32 << run) - 1;
            if run > 0 {
                *eob_run += cur.read_bits(run as u8)?;
            }
            return Ok(());
        }

        k += run;
        if k > se {
            return Err(JpegError::HuffmanDecode);
        }
        let value = extend_sign(cur.read_bits(size)?, size) << al;
        block[ZIGZAG_TO_NATURAL[k]] = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        k += 1;
    }
    Ok(())
}

/// Apply one correction bit to an already-nonzero coefficient.
///
/// Saturating add: an overflow is only reachable through corrupt streams.
fn refine_nonzero(cur: &mut BitCursor<'_>, coeff: &mut i16, p1: i16, m1: i16) -> Result<()> {
    if cur.read_bit()? {
        *coeff = coeff.saturating_add(if *coeff > 0 { p1 } else { m1 });
    }
    Ok(())
}

/// AC refinement scan, Huffman coding (T.81 G.1.2.3, figure G.7).
fn huffman_ac_refine(
    cur: &mut BitCursor<'_>,
    ac: &HuffmanDecoder,
    block: &mut Block,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
) -> Result<()> {
    let p1 = 1i16 << al;
    let m1 = -1i16 << al;

    let mut k = ss;
    if *eob_run > 0 {
        // inside an EOB run only correction bits are read
        while k <= se {
            let ni = ZIGZAG_TO_NATURAL[k];
            if block[ni] != 0 {
                refine_nonzero(cur, &mut block[ni], p1, m1)?;
            }
            k += 1;
        }
        *eob_run -= 1;
        return Ok(());
    }

    while k <= se {
        let rs = ac.decode(cur)?;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;

        if size == 0 {
            if run == 15 {
                // ZRL: pass 16 zero-history positions, refining nonzeros
                let mut zeros = 16usize;
                while k <= se && zeros > 0 {
                    let ni = ZIGZAG_TO_NATURAL[k];
                    if block[ni] != 0 {
                        refine_nonzero(cur, &mut block[ni], p1, m1)?;
                    } else {
                        zeros -= 1;
                    }
                    k += 1;
                }
                continue;
            }
            // EOBn: refine the rest of this band, then cover further blocks
            *eob_run = 1u32 << run;
            if run > 0 {
                *eob_run += cur.read_bits(run as u8)?;
            }
            while k <= se {
                let ni = ZIGZAG_TO_NATURAL[k];
                if block[ni] != 0 {
                    refine_nonzero(cur, &mut block[ni], p1, m1)?;
                }
                k += 1;
            }
            *eob_run -= 1;
            return Ok(());
        }

        if size != 1 {
            return Err(JpegError::HuffmanDecode);
        }
        // a new ±1 coefficient after `run` zero-history positions
        let new_val = if cur.read_bit()? { p1 } else { m1 };
        let mut zeros = run;
        while k <= se {
            let ni = ZIGZAG_TO_NATURAL[k];
            if block[ni] != 0 {
                refine_nonzero(cur, &mut block[ni], p1, m1)?;
            } else {
                if zeros == 0 {
                    block[ni] = new_val;
                    k += 1;
                    break;
                }
                zeros -= 1;
            }
            k += 1;
        }
    }
    Ok(())
}

/// AC first scan, arithmetic coding: the band is decoded like a sequential
/// block restricted to `ss..=se`, values shifted by Al.
fn arith_ac_first(
    adec: &mut ArithDecoder<'_>,
    stats: &mut Statistics,
    kx: u8,
    block: &mut Block,
    ss: usize,
    se: usize,
    al: u8,
) -> Result<()> {
    let mut zz = [0i32; 64];
    decode_ac_coefficients(adec, stats, kx, &mut zz, ss, se, al)?;
    for k in ss..=se {
        block[ZIGZAG_TO_NATURAL[k]] = zz[k].clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
    Ok(())
}

/// AC refinement scan, arithmetic coding (T.81 G.2.2).
fn arith_ac_refine(
    adec: &mut ArithDecoder<'_>,
    stats: &mut Statistics,
    block: &mut Block,
    ss: usize,
    se: usize,
    al: u8,
) -> Result<()> {
    let p1 = 1i16 << al;
    let m1 = -1i16 << al;

    // end-of-block index of the previous stage
    let mut kex = se;
    while kex > 0 && block[ZIGZAG_TO_NATURAL[kex]] == 0 {
        kex -= 1;
    }

    let mut k = ss;
    while k <= se {
        let mut st = 3 * (k - 1);
        if k > kex && adec.decode_bit(stats, st) {
            break; // end of block
        }
        loop {
            let ni = ZIGZAG_TO_NATURAL[k];
            if block[ni] != 0 {
                if adec.decode_bit(stats, st + 2) {
                    let delta = if block[ni] > 0 { p1 } else { m1 };
                    block[ni] = block[ni].saturating_add(delta);
                }
                break;
            }
            if adec.decode_bit(stats, st + 1) {
                block[ni] = if adec.decode_fixed() { m1 } else { p1 };
                break;
            }
            st += 3;
            k += 1;
            if k > se {
                return Err(JpegError::ArithmeticDecode);
            }
        }
        k += 1;
    }
    Ok(())
}
