// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/lumajpeg

//! Huffman decoding for JPEG entropy-coded data.
//!
//! Canonical codes are built from the 16 length counts and symbol list of a
//! DHT segment (ITU-T T.81 Annex C). Decoding runs through a DFA whose input
//! alphabet is 4-bit nibbles: states are the proper prefixes of the code set,
//! and every transition carries the symbols completed while consuming the
//! nibble. Three sentinel tables handle 1–3 bit inputs so that decoding can
//! resume at a non-nibble-aligned bit position.

use std::collections::HashMap;

use super::bitio::{read_bits, BitCursor};
use super::error::{JpegError, Result};

/// One canonical Huffman code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanCode {
    /// Code bits, right-aligned.
    pub code: u16,
    /// Code length in bits (1–16).
    pub len: u8,
    /// The decoded symbol.
    pub symbol: u8,
}

/// Build canonical Huffman codes from JPEG-style counts and symbols.
///
/// `bits[i]` is the number of codes of length `i + 1`; `huffval` lists the
/// symbols in order of increasing code length.
pub fn build_codes(bits: &[u8; 16], huffval: &[u8]) -> Result<Vec<HuffmanCode>> {
    let mut codes = Vec::with_capacity(huffval.len());
    let mut code: u32 = 0;
    let mut si = 0;

    for len in 1..=16u8 {
        for _ in 0..bits[(len - 1) as usize] {
            if si >= huffval.len() {
                return Err(JpegError::InvalidMarkerData("DHT symbol count mismatch"));
            }
            codes.push(HuffmanCode {
                code: code as u16,
                len,
                symbol: huffval[si],
            });
            si += 1;
            code += 1;
        }
        code <<= 1;
        // The canonical construction must not exhaust the code space early.
        if code > 1 << (len + 1) {
            return Err(JpegError::HuffmanDecode);
        }
    }
    Ok(codes)
}

/// One DFA transition: symbols completed while consuming the input, the
/// number of input bits belonging to the first completed symbol, and the
/// follow state (None when the remainder is not a valid code prefix).
#[derive(Debug, Clone, Default)]
struct Transition {
    symbols: Vec<u8>,
    first_len: u8,
    next: Option<u16>,
}

/// Nibble-indexed Huffman decoder: consumes 4 bits per DFA step.
pub struct HuffmanDecoder {
    /// `states[s]` holds 16 transitions, one per nibble value. State 0 is
    /// the empty prefix.
    states: Vec<Vec<Transition>>,
    /// Realign tables for 1-, 2- and 3-bit inputs from the empty prefix,
    /// used when a symbol starts on a non-nibble boundary.
    sentinels: [Vec<Transition>; 3],
}

impl HuffmanDecoder {
    /// Build the DFA from a canonical code set.
    pub fn build(codes: &[HuffmanCode]) -> Self {
        // Enumerate the proper prefixes of all codes; index 0 = empty prefix.
        let mut index: HashMap<(u16, u8), u16> = HashMap::new();
        let mut prefixes: Vec<(u16, u8)> = vec![(0, 0)];
        index.insert((0, 0), 0);
        for c in codes {
            for l in 1..c.len {
                let p = (c.code >> (c.len - l), l);
                if !index.contains_key(&p) {
                    index.insert(p, prefixes.len() as u16);
                    prefixes.push(p);
                }
            }
        }

        let states = prefixes
            .iter()
            .map(|&p| (0..16).map(|v| transition(codes, &index, p, v, 4)).collect())
            .collect();
        let sentinels = [
            (0..2).map(|v| transition(codes, &index, (0, 0), v, 1)).collect(),
            (0..4).map(|v| transition(codes, &index, (0, 0), v, 2)).collect(),
            (0..8).map(|v| transition(codes, &index, (0, 0), v, 3)).collect(),
        ];

        Self { states, sentinels }
    }

    /// Decode a single symbol starting at (`byte`, `bit`).
    ///
    /// Returns the position immediately after the first completed symbol and
    /// the symbol itself. Leading bits up to the next nibble boundary are
    /// consumed through a sentinel table; after that the DFA steps a nibble
    /// at a time until a transition emits.
    pub fn decode_symbol(&self, data: &[u8], byte: usize, bit: u8) -> Result<(usize, u8, u8)> {
        let mut pos = byte * 8 + bit as usize;
        let mut state = 0usize;
        let mut byte = byte;
        let mut bit = bit;

        let phase = bit % 4;
        if phase != 0 {
            let k = 4 - phase;
            let (b2, bi2, v) = read_bits(data, byte, bit, k)?;
            let t = &self.sentinels[(k - 1) as usize][v as usize];
            if let Some(&symbol) = t.symbols.first() {
                let end = pos + t.first_len as usize;
                return Ok((end / 8, (end % 8) as u8, symbol));
            }
            state = match t.next {
                Some(s) => s as usize,
                None => return Err(self.dead_state_error(data, byte)),
            };
            pos += k as usize;
            byte = b2;
            bit = bi2;
        }

        loop {
            let (b2, bi2, v) = read_bits(data, byte, bit, 4)?;
            let t = &self.states[state][v as usize];
            if let Some(&symbol) = t.symbols.first() {
                let end = pos + t.first_len as usize;
                return Ok((end / 8, (end % 8) as u8, symbol));
            }
            state = match t.next {
                Some(s) => s as usize,
                None => return Err(self.dead_state_error(data, byte)),
            };
            pos += 4;
            byte = b2;
            bit = bi2;
        }
    }

    /// Decode one symbol at the cursor, advancing it past the symbol.
    pub fn decode(&self, cur: &mut BitCursor<'_>) -> Result<u8> {
        let (byte, bit) = cur.position();
        let (byte, bit, symbol) = self.decode_symbol(cur.data(), byte, bit)?;
        cur.set_position(byte, bit);
        Ok(symbol)
    }

    /// Decode the whole buffer nibble-by-nibble, emitting every completed
    /// symbol. Trailing bits that form only a code prefix are ignored.
    pub fn decode_all(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut state = 0usize;
        let mut byte = 0usize;
        let mut bit = 0u8;
        while byte < data.len() {
            let Ok((b2, bi2, v)) = read_bits(data, byte, bit, 4) else {
                break;
            };
            let t = &self.states[state][v as usize];
            out.extend_from_slice(&t.symbols);
            state = match t.next {
                Some(s) => s as usize,
                None => {
                    if byte + 1 >= data.len() {
                        break; // padding in the final byte
                    }
                    return Err(JpegError::HuffmanDecode);
                }
            };
            byte = b2;
            bit = bi2;
        }
        Ok(out)
    }

    /// A dead transition in the final byte is tolerated padding reported as
    /// truncation; anywhere else the stream is corrupt.
    fn dead_state_error(&self, data: &[u8], byte: usize) -> JpegError {
        if byte + 1 >= data.len() {
            JpegError::UnexpectedEof
        } else {
            JpegError::HuffmanDecode
        }
    }
}

/// Compute one DFA transition: append `inp` (of `inp_len` bits) to the state
/// prefix, greedily strip complete codes off the front, and resolve the
/// remainder to a follow state.
fn transition(
    codes: &[HuffmanCode],
    index: &HashMap<(u16, u8), u16>,
    prefix: (u16, u8),
    inp: u32,
    inp_len: u8,
) -> Transition {
    let (pbits, plen) = prefix;
    let mut s = ((pbits as u32) << inp_len) | inp;
    let mut slen = plen + inp_len;
    let mut symbols = Vec::new();
    let mut first_len = 0;

    'strip: loop {
        for c in codes {
            if c.len <= slen && (s >> (slen - c.len)) == c.code as u32 {
                if symbols.is_empty() {
                    first_len = c.len - plen;
                }
                symbols.push(c.symbol);
                slen -= c.len;
                s &= (1u32 << slen) - 1;
                continue 'strip;
            }
        }
        break;
    }

    let next = index.get(&(s as u16, slen)).copied();
    Transition { symbols, first_len, next }
}

/// Extend a value from its JPEG "additional bits" representation.
///
/// Per ITU-T T.81 Table F.1: if the high bit is 0, the value is negative.
pub fn extend_sign(value: u32, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }
    let half = 1i32 << (bits - 1);
    if (value as i32) < half {
        value as i32 - (1i32 << bits) + 1
    } else {
        value as i32
    }
}
