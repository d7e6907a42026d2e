//! Bit-vector with constant-time rank and logarithmic select.
//!
//! # Overview
//! Rank is answered from two levels of precomputed counts: cumulative
//! popcounts at 512-bit superblock boundaries, plus 32-bit block offsets
//! relative to the enclosing superblock. Select binary-searches the
//! superblock ranks and then scans at most one superblock.
//!
//! The navigation layer leans on four primitives: `rank1`/`rank0` locate a
//! node among leaves or internal nodes, `select1` delimits sibling groups in
//! the last-child vector, `select0` maps internal positions back to node ids.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::words_for;
use crate::error::{Result, read_error};

const SUPERBLOCK_BITS: u64 = 512;
const BLOCK_BITS: u64 = 32;
const BLOCKS_PER_SUPER: u64 = SUPERBLOCK_BITS / BLOCK_BITS;

/// A static bit-vector of `len` bits with rank/select support.
///
/// # Example
/// ```
/// use tree_path_index::bitrank::BitRank;
/// // bits 1,3,4 set in an 8-bit vector
/// let br = BitRank::new(vec![0b0001_1010], 8);
/// assert_eq!(br.rank1(4), 3);
/// assert_eq!(br.rank0(4), 2);
/// assert_eq!(br.select1(2), Some(3));
/// assert_eq!(br.select0(1), Some(0));
/// ```
pub struct BitRank {
    bits: Vec<u64>,
    len: u64,
    ones: u64,
    /// Ones strictly before each superblock start.
    super_counts: Vec<u64>,
    /// Ones from the superblock start to each block start. A superblock
    /// spans 512 bits, so the offset fits in 16 bits.
    block_counts: Vec<u16>,
}

impl BitRank {
    /// Builds the rank directories over a transferred word buffer.
    ///
    /// Only the lowest `len` bits are meaningful; trailing bits of the final
    /// word are cleared so block popcounts stay exact.
    pub fn new(mut bits: Vec<u64>, len: u64) -> Self {
        assert!(bits.len() >= words_for(len), "word buffer shorter than len");
        bits.truncate(words_for(len));
        if len % 64 != 0 {
            let last = bits.last_mut().expect("non-empty buffer");
            *last &= (1u64 << (len % 64)) - 1;
        }

        let num_super = len.div_ceil(SUPERBLOCK_BITS) as usize;
        let num_blocks = len.div_ceil(BLOCK_BITS) as usize;
        let mut super_counts = vec![0u64; num_super];
        let mut block_counts = vec![0u16; num_blocks];

        let mut total = 0u64;
        let mut in_super = 0u16;
        for b in 0..num_blocks as u64 {
            if b % BLOCKS_PER_SUPER == 0 {
                super_counts[(b / BLOCKS_PER_SUPER) as usize] = total;
                in_super = 0;
            }
            block_counts[b as usize] = in_super;
            let pc = Self::chunk_of(&bits, b).count_ones() as u16;
            in_super += pc;
            total += pc as u64;
        }

        BitRank { bits, len, ones: total, super_counts, block_counts }
    }

    #[inline]
    fn chunk_of(bits: &[u64], block: u64) -> u32 {
        let word = bits[(block / 2) as usize];
        if block % 2 == 0 { word as u32 } else { (word >> 32) as u32 }
    }

    #[inline]
    fn chunk(&self, block: u64) -> u32 {
        Self::chunk_of(&self.bits, block)
    }

    /// Number of bits.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    pub fn ones(&self) -> u64 {
        self.ones
    }

    /// Bit at position `i`.
    #[inline]
    pub fn get(&self, i: u64) -> bool {
        debug_assert!(i < self.len);
        (self.bits[(i / 64) as usize] >> (i % 64)) & 1 != 0
    }

    /// Set bits in `[0, i]` (inclusive).
    #[inline]
    pub fn rank1(&self, i: u64) -> u64 {
        debug_assert!(i < self.len);
        let block = i / BLOCK_BITS;
        let within = (i % BLOCK_BITS) as u32;
        let chunk = self.chunk(block);
        let partial = if within == 31 { chunk } else { chunk & ((1u32 << (within + 1)) - 1) };
        self.super_counts[(i / SUPERBLOCK_BITS) as usize]
            + self.block_counts[block as usize] as u64
            + partial.count_ones() as u64
    }

    /// Unset bits in `[0, i]` (inclusive).
    #[inline]
    pub fn rank0(&self, i: u64) -> u64 {
        (i + 1) - self.rank1(i)
    }

    /// Position of the `k`-th set bit, 1-based. `None` when `k` is 0 or
    /// exceeds the number of set bits.
    pub fn select1(&self, k: u64) -> Option<u64> {
        if k == 0 || k > self.ones {
            return None;
        }
        let sb = self.super_counts.partition_point(|&c| c < k) - 1;
        let mut remaining = k - self.super_counts[sb];
        let num_blocks = self.len.div_ceil(BLOCK_BITS);
        let first = sb as u64 * BLOCKS_PER_SUPER;
        for b in first..num_blocks.min(first + BLOCKS_PER_SUPER) {
            let chunk = self.chunk(b);
            let pc = chunk.count_ones() as u64;
            if remaining <= pc {
                let mut c = chunk;
                for _ in 1..remaining {
                    c &= c - 1; // drop lowest set bit
                }
                return Some(b * BLOCK_BITS + c.trailing_zeros() as u64);
            }
            remaining -= pc;
        }
        None
    }

    /// Position of the `k`-th unset bit, 1-based.
    pub fn select0(&self, k: u64) -> Option<u64> {
        if k == 0 || k > self.len - self.ones {
            return None;
        }
        // Zeros before superblock s: s*512 minus the ones before it. Find
        // the last superblock where that count is still below k.
        let mut lo = 0u64;
        let mut hi = self.super_counts.len() as u64;
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            let zeros_before = mid * SUPERBLOCK_BITS - self.super_counts[mid as usize];
            if zeros_before < k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut remaining = k - (lo * SUPERBLOCK_BITS - self.super_counts[lo as usize]);
        let num_blocks = self.len.div_ceil(BLOCK_BITS);
        let first = lo * BLOCKS_PER_SUPER;
        for b in first..num_blocks.min(first + BLOCKS_PER_SUPER) {
            let chunk = self.chunk(b);
            let valid = (self.len - b * BLOCK_BITS).min(BLOCK_BITS) as u32;
            let zeros = valid as u64 - chunk.count_ones() as u64;
            if remaining <= zeros {
                for bit in 0..valid {
                    if (chunk >> bit) & 1 == 0 {
                        remaining -= 1;
                        if remaining == 0 {
                            return Some(b * BLOCK_BITS + bit as u64);
                        }
                    }
                }
            }
            remaining -= zeros;
        }
        None
    }

    /// Writes the framed form: length, raw words, superblock ranks.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len)?;
        for &w in &self.bits {
            out.write_u64::<LittleEndian>(w)?;
        }
        for &c in &self.super_counts {
            out.write_u64::<LittleEndian>(c)?;
        }
        Ok(())
    }

    /// Reads the framed form and rebuilds the block-level counts.
    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let len = input.read_u64::<LittleEndian>().map_err(read_error)?;
        let mut bits = vec![0u64; words_for(len)];
        for w in bits.iter_mut() {
            *w = input.read_u64::<LittleEndian>().map_err(read_error)?;
        }
        let num_super = len.div_ceil(SUPERBLOCK_BITS) as usize;
        // The stored superblock ranks are recomputed by the constructor;
        // consume them to keep the stream aligned.
        for _ in 0..num_super {
            input.read_u64::<LittleEndian>().map_err(read_error)?;
        }
        Ok(BitRank::new(bits, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{set_bit, words_for};

    fn build(pattern: &[bool]) -> BitRank {
        let mut words = vec![0u64; words_for(pattern.len() as u64).max(1)];
        for (i, &b) in pattern.iter().enumerate() {
            set_bit(&mut words, i as u64, b);
        }
        BitRank::new(words, pattern.len() as u64)
    }

    #[test]
    fn test_rank_against_naive() {
        // Pseudo-random but fixed pattern crossing block and word boundaries
        let pattern: Vec<bool> = (0..1500u32).map(|i| (i * 7 + i / 3) % 5 < 2).collect();
        let br = build(&pattern);
        let mut ones = 0u64;
        for (i, &b) in pattern.iter().enumerate() {
            if b {
                ones += 1;
            }
            assert_eq!(br.get(i as u64), b);
            assert_eq!(br.rank1(i as u64), ones, "rank1 at {i}");
            assert_eq!(br.rank0(i as u64), (i as u64 + 1) - ones, "rank0 at {i}");
        }
        assert_eq!(br.ones(), ones);
    }

    #[test]
    fn test_select_inverts_rank() {
        let pattern: Vec<bool> = (0..1200u32).map(|i| i % 3 == 0 || i % 7 == 0).collect();
        let br = build(&pattern);
        let mut k1 = 0u64;
        let mut k0 = 0u64;
        for (i, &b) in pattern.iter().enumerate() {
            if b {
                k1 += 1;
                assert_eq!(br.select1(k1), Some(i as u64));
            } else {
                k0 += 1;
                assert_eq!(br.select0(k0), Some(i as u64));
            }
        }
        assert_eq!(br.select1(0), None);
        assert_eq!(br.select1(k1 + 1), None);
        assert_eq!(br.select0(k0 + 1), None);
    }

    #[test]
    fn test_all_ones_and_all_zeros() {
        let ones = build(&vec![true; 100]);
        assert_eq!(ones.rank1(99), 100);
        assert_eq!(ones.select1(100), Some(99));
        assert_eq!(ones.select0(1), None);

        let zeros = build(&vec![false; 100]);
        assert_eq!(zeros.rank1(99), 0);
        assert_eq!(zeros.select0(100), Some(99));
        assert_eq!(zeros.select1(1), None);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let pattern: Vec<bool> = (0..700u32).map(|i| i % 11 < 4).collect();
        let br = build(&pattern);
        let mut buf = Vec::new();
        br.save(&mut buf).unwrap();
        let loaded = BitRank::load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.len(), br.len());
        assert_eq!(loaded.ones(), br.ones());
        for i in 0..pattern.len() as u64 {
            assert_eq!(loaded.rank1(i), br.rank1(i));
        }
    }
}
