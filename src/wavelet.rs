//! Huffman-shaped wavelet tree over a byte sequence.
//!
//! # Overview
//! The tree's shape follows the Huffman code of the sequence: at depth `d`
//! a node splits its symbols on bit `d` of their code words (assigned
//! least-significant-bit first), storing one [`BitRank`] per internal node.
//! Frequent symbols therefore sit at shallow leaves and `access`, `rank` and
//! `select` all run in time proportional to the symbol's code length.
//!
//! Construction recurses over code levels with heap-allocated children; the
//! query walks are iterative, so deep codes cannot exhaust the native stack.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{set_bit, words_for};
use crate::bitrank::BitRank;
use crate::error::{IndexError, Result, read_error};

/// Code word of one byte symbol, bits consumed least-significant first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: u32,
    pub bits: u32,
}

struct WtNode {
    leaf: bool,
    symbol: u8,
    rank: Option<BitRank>,
    left: Option<Box<WtNode>>,
    right: Option<Box<WtNode>>,
}

/// Wavelet tree plus its 256-entry code table.
pub struct HuffWt {
    codes: Vec<CodeEntry>,
    root: Option<Box<WtNode>>,
}

/// Huffman construction node ordered by (weight, insertion order) so that
/// ties break deterministically across runs.
struct HeapItem {
    weight: u64,
    order: u32,
    symbol: u8,
    left: Option<Box<HeapItem>>,
    right: Option<Box<HeapItem>>,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.order == other.order
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, Huffman wants the lightest.
        (other.weight, other.order).cmp(&(self.weight, self.order))
    }
}

impl HeapItem {
    fn assign(&self, code: u32, bits: u32, codes: &mut [CodeEntry]) {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => {
                left.assign(code, bits + 1, codes);
                right.assign(code | (1u32 << bits), bits + 1, codes);
            }
            _ => codes[self.symbol as usize] = CodeEntry { code, bits },
        }
    }
}

fn make_code_table(seq: &[u8]) -> Vec<CodeEntry> {
    let mut counts = [0u64; 256];
    for &b in seq {
        counts[b as usize] += 1;
    }
    let mut heap = BinaryHeap::new();
    let mut order = 0u32;
    for (symbol, &count) in counts.iter().enumerate() {
        if count > 0 {
            heap.push(HeapItem { weight: count, order, symbol: symbol as u8, left: None, right: None });
            order += 1;
        }
    }
    let mut codes = vec![CodeEntry::default(); 256];
    while heap.len() > 1 {
        let a = heap.pop().expect("heap underflow");
        let b = heap.pop().expect("heap underflow");
        heap.push(HeapItem {
            weight: a.weight + b.weight,
            order,
            symbol: 0,
            left: Some(Box::new(a)),
            right: Some(Box::new(b)),
        });
        order += 1;
    }
    if let Some(top) = heap.pop() {
        top.assign(0, 0, &mut codes);
    }
    codes
}

fn build_node(seq: &[u8], level: u32, codes: &[CodeEntry]) -> WtNode {
    let symbol = seq[0];
    let n = seq.len();
    let mut ones = 0usize;
    for &b in seq {
        if (codes[b as usize].code >> level) & 1 != 0 {
            ones += 1;
        }
    }
    if ones == 0 || ones == n {
        // Huffman trees have no unary branches, so a one-sided split means
        // the sequence is down to a single distinct symbol.
        return WtNode { leaf: true, symbol, rank: None, left: None, right: None };
    }

    let mut zeros_seq = Vec::with_capacity(n - ones);
    let mut ones_seq = Vec::with_capacity(ones);
    let mut words = vec![0u64; words_for(n as u64)];
    for (i, &b) in seq.iter().enumerate() {
        if (codes[b as usize].code >> level) & 1 != 0 {
            set_bit(&mut words, i as u64, true);
            ones_seq.push(b);
        } else {
            zeros_seq.push(b);
        }
    }
    WtNode {
        leaf: false,
        symbol,
        rank: Some(BitRank::new(words, n as u64)),
        left: Some(Box::new(build_node(&zeros_seq, level + 1, codes))),
        right: Some(Box::new(build_node(&ones_seq, level + 1, codes))),
    }
}

impl HuffWt {
    /// Builds the code table and tree over `seq`. An empty sequence yields
    /// an empty tree whose queries all report "no occurrences".
    pub fn build(seq: &[u8]) -> Self {
        let codes = make_code_table(seq);
        let root =
            if seq.is_empty() { None } else { Some(Box::new(build_node(seq, 0, &codes))) };
        HuffWt { codes, root }
    }

    /// Symbol at position `i`.
    pub fn access(&self, i: u64) -> u8 {
        self.access_rank(i).0
    }

    /// Symbol at position `i` together with its 1-based rank at `i`
    /// (the number of occurrences of that symbol in `[0, i]`).
    pub fn access_rank(&self, mut i: u64) -> (u8, u64) {
        let mut node = self.root.as_deref().expect("access on empty sequence");
        loop {
            if node.leaf {
                return (node.symbol, i + 1);
            }
            let br = node.rank.as_ref().expect("internal node");
            if br.get(i) {
                i = br.rank1(i) - 1;
                node = node.right.as_deref().expect("internal node");
            } else {
                i = br.rank0(i) - 1;
                node = node.left.as_deref().expect("internal node");
            }
        }
    }

    /// Occurrences of `c` in `[0, i]`. A symbol absent from the sequence
    /// reports 0.
    pub fn rank(&self, c: u8, i: u64) -> u64 {
        let Some(root) = self.root.as_deref() else {
            return 0;
        };
        let entry = self.codes[c as usize];
        if entry.bits == 0 {
            // Either the single-symbol alphabet or an absent symbol.
            return if root.leaf && root.symbol == c { i + 1 } else { 0 };
        }
        let mut node = root;
        let mut pos = i;
        for level in 0..entry.bits {
            let br = node.rank.as_ref().expect("code deeper than tree");
            let r = if (entry.code >> level) & 1 != 0 {
                let r = br.rank1(pos);
                node = node.right.as_deref().expect("code deeper than tree");
                r
            } else {
                let r = br.rank0(pos);
                node = node.left.as_deref().expect("code deeper than tree");
                r
            };
            if r == 0 {
                return 0;
            }
            pos = r - 1;
        }
        pos + 1
    }

    /// Position of the `j`-th occurrence of `c` (1-based), or `None` when
    /// there are fewer than `j` occurrences.
    pub fn select(&self, c: u8, j: u64) -> Option<u64> {
        let root = self.root.as_deref()?;
        if j == 0 {
            return None;
        }
        let entry = self.codes[c as usize];
        if entry.bits == 0 {
            return if root.leaf && root.symbol == c { Some(j - 1) } else { None };
        }
        // Walk down to record the enclosing nodes, then map the occurrence
        // index back up through their select operations.
        let mut path: Vec<&WtNode> = Vec::with_capacity(entry.bits as usize);
        let mut node = root;
        for level in 0..entry.bits {
            path.push(node);
            node = if (entry.code >> level) & 1 != 0 {
                node.right.as_deref()?
            } else {
                node.left.as_deref()?
            };
        }
        let mut k = j;
        for level in (0..entry.bits).rev() {
            let br = path[level as usize].rank.as_ref().expect("internal node");
            let p = if (entry.code >> level) & 1 != 0 { br.select1(k)? } else { br.select0(k)? };
            k = p + 1;
        }
        Some(k - 1)
    }

    /// Writes the code table followed by the recursive node framing.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        for entry in &self.codes {
            out.write_u32::<LittleEndian>(entry.code)?;
            out.write_u32::<LittleEndian>(entry.bits)?;
        }
        match self.root.as_deref() {
            None => {
                // Sentinel in place of the root's leaf flag.
                out.write_u8(2)?;
                Ok(())
            }
            Some(root) => Self::save_node(root, out),
        }
    }

    fn save_node<W: Write>(node: &WtNode, out: &mut W) -> Result<()> {
        out.write_u8(node.leaf as u8)?;
        out.write_u8(node.symbol)?;
        if !node.leaf {
            node.rank.as_ref().expect("internal node").save(out)?;
            Self::save_node(node.left.as_deref().expect("internal node"), out)?;
            Self::save_node(node.right.as_deref().expect("internal node"), out)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let mut codes = vec![CodeEntry::default(); 256];
        for entry in codes.iter_mut() {
            entry.code = input.read_u32::<LittleEndian>().map_err(read_error)?;
            entry.bits = input.read_u32::<LittleEndian>().map_err(read_error)?;
        }
        let flag = input.read_u8().map_err(read_error)?;
        let root = if flag == 2 { None } else { Some(Box::new(Self::load_node(flag, input)?)) };
        Ok(HuffWt { codes, root })
    }

    fn load_node<R: Read>(flag: u8, input: &mut R) -> Result<WtNode> {
        let symbol = input.read_u8().map_err(read_error)?;
        match flag {
            1 => Ok(WtNode { leaf: true, symbol, rank: None, left: None, right: None }),
            0 => {
                let rank = BitRank::load(input)?;
                let lflag = input.read_u8().map_err(read_error)?;
                let left = Self::load_node(lflag, input)?;
                let rflag = input.read_u8().map_err(read_error)?;
                let right = Self::load_node(rflag, input)?;
                Ok(WtNode {
                    leaf: false,
                    symbol,
                    rank: Some(rank),
                    left: Some(Box::new(left)),
                    right: Some(Box::new(right)),
                })
            }
            _ => Err(IndexError::Truncated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_rank(seq: &[u8], c: u8, i: usize) -> u64 {
        seq[..=i].iter().filter(|&&b| b == c).count() as u64
    }

    #[test]
    fn test_access_matches_sequence() {
        let seq = b"abracadabra_abracadabra";
        let wt = HuffWt::build(seq);
        for (i, &b) in seq.iter().enumerate() {
            assert_eq!(wt.access(i as u64), b, "position {i}");
        }
    }

    #[test]
    fn test_rank_and_select_cross_check() {
        let seq = b"mississippi_river_runs_south";
        let wt = HuffWt::build(seq);
        for c in [b'i', b's', b'_', b'm', b'h'] {
            let mut seen = 0u64;
            for i in 0..seq.len() {
                assert_eq!(wt.rank(c, i as u64), naive_rank(seq, c, i), "rank({c}, {i})");
                if seq[i] == c {
                    seen += 1;
                    assert_eq!(wt.select(c, seen), Some(i as u64), "select({c}, {seen})");
                }
            }
            assert_eq!(wt.select(c, seen + 1), None);
        }
    }

    #[test]
    fn test_access_rank_pairs() {
        let seq = b"XXYYXZ";
        let wt = HuffWt::build(seq);
        assert_eq!(wt.access_rank(0), (b'X', 1));
        assert_eq!(wt.access_rank(1), (b'X', 2));
        assert_eq!(wt.access_rank(3), (b'Y', 2));
        assert_eq!(wt.access_rank(5), (b'Z', 1));
    }

    #[test]
    fn test_absent_symbol() {
        let wt = HuffWt::build(b"aabbcc");
        assert_eq!(wt.rank(b'z', 5), 0);
        assert_eq!(wt.select(b'z', 1), None);
    }

    #[test]
    fn test_single_symbol_sequence() {
        let wt = HuffWt::build(b"ZZZZ");
        assert_eq!(wt.access(2), b'Z');
        assert_eq!(wt.rank(b'Z', 3), 4);
        assert_eq!(wt.select(b'Z', 4), Some(3));
        assert_eq!(wt.rank(b'Y', 3), 0);
    }

    #[test]
    fn test_empty_sequence() {
        let wt = HuffWt::build(b"");
        assert_eq!(wt.rank(b'a', 0), 0);
        assert_eq!(wt.select(b'a', 1), None);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let seq = b"the_quick_brown_fox_jumps_over_the_lazy_dog";
        let wt = HuffWt::build(seq);
        let mut buf = Vec::new();
        wt.save(&mut buf).unwrap();
        let loaded = HuffWt::load(&mut buf.as_slice()).unwrap();
        for (i, &b) in seq.iter().enumerate() {
            assert_eq!(loaded.access(i as u64), b);
            assert_eq!(loaded.rank(b, i as u64), wt.rank(b, i as u64));
        }
    }

    #[test]
    fn test_empty_save_load() {
        let wt = HuffWt::build(b"");
        let mut buf = Vec::new();
        wt.save(&mut buf).unwrap();
        let loaded = HuffWt::load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.rank(b'a', 0), 0);
    }
}
