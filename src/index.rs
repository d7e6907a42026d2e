//! Read-only query engine over the sorted forest.
//!
//! # Overview
//! Sorting nodes by their upward label sequences places every sibling group
//! in a contiguous range. The first symbol of a node's (parent-started)
//! upward sequence is its parent's label, so "find the children of a node
//! labeled c" works like the LF step of a string BWT: `F[c]` locates the
//! block of nodes whose parent is labeled c, the rank of the parent among
//! c-labeled internal nodes picks the sibling group inside the block, and
//! the LAST vector delimits it.
//!
//! Node positions are in sorted order throughout. Ranges are inclusive
//! `(lo, hi)` pairs; `hi < lo` is the uniform "empty" sentinel, never an
//! error.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bitrank::BitRank;
use crate::blockarray::BlockArray;
use crate::builder::TbwtBuilder;
use crate::byteset::ByteSet;
use crate::error::{IndexError, Result, read_error};
use crate::forest::BitForest;
use crate::wavelet::HuffWt;

/// Inclusive range of sorted node positions; empty iff `hi < lo`.
pub type NodeRange = (u64, u64);

/// Per-document occurrence counts, ordered by document id.
pub type FreqMap = BTreeMap<u32, u32>;

const MAGIC: &[u8; 8] = b"TBWTIDX\0";
const VERSION: u32 = 1;

pub struct TbwtIndex {
    documents: u32,
    trees: u64,
    nodes: u64,
    leaf: BitRank,
    last: BitRank,
    /// Internal-node labels in sorted order.
    wt: HuffWt,
    /// Leaf labels in sorted order.
    wt_leaf: HuffWt,
    /// `F[c]`: sorted position of the first node whose parent is labeled c.
    f: Box<[u32; 256]>,
    /// Document id per leaf position.
    leaf_entry: BlockArray,
    /// Document id per sibling group past the root block.
    last_entry: BlockArray,
}

impl TbwtIndex {
    /// Sorts the forest and assembles the compressed index. The forest is
    /// consumed and released once its arrays have been extracted.
    pub fn build(forest: BitForest, verbose: bool) -> Result<Self> {
        let nodes = forest.number_of_nodes();
        let trees = forest.number_of_trees();
        if nodes == 0 || trees == 0 {
            return Err(IndexError::InvalidTree("input contains no trees".into()));
        }
        let documents = forest.number_of_documents();
        let leaves = forest.number_of_leaves();

        let mut builder = TbwtBuilder::new(forest);
        builder.sort(verbose)?;

        let leaf = BitRank::new(builder.leaf_bits(), nodes);
        assert_eq!(leaf.ones(), leaves, "leaf vector disagrees with parsed leaf count");
        let last = BitRank::new(builder.last_bits(), nodes);
        assert_eq!(
            last.ones(),
            nodes - leaves + 1,
            "last vector disagrees with internal node count"
        );

        let wt = HuffWt::build(&builder.tbwt_internal());
        let wt_leaf = HuffWt::build(&builder.tbwt_leaf());
        let (_, f) = builder.count_and_f();
        let leaf_entry = builder.leaf_entry();
        let last_entry = builder.last_entry();

        Ok(TbwtIndex {
            documents,
            trees,
            nodes,
            leaf,
            last,
            wt,
            wt_leaf,
            f: Box::new(f),
            leaf_entry,
            last_entry,
        })
    }

    pub fn number_of_nodes(&self) -> u64 {
        self.nodes
    }

    pub fn number_of_trees(&self) -> u64 {
        self.trees
    }

    pub fn number_of_leaves(&self) -> u64 {
        self.leaf.ones()
    }

    pub fn number_of_documents(&self) -> u32 {
        self.documents
    }

    #[inline]
    pub fn is_leaf(&self, v: u64) -> bool {
        self.leaf.get(v)
    }

    /// Roots occupy the sorted prefix `[0, T)`.
    #[inline]
    pub fn is_root(&self, v: u64) -> bool {
        v < self.trees
    }

    /// Root of the given tree (trees are numbered in input order).
    pub fn get_root(&self, tree: u64) -> u64 {
        debug_assert!(tree < self.trees);
        tree
    }

    /// Label of the node at sorted position `v`.
    pub fn label(&self, v: u64) -> u8 {
        if self.leaf.get(v) {
            self.wt_leaf.access(self.leaf.rank1(v) - 1)
        } else {
            self.wt.access(self.leaf.rank0(v) - 1)
        }
    }

    /// Children of `v` as an inclusive range; empty for leaves.
    pub fn children(&self, v: u64) -> NodeRange {
        if self.is_leaf(v) {
            return (1, 0);
        }
        let u = self.leaf.rank0(v) - 1; // position among internal nodes
        let (c, r) = self.wt.access_rank(u); // r = rank of v within label c
        let y = self.f[c as usize] as u64;
        let z = if y > 0 { self.last.rank1(y - 1) } else { 0 };
        let lo = self.last.select1(z + r - 1).expect("sibling group start") + 1;
        let hi = self.last.select1(z + r).expect("sibling group end");
        (lo, hi)
    }

    /// The `k`-th child of `v`, 1-based. Out-of-range `k` is a programmer
    /// error and reports `OutOfRange`.
    pub fn ranked_child(&self, v: u64, k: u64) -> Result<u64> {
        let (lo, hi) = self.children(v);
        let degree = if hi < lo { 0 } else { hi - lo + 1 };
        if k == 0 || k > degree {
            return Err(IndexError::OutOfRange { k, degree });
        }
        Ok(lo + k - 1)
    }

    pub fn degree(&self, v: u64) -> u64 {
        let (lo, hi) = self.children(v);
        if hi < lo { 0 } else { hi - lo + 1 }
    }

    /// Number of sibling groups (equivalently, internal nodes) whose LAST
    /// bit falls inside `range`.
    pub fn subtree_size(&self, range: NodeRange) -> u64 {
        let (lo, hi) = range;
        if hi < lo {
            return 0;
        }
        let before = if lo > 0 { self.last.rank1(lo - 1) } else { 0 };
        self.last.rank1(hi) - before
    }

    /// Same count as [`subtree_size`](Self::subtree_size); kept under the
    /// aggregation name the query layer uses.
    pub fn internal_count(&self, range: NodeRange) -> u64 {
        self.subtree_size(range)
    }

    /// Labels of the internal nodes inside `range`.
    pub fn labels_in_subtree(&self, range: NodeRange) -> ByteSet {
        let (lo, hi) = range;
        let mut set = ByteSet::new();
        if hi < lo {
            return set;
        }
        let mut sp = if lo > 0 { self.leaf.rank0(lo - 1) } else { 0 };
        let ep = self.leaf.rank0(hi);
        while sp < ep {
            set.insert(self.wt.access(sp));
            sp += 1;
        }
        set
    }

    /// Labels of the leaves inside `range`.
    pub fn labels_of_leaves(&self, range: NodeRange) -> ByteSet {
        let (lo, hi) = range;
        let mut set = ByteSet::new();
        if hi < lo {
            return set;
        }
        let mut sp = if lo > 0 { self.leaf.rank1(lo - 1) } else { 0 };
        let ep = self.leaf.rank1(hi);
        while sp < ep {
            set.insert(self.wt_leaf.access(sp));
            sp += 1;
        }
        set
    }

    /// Combined children-range of every internal node in `range` labeled
    /// `c`. An unknown symbol yields an empty range, not an error.
    pub fn subtree_for_symbol(&self, range: NodeRange, c: u8) -> NodeRange {
        let (lo, hi) = range;
        if hi < lo {
            return (1, 0);
        }
        let sp0 = if lo > 0 { self.leaf.rank0(lo - 1) } else { 0 };
        let ep0 = self.leaf.rank0(hi);
        if ep0 == 0 || sp0 >= ep0 {
            // No internal nodes inside the range at all.
            return (sp0 + 1, sp0);
        }
        let sp = if sp0 > 0 { self.wt.rank(c, sp0 - 1) } else { 0 };
        let ep = self.wt.rank(c, ep0 - 1);
        if sp >= ep {
            return (sp + 1, ep);
        }
        // Outermost c-labeled internal positions, mapped back to node ids.
        let s = self.wt.select(c, sp + 1).expect("rank and select agree");
        let e = self.wt.select(c, ep).expect("rank and select agree");
        let s_node = self.leaf.select0(s + 1).expect("internal position is a node");
        let e_node = self.leaf.select0(e + 1).expect("internal position is a node");
        let first = self.ranked_child(s_node, 1).expect("internal node has children");
        let last = self
            .ranked_child(e_node, self.degree(e_node))
            .expect("internal node has children");
        (first, last)
    }

    /// Per-document counts of leaves labeled `c` inside `range`.
    pub fn leaf_frequency(&self, range: NodeRange, c: u8) -> FreqMap {
        let (lo, hi) = range;
        let mut freq = FreqMap::new();
        if hi < lo {
            return freq;
        }
        let mut sp = if lo > 0 { self.leaf.rank1(lo - 1) } else { 0 };
        let ep = self.leaf.rank1(hi);
        while sp < ep {
            if self.wt_leaf.access(sp) == c {
                *freq.entry(self.leaf_entry.get(sp) as u32).or_insert(0) += 1;
            }
            sp += 1;
        }
        freq
    }

    /// Count of leaves labeled `c` inside `range`.
    pub fn leaf_count(&self, range: NodeRange, c: u8) -> u64 {
        let (lo, hi) = range;
        if hi < lo {
            return 0;
        }
        let sp = if lo > 0 { self.leaf.rank1(lo - 1) } else { 0 };
        let ep = self.leaf.rank1(hi);
        if ep == 0 || sp >= ep {
            return 0;
        }
        let before = if sp > 0 { self.wt_leaf.rank(c, sp - 1) } else { 0 };
        self.wt_leaf.rank(c, ep - 1) - before
    }

    /// Count of all leaves inside `range`.
    pub fn total_leaf_count(&self, range: NodeRange) -> u64 {
        let (lo, hi) = range;
        if hi < lo {
            return 0;
        }
        let sp = if lo > 0 { self.leaf.rank1(lo - 1) } else { 0 };
        self.leaf.rank1(hi) - sp
    }

    /// Per-document counts of the sibling groups inside `range`. The root
    /// block carries no entries, so a range starting at node 0 is empty.
    pub fn internal_frequency(&self, range: NodeRange) -> FreqMap {
        let (lo, hi) = range;
        let mut freq = FreqMap::new();
        if hi < lo || lo == 0 {
            return freq;
        }
        let r_lo = self.last.rank1(lo - 1);
        if r_lo == 0 {
            return freq;
        }
        // Entry j belongs to the (j+2)-th LAST bit: the root group at T-1
        // owns the first bit and no entry.
        let mut sp = r_lo - 1;
        let ep = self.last.rank1(hi) - 1;
        while sp < ep {
            *freq.entry(self.last_entry.get(sp) as u32).or_insert(0) += 1;
            sp += 1;
        }
        freq
    }

    /// Writes the index in the framed little-endian format.
    pub fn save_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(MAGIC)?;
        out.write_u32::<LittleEndian>(VERSION)?;
        out.write_u32::<LittleEndian>(self.documents)?;
        out.write_u64::<LittleEndian>(self.trees)?;
        out.write_u64::<LittleEndian>(self.nodes)?;
        self.leaf.save(out)?;
        self.last.save(out)?;
        self.wt.save(out)?;
        self.wt_leaf.save(out)?;
        for &v in self.f.iter() {
            out.write_u32::<LittleEndian>(v)?;
        }
        self.leaf_entry.save(out)?;
        self.last_entry.save(out)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.save_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn load_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic).map_err(read_error)?;
        if &magic != MAGIC {
            return Err(IndexError::BadMagic);
        }
        let version = input.read_u32::<LittleEndian>().map_err(read_error)?;
        if version != VERSION {
            return Err(IndexError::VersionMismatch(version));
        }
        let documents = input.read_u32::<LittleEndian>().map_err(read_error)?;
        let trees = input.read_u64::<LittleEndian>().map_err(read_error)?;
        let nodes = input.read_u64::<LittleEndian>().map_err(read_error)?;
        let leaf = BitRank::load(input)?;
        let last = BitRank::load(input)?;
        let wt = HuffWt::load(input)?;
        let wt_leaf = HuffWt::load(input)?;
        let mut f = Box::new([0u32; 256]);
        for v in f.iter_mut() {
            *v = input.read_u32::<LittleEndian>().map_err(read_error)?;
        }
        let leaf_entry = BlockArray::load(input)?;
        let last_entry = BlockArray::load(input)?;
        Ok(TbwtIndex {
            documents,
            trees,
            nodes,
            leaf,
            last,
            wt,
            wt_leaf,
            f,
            leaf_entry,
            last_entry,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut input = BufReader::new(File::open(path)?);
        Self::load_from(&mut input)
    }

    /// Opens `<path>.tbwt` when present, otherwise `<path>` verbatim.
    pub fn open(path: &Path) -> Result<Self> {
        let mut with_ext = OsString::from(path.as_os_str());
        with_ext.push(".tbwt");
        match File::open(&with_ext) {
            Ok(file) => Self::load_from(&mut BufReader::new(file)),
            Err(_) => Self::load(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an index from one slice of tree lines per document.
    fn build_index(docs: &[&[&str]]) -> TbwtIndex {
        let trees: u64 = docs.iter().map(|d| d.len() as u64).sum();
        let nodes: u64 = docs.iter().flat_map(|d| d.iter()).map(|l| l.len() as u64 / 3).sum();
        let mut forest = BitForest::new(docs.len() as u32, trees, nodes);
        for doc in docs {
            forest.mark_document_start();
            for line in *doc {
                forest.add(line).expect("valid input");
            }
        }
        forest.seal_documents();
        TbwtIndex::build(forest, false).expect("build")
    }

    #[test]
    fn test_small_forest_counts_and_children() {
        // (A) and (B(C)(D)) in one document
        let index = build_index(&[&["(A)", "(B(C)(D))"]]);
        assert_eq!(index.number_of_documents(), 1);
        assert_eq!(index.number_of_trees(), 2);
        assert_eq!(index.number_of_nodes(), 4);
        assert_eq!(index.number_of_leaves(), 3);

        assert_eq!(index.label(index.get_root(0)), b'A');
        assert_eq!(index.label(index.get_root(1)), b'B');

        let kids = index.children(1);
        assert_eq!(kids.1 - kids.0 + 1, 2);
        let labels: Vec<u8> = (kids.0..=kids.1).map(|v| index.label(v)).collect();
        assert_eq!(labels, b"CD".to_vec());

        // B itself is the only internal node counted in its group
        assert_eq!(index.subtree_size((1, 1)), 1);
    }

    #[test]
    fn test_duplicate_leaf_siblings() {
        // (A(B)(B)): two sibling leaves with the same label
        let index = build_index(&[&["(A(B)(B))"]]);
        let kids = index.children(0);
        assert_eq!(kids.1 - kids.0 + 1, 2);
        assert!(index.is_leaf(kids.0) && index.is_leaf(kids.1));
        assert_eq!(index.leaf_count(kids, b'B'), 2);
        let freq = index.leaf_frequency(kids, b'B');
        assert_eq!(freq.get(&0), Some(&2));
    }

    #[test]
    fn test_identical_chains_share_ranges() {
        // (X(Y(Z))) in two documents
        let index = build_index(&[&["(X(Y(Z)))"], &["(X(Y(Z)))"]]);
        assert_eq!(index.number_of_documents(), 2);
        let roots = (0, index.number_of_trees() - 1);
        let xs = index.subtree_for_symbol(roots, b'X');
        assert_eq!(xs, (2, 3));
        let ys = index.subtree_for_symbol(xs, b'Y');
        assert_eq!(ys.1 - ys.0 + 1, 2);
        let freq = index.leaf_frequency(ys, b'Z');
        assert_eq!(freq.get(&0), Some(&1));
        assert_eq!(freq.get(&1), Some(&1));
    }

    #[test]
    fn test_unknown_symbol_is_empty_range() {
        let index = build_index(&[&["(X(Y(Z)))"]]);
        let roots = (0, index.number_of_trees() - 1);
        let range = index.subtree_for_symbol(roots, b'Q');
        assert!(range.1 < range.0);
        assert_eq!(index.subtree_size(range), 0);
        assert_eq!(index.total_leaf_count(range), 0);
        assert!(index.internal_frequency(range).is_empty());
    }

    #[test]
    fn test_single_node_forest() {
        let index = build_index(&[&["(A)"]]);
        assert_eq!(index.number_of_nodes(), 1);
        assert_eq!(index.number_of_trees(), 1);
        assert_eq!(index.number_of_leaves(), 1);
        let kids = index.children(0);
        assert!(kids.1 < kids.0);
        assert_eq!(index.degree(0), 0);
        assert_eq!(index.label(0), b'A');
    }

    #[test]
    fn test_all_roots_forest() {
        let index = build_index(&[&["(C)", "(A)", "(B)"]]);
        assert_eq!(index.number_of_leaves(), 3);
        // Roots keep their input order
        assert_eq!(index.label(0), b'C');
        assert_eq!(index.label(1), b'A');
        assert_eq!(index.label(2), b'B');
        for v in 0..3 {
            assert!(index.is_root(v));
            assert!(index.is_leaf(v));
        }
        let labels = index.labels_of_leaves((0, 2));
        assert_eq!(labels.iter().collect::<Vec<_>>(), b"ABC".to_vec());
        assert!(index.labels_in_subtree((0, 2)).is_empty());
    }

    #[test]
    fn test_ranked_child_bounds() {
        let index = build_index(&[&["(A(B)(C))"]]);
        let first = index.ranked_child(0, 1).unwrap();
        let second = index.ranked_child(0, 2).unwrap();
        assert_eq!(second, first + 1);
        assert!(matches!(index.ranked_child(0, 3), Err(IndexError::OutOfRange { .. })));
        assert!(matches!(index.ranked_child(0, 0), Err(IndexError::OutOfRange { .. })));
    }

    #[test]
    fn test_children_preserve_sibling_order() {
        // Children must come back in original order even with equal labels
        let index = build_index(&[&["(R(A(X))(B)(A(Y)))"]]);
        let kids = index.children(0);
        let labels: Vec<u8> = (kids.0..=kids.1).map(|v| index.label(v)).collect();
        assert_eq!(labels, b"ABA".to_vec());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let index = build_index(&[&["(A)", "(B(C)(D))"], &["(X(Y(Z)))"]]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.tbwt");
        index.save(&path).unwrap();
        let loaded = TbwtIndex::load(&path).unwrap();

        assert_eq!(loaded.number_of_nodes(), index.number_of_nodes());
        assert_eq!(loaded.number_of_trees(), index.number_of_trees());
        assert_eq!(loaded.number_of_leaves(), index.number_of_leaves());
        assert_eq!(loaded.number_of_documents(), index.number_of_documents());
        for v in 0..index.number_of_nodes() {
            assert_eq!(loaded.label(v), index.label(v));
            assert_eq!(loaded.is_leaf(v), index.is_leaf(v));
            assert_eq!(loaded.children(v), index.children(v));
        }
    }

    #[test]
    fn test_open_appends_extension() {
        let index = build_index(&[&["(A)"]]);
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("tiny");
        let mut with_ext = stem.clone().into_os_string();
        with_ext.push(".tbwt");
        index.save(Path::new(&with_ext)).unwrap();
        let loaded = TbwtIndex::open(&stem).unwrap();
        assert_eq!(loaded.number_of_nodes(), 1);
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tbwt");
        std::fs::write(&path, b"this is not an index file").unwrap();
        assert!(matches!(TbwtIndex::load(&path), Err(IndexError::BadMagic)));
    }

    #[test]
    fn test_truncated_file() {
        let index = build_index(&[&["(A)", "(B(C)(D))"]]);
        let mut buf = Vec::new();
        index.save_to(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(matches!(
            TbwtIndex::load_from(&mut buf.as_slice()),
            Err(IndexError::Truncated)
        ));
    }

    #[test]
    fn test_node_conservation() {
        let index = build_index(&[&["(R(A(X)(Y))(B))"]]);
        let n = index.number_of_nodes();
        let leaves = index.number_of_leaves();
        let whole = (0, n - 1);
        assert_eq!(index.total_leaf_count(whole), leaves);
        // Every internal node ends exactly one sibling group, plus the one
        // group formed by the roots themselves.
        assert_eq!(index.subtree_size(whole), (n - leaves) + 1);
        assert_eq!(index.internal_count(whole), index.subtree_size(whole));
    }
}
