//! Bit-packed mutable forest used during construction.
//!
//! # Overview
//! One packed record per node: parent pointer, lexicographic name, label
//! byte and the leaf / last-sibling flags, `2·⌈log₂(N+1)⌉ + 8 + 2` bits in
//! total. The sort overwrites parent pointers (path doubling) and names
//! in place; labels and flags are immutable after parsing.
//!
//! A root's parent is the sentinel `N`, so `is_root` is simply
//! `parent(n) ≥ n`, which also covers the self-pointer a node acquires
//! when path doubling reaches its root.
//!
//! # Input encoding
//! Each tree is one line of balanced parentheses, one label byte after each
//! opening paren: `(c⟨children⟩)`. Nodes take ids in parse (DFS) order, so
//! children directly follow their parent and siblings are contiguous.

use crate::bits::{bits_needed, get_bit, get_bits, set_bit, set_bits, words_for};
use crate::bitrank::BitRank;
use crate::error::{IndexError, Result};

pub struct BitForest {
    data: Vec<u64>,
    /// Next unassigned node id.
    free: u64,
    /// Bits per pointer field: ⌈log₂ max(N+1, 256)⌉.
    psize: u32,
    /// Bits per node record.
    bsize: u32,
    documents: u32,
    trees: u64,
    nodes: u64,
    height: u32,
    leaves: u64,
    /// Marks the first node of each document; sealed into `doc_marks`.
    doc_bits: Vec<u64>,
    doc_marks: Option<BitRank>,
}

impl BitForest {
    /// Allocates a forest for the sizes established by the counting pass.
    pub fn new(documents: u32, trees: u64, nodes: u64) -> Self {
        let psize = bits_needed((nodes + 1).max(256));
        let bsize = 2 * psize + 8 + 2;
        BitForest {
            data: vec![0u64; words_for(nodes * bsize as u64) + 1],
            free: 0,
            psize,
            bsize,
            documents,
            trees,
            nodes,
            height: 0,
            leaves: 0,
            doc_bits: vec![0u64; words_for(nodes).max(1)],
            doc_marks: None,
        }
    }

    #[inline]
    fn record(&self, node: u32) -> u64 {
        node as u64 * self.bsize as u64
    }

    #[inline]
    pub fn parent(&self, node: u32) -> u32 {
        get_bits(&self.data, self.psize, self.record(node)) as u32
    }

    /// Parent pointers are rewritten during the doubling sort.
    #[inline]
    pub fn set_parent(&mut self, node: u32, parent: u32) {
        let rec = self.record(node);
        set_bits(&mut self.data, self.psize, rec, parent as u64);
    }

    #[inline]
    pub fn name(&self, node: u32) -> u32 {
        get_bits(&self.data, self.psize, self.record(node) + self.psize as u64) as u32
    }

    #[inline]
    pub fn set_name(&mut self, node: u32, name: u32) {
        let pos = self.record(node) + self.psize as u64;
        set_bits(&mut self.data, self.psize, pos, name as u64);
    }

    #[inline]
    pub fn label(&self, node: u32) -> u8 {
        get_bits(&self.data, 8, self.record(node) + 2 * self.psize as u64) as u8
    }

    fn set_label(&mut self, node: u32, label: u8) {
        let pos = self.record(node) + 2 * self.psize as u64;
        set_bits(&mut self.data, 8, pos, label as u64);
    }

    #[inline]
    pub fn is_leaf(&self, node: u32) -> bool {
        get_bit(&self.data, self.record(node) + 2 * self.psize as u64 + 8)
    }

    fn set_leaf(&mut self, node: u32) {
        let pos = self.record(node) + 2 * self.psize as u64 + 8;
        set_bit(&mut self.data, pos, true);
    }

    #[inline]
    pub fn is_last(&self, node: u32) -> bool {
        get_bit(&self.data, self.record(node) + 2 * self.psize as u64 + 9)
    }

    fn set_last(&mut self, node: u32) {
        let pos = self.record(node) + 2 * self.psize as u64 + 9;
        set_bit(&mut self.data, pos, true);
    }

    #[inline]
    pub fn is_root(&self, node: u32) -> bool {
        self.parent(node) >= node
    }

    pub fn number_of_nodes(&self) -> u64 {
        self.nodes
    }

    pub fn number_of_trees(&self) -> u64 {
        self.trees
    }

    pub fn number_of_documents(&self) -> u32 {
        self.documents
    }

    pub fn number_of_leaves(&self) -> u64 {
        self.leaves
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nodes parsed so far.
    pub fn parsed_nodes(&self) -> u64 {
        self.free
    }

    /// Marks the next parsed node as the first of a new document.
    pub fn mark_document_start(&mut self) {
        if self.free < self.nodes {
            set_bit(&mut self.doc_bits, self.free, true);
        }
    }

    /// Builds the rank structure over the document marks. Call once after
    /// all trees have been added.
    pub fn seal_documents(&mut self) {
        let bits = std::mem::take(&mut self.doc_bits);
        self.doc_marks = Some(BitRank::new(bits, self.nodes));
    }

    /// Document id owning `node`. Requires `seal_documents`.
    pub fn document_of(&self, node: u32) -> u32 {
        let marks = self.doc_marks.as_ref().expect("documents not sealed");
        (marks.rank1(node as u64) - 1) as u32
    }

    /// Parses one tree line, assigning node ids in DFS order.
    ///
    /// The walk is an explicit stack of open ancestors, so chain inputs of
    /// any depth parse without growing the native stack. The leaf flag is
    /// decided by the byte after the label, the last-sibling flag by the
    /// byte after the closing paren.
    pub fn add(&mut self, line: &str) -> Result<()> {
        let bp = line.as_bytes();
        if bp.is_empty() {
            return Err(IndexError::InvalidTree("empty tree line".into()));
        }
        let sentinel = self.nodes as u32;
        let mut stack: Vec<u32> = Vec::new();
        let mut parsed_root = false;
        let mut i = 0usize;
        while i < bp.len() {
            match bp[i] {
                b'(' => {
                    let label = *bp.get(i + 1).ok_or_else(|| {
                        IndexError::InvalidTree(format!(
                            "unexpected end of line at {i} in: {line}"
                        ))
                    })?;
                    if label < 32 || label == b'(' || label == b')' {
                        return Err(IndexError::InvalidTree(format!(
                            "missing or invalid label byte at {} in: {line}",
                            i + 1
                        )));
                    }
                    if stack.is_empty() {
                        if parsed_root {
                            return Err(IndexError::InvalidTree(format!(
                                "more than one tree on a line: {line}"
                            )));
                        }
                        parsed_root = true;
                    }
                    if self.free >= self.nodes {
                        return Err(IndexError::InvalidTree(
                            "input changed between counting and parsing".into(),
                        ));
                    }
                    let node = self.free as u32;
                    self.free += 1;
                    let parent = stack.last().copied().unwrap_or(sentinel);
                    self.set_parent(node, parent);
                    self.set_label(node, label);
                    stack.push(node);
                    if stack.len() as u32 > self.height {
                        self.height = stack.len() as u32;
                    }
                    i += 2;
                    match bp.get(i).copied() {
                        Some(b'(') => {}
                        Some(b')') => {
                            self.set_leaf(node);
                            self.leaves += 1;
                        }
                        _ => {
                            return Err(IndexError::InvalidTree(format!(
                                "expecting '(' or ')' at {i} in: {line}"
                            )));
                        }
                    }
                }
                b')' => {
                    let node = stack.pop().ok_or_else(|| {
                        IndexError::InvalidTree(format!("unbalanced ')' at {i} in: {line}"))
                    })?;
                    i += 1;
                    match bp.get(i).copied() {
                        // A following '(' opens this node's next sibling.
                        Some(b'(') => {}
                        Some(b')') | None => self.set_last(node),
                        _ => {
                            return Err(IndexError::InvalidTree(format!(
                                "unexpected byte at {i} in: {line}"
                            )));
                        }
                    }
                }
                _ => {
                    return Err(IndexError::InvalidTree(format!(
                        "expecting '(' at {i} in: {line}"
                    )));
                }
            }
        }
        if !stack.is_empty() {
            return Err(IndexError::InvalidTree(format!("unbalanced '(' in: {line}")));
        }
        Ok(())
    }
}
