//! Path-doubling node sort and TBWT array extraction.
//!
//! # Overview
//! The tree analogue of Larsson–Sadakane suffix sorting. Nodes are sorted by
//! their upward label sequences using integer names that double their
//! comparison depth every pass:
//!
//! 1. roots start with name 0, every other node with its parent's label;
//! 2. each pass stably sorts node ids by `(name, parent's name)` and renames
//!    every maximal run of equal keys with a fresh integer;
//! 3. parent pointers are then replaced by grandparent pointers, with a
//!    self-pointer once the old parent was a root.
//!
//! ⌈log₂ height⌉ passes reach a fixpoint. Stability makes tie-breaking
//! reproducible and keeps siblings in their original order, which the
//! navigation layer's F/LAST bookkeeping depends on.

use rayon::slice::ParallelSliceMut;

use crate::bits::{bits_needed, get_bit, set_bit, words_for};
use crate::blockarray::BlockArray;
use crate::error::{IndexError, Result};
use crate::forest::BitForest;

pub struct TbwtBuilder {
    forest: BitForest,
    /// After `sort`: `name[i]` is the original node id at sorted position i.
    name: Vec<u32>,
}

/// Sort key of one pass: the node's current name and its parent's, with
/// roots contributing a zero parent name.
#[inline]
fn sort_key(forest: &BitForest, node: u32) -> (u32, u32) {
    let own = forest.name(node);
    if forest.is_root(node) { (own, 0) } else { (own, forest.name(forest.parent(node))) }
}

impl TbwtBuilder {
    pub fn new(forest: BitForest) -> Self {
        TbwtBuilder { forest, name: Vec::new() }
    }

    pub fn forest(&self) -> &BitForest {
        &self.forest
    }

    /// Runs the doubling sort. Call once.
    pub fn sort(&mut self, verbose: bool) -> Result<()> {
        let t = self.forest.number_of_nodes();
        if t >= u32::MAX as u64 {
            return Err(IndexError::TooManyNodes(t));
        }
        assert!(self.name.is_empty(), "sort() called twice");
        self.name = (0..t as u32).collect();

        for i in 0..t as u32 {
            if self.forest.is_root(i) {
                self.forest.set_name(i, 0);
            } else {
                let parent_label = self.forest.label(self.forest.parent(i));
                self.forest.set_name(i, parent_label as u32);
            }
        }

        let height = self.forest.height() as u64;
        let total_passes = if height <= 1 { 0 } else { 64 - (height - 1).leading_zeros() };
        let mut iter = 0u32;
        while (1u64 << iter) < height {
            if verbose {
                eprintln!("builder: sorting pass {iter} of {total_passes}");
            }
            {
                let forest = &self.forest;
                self.name.par_sort_by(|&a, &b| sort_key(forest, a).cmp(&sort_key(forest, b)));
            }

            // Renaming: every maximal run of equal keys gets one fresh name.
            // Run boundaries are recorded first, since writing names back
            // would perturb the keys being compared.
            let mut bump = vec![0u64; words_for(t).max(1)];
            {
                let forest = &self.forest;
                for j in 0..t.saturating_sub(1) {
                    if sort_key(forest, self.name[j as usize])
                        < sort_key(forest, self.name[j as usize + 1])
                    {
                        set_bit(&mut bump, j, true);
                    }
                }
            }
            let mut fresh = 0u32;
            for j in 0..t {
                self.forest.set_name(self.name[j as usize], fresh);
                if get_bit(&bump, j) {
                    fresh += 1;
                }
            }

            // Parent doubling, skipped on the final pass. Descending id
            // order: children come before their (lower-id) parents, so each
            // node still reads its parent's pre-update pointer.
            if (1u64 << (iter + 1)) < height {
                for j in (0..t as u32).rev() {
                    if !self.forest.is_root(j) {
                        let parent = self.forest.parent(j);
                        if self.forest.is_root(parent) {
                            self.forest.set_parent(j, j);
                        } else {
                            self.forest.set_parent(j, self.forest.parent(parent));
                        }
                    }
                }
            }
            iter += 1;
        }
        if verbose {
            eprintln!("builder: sorting completed");
        }
        Ok(())
    }

    fn assert_sorted(&self) {
        assert!(!self.name.is_empty(), "sort() was not called");
    }

    /// LEAF bit-vector words over sorted positions.
    pub fn leaf_bits(&self) -> Vec<u64> {
        self.assert_sorted();
        let t = self.forest.number_of_nodes();
        let mut bv = vec![0u64; words_for(t).max(1)];
        for i in 0..t {
            set_bit(&mut bv, i, self.forest.is_leaf(self.name[i as usize]));
        }
        bv
    }

    /// LAST bit-vector words over sorted positions. Roots occupy the prefix
    /// `[0, T)` and collapse into one sibling group: every position before
    /// `T−1` is forced to zero.
    pub fn last_bits(&self) -> Vec<u64> {
        self.assert_sorted();
        let t = self.forest.number_of_nodes();
        let mut bv = vec![0u64; words_for(t).max(1)];
        for i in self.forest.number_of_trees() - 1..t {
            set_bit(&mut bv, i, self.forest.is_last(self.name[i as usize]));
        }
        bv
    }

    /// Labels of internal nodes in sorted order.
    pub fn tbwt_internal(&self) -> Vec<u8> {
        self.assert_sorted();
        self.name
            .iter()
            .filter(|&&v| !self.forest.is_leaf(v))
            .map(|&v| self.forest.label(v))
            .collect()
    }

    /// Labels of leaves in sorted order.
    pub fn tbwt_leaf(&self) -> Vec<u8> {
        self.assert_sorted();
        self.name
            .iter()
            .filter(|&&v| self.forest.is_leaf(v))
            .map(|&v| self.forest.label(v))
            .collect()
    }

    /// Label counts C and block starts F.
    ///
    /// `C[c]` counts internal nodes labeled c, with `C[0]` seeded by the
    /// tree count: the roots stand in for children of a virtual label-0
    /// super-root. The F scan walks the raw per-node last flags (where each
    /// root counts as its own group, unlike the stored LAST vector), so
    /// `F[c]` lands on the first sorted node whose parent is labeled c.
    pub fn count_and_f(&self) -> ([u32; 256], [u32; 256]) {
        self.assert_sorted();
        let mut c = [0u32; 256];
        c[0] = self.forest.number_of_trees() as u32;
        for &v in &self.name {
            if !self.forest.is_leaf(v) {
                c[self.forest.label(v) as usize] += 1;
            }
        }
        let mut f = [0u32; 256];
        for i in 0..255usize {
            let mut groups = 0u32;
            let mut j = f[i];
            while groups != c[i] {
                if self.forest.is_last(self.name[j as usize]) {
                    groups += 1;
                }
                j += 1;
            }
            f[i + 1] = j;
        }
        (c, f)
    }

    /// Document id of each leaf in sorted order.
    pub fn leaf_entry(&self) -> BlockArray {
        self.assert_sorted();
        let width = bits_needed(self.forest.number_of_documents() as u64);
        let mut arr = BlockArray::new(self.forest.number_of_leaves(), width);
        let mut j = 0u64;
        for &v in &self.name {
            if self.forest.is_leaf(v) {
                arr.set(j, self.forest.document_of(v) as u64);
                j += 1;
            }
        }
        arr
    }

    /// Document id of each sibling group in sorted order, one per last-child
    /// position past the root block (one per internal node).
    pub fn last_entry(&self) -> BlockArray {
        self.assert_sorted();
        let internal = self.forest.number_of_nodes() - self.forest.number_of_leaves();
        let width = bits_needed(self.forest.number_of_documents() as u64);
        let mut arr = BlockArray::new(internal, width);
        let mut j = 0u64;
        for i in self.forest.number_of_trees()..self.forest.number_of_nodes() {
            let v = self.name[i as usize];
            if self.forest.is_last(v) {
                arr.set(j, self.forest.document_of(v) as u64);
                j += 1;
            }
        }
        debug_assert_eq!(j, internal);
        arr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest_of(lines: &[&str]) -> BitForest {
        let nodes: u64 = lines.iter().map(|l| l.len() as u64 / 3).sum();
        let mut forest = BitForest::new(1, lines.len() as u64, nodes);
        forest.mark_document_start();
        for line in lines {
            forest.add(line).expect("valid input");
        }
        forest.seal_documents();
        forest
    }

    fn bit(words: &[u64], i: u64) -> bool {
        get_bit(words, i)
    }

    #[test]
    fn test_sorted_arrays_for_small_forest() {
        // Trees (A) and (B(C)(D)): sorted order is A, B, C, D; roots first
        // in parse order, then B's children grouped together.
        let mut builder = TbwtBuilder::new(forest_of(&["(A)", "(B(C)(D))"]));
        builder.sort(false).unwrap();

        let leaf = builder.leaf_bits();
        assert!(bit(&leaf, 0) && !bit(&leaf, 1) && bit(&leaf, 2) && bit(&leaf, 3));

        let last = builder.last_bits();
        // Position 0 forced to zero (root block), B at T-1 ends it
        assert!(!bit(&last, 0) && bit(&last, 1) && !bit(&last, 2) && bit(&last, 3));

        assert_eq!(builder.tbwt_internal(), b"B".to_vec());
        assert_eq!(builder.tbwt_leaf(), b"ACD".to_vec());

        let (c, f) = builder.count_and_f();
        assert_eq!(c[0], 2);
        assert_eq!(c[b'B' as usize], 1);
        assert_eq!(f[b'B' as usize], 2);
        assert_eq!(f[b'B' as usize + 1], 4);
    }

    #[test]
    fn test_identical_chains_interleave() {
        // Two copies of (X(Y(Z))): sorted as X X Y Y Z Z, ties in tree order
        let mut builder = TbwtBuilder::new(forest_of(&["(X(Y(Z)))", "(X(Y(Z)))"]));
        builder.sort(false).unwrap();
        assert_eq!(builder.tbwt_internal(), b"XXYY".to_vec());
        assert_eq!(builder.tbwt_leaf(), b"ZZ".to_vec());
        let (_, f) = builder.count_and_f();
        assert_eq!(f[b'X' as usize], 2);
        assert_eq!(f[b'Y' as usize], 4);
        assert_eq!(f[b'Y' as usize + 1], 6);
    }

    #[test]
    fn test_deep_chain_sorts() {
        // Chain of depth 40 exercises several doubling passes
        let mut line = String::new();
        for i in 0..40 {
            line.push('(');
            line.push(char::from(b'A' + (i % 26) as u8));
        }
        line.push_str(&")".repeat(40));
        let mut builder = TbwtBuilder::new(forest_of(&[line.as_str()]));
        builder.sort(false).unwrap();
        // One leaf, 39 internal nodes
        assert_eq!(builder.tbwt_leaf().len(), 1);
        assert_eq!(builder.tbwt_internal().len(), 39);
    }

    #[test]
    fn test_all_roots_forest() {
        let mut builder = TbwtBuilder::new(forest_of(&["(A)", "(B)", "(C)"]));
        builder.sort(false).unwrap();
        let leaf = builder.leaf_bits();
        assert!(bit(&leaf, 0) && bit(&leaf, 1) && bit(&leaf, 2));
        let last = builder.last_bits();
        assert!(!bit(&last, 0) && !bit(&last, 1) && bit(&last, 2));
        assert!(builder.tbwt_internal().is_empty());
        assert_eq!(builder.tbwt_leaf(), b"ABC".to_vec());
    }
}
