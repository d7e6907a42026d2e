//! Path enumeration and root-originating subpath queries.
//!
//! # Overview
//! The index never materializes trees; every question is asked of node
//! ranges. Enumeration starts from the roots' range and repeatedly splits a
//! range by the labels branching below it: internal continuations recurse
//! through `subtree_for_symbol`, leaf continuations are emitted directly.
//! A leaf and an internal node may branch with the same symbol, in which
//! case the leaf occurrences are folded into the subtree's own output line.
//!
//! Output format, one line per visited path within the length window:
//! `p d1:c1 d2:c2 …` with document ids ascending.

use std::io::{self, Write};

use itertools::Itertools;

use crate::index::{FreqMap, NodeRange, TbwtIndex};

pub struct TraverseOptions {
    /// Minimum path length reported.
    pub min_length: usize,
    /// Maximum path length reported.
    pub max_length: usize,
    pub verbose: bool,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        TraverseOptions { min_length: 1, max_length: usize::MAX, verbose: false }
    }
}

#[derive(Debug, Default)]
pub struct TraverseStats {
    /// Sibling groups visited.
    pub traversed: u64,
    /// Sum of all reported per-document counts.
    pub total_occurrences: u64,
}

fn output<W: Write>(
    path: &[u8],
    freq: &FreqMap,
    stats: &mut TraverseStats,
    out: &mut W,
) -> io::Result<()> {
    out.write_all(path)?;
    if !freq.is_empty() {
        let pairs = freq.iter().map(|(doc, count)| format!("{doc}:{count}")).join(" ");
        write!(out, " {pairs}")?;
    }
    writeln!(out)?;
    stats.total_occurrences += freq.values().map(|&c| c as u64).sum::<u64>();
    Ok(())
}

fn merge_into(to: &mut FreqMap, from: FreqMap) {
    for (doc, count) in from {
        *to.entry(doc).or_insert(0) += count;
    }
}

fn traverse_subtree<W: Write>(
    index: &TbwtIndex,
    range: NodeRange,
    leaf_freq: FreqMap,
    path: &mut Vec<u8>,
    opts: &TraverseOptions,
    stats: &mut TraverseStats,
    out: &mut W,
) -> io::Result<()> {
    stats.traversed += index.subtree_size(range);
    if opts.verbose && stats.traversed % 10_000 == 0 {
        eprintln!(
            "traverse: {} groups of {} visited",
            stats.traversed,
            index.number_of_nodes() - index.number_of_leaves() + 1
        );
    }

    let subtrees = index.labels_in_subtree(range);
    let mut leaves = index.labels_of_leaves(range);

    for c in subtrees.iter() {
        path.push(c);
        if leaves.contains(c) {
            // Leaves branch here with the same symbol as a subtree; their
            // frequencies belong to the subtree's output line.
            leaves.remove(c);
            let lf = index.leaf_frequency(range, c);
            traverse_subtree(index, index.subtree_for_symbol(range, c), lf, path, opts, stats, out)?;
        } else {
            traverse_subtree(
                index,
                index.subtree_for_symbol(range, c),
                FreqMap::new(),
                path,
                opts,
                stats,
                out,
            )?;
        }
        path.pop();
    }

    // Leaves with no same-symbol subtree end their paths right here.
    if path.len() + 1 >= opts.min_length && path.len() + 1 <= opts.max_length {
        for c in leaves.iter() {
            path.push(c);
            output(path, &index.leaf_frequency(range, c), stats, out)?;
            path.pop();
        }
    }

    let mut freq =
        if range.0 != 0 { index.internal_frequency(range) } else { FreqMap::new() };
    merge_into(&mut freq, leaf_freq);

    if path.len() >= opts.min_length && path.len() <= opts.max_length {
        output(path, &freq, stats, out)?;
    }
    Ok(())
}

/// Enumerates every root-originating path of the forest, writing one line
/// per path within the configured length window.
pub fn traverse_all<W: Write>(
    index: &TbwtIndex,
    opts: &TraverseOptions,
    out: &mut W,
) -> io::Result<TraverseStats> {
    let root = (0, index.number_of_trees() - 1);
    let mut stats = TraverseStats::default();
    let mut path = Vec::new();
    traverse_subtree(index, root, FreqMap::new(), &mut path, opts, &mut stats, out)?;
    Ok(stats)
}

/// Walks the range chain for `pattern`, stopping one step early so the last
/// symbol can be matched against both leaves and internal nodes.
fn range_before_last(index: &TbwtIndex, pattern: &[u8]) -> Option<NodeRange> {
    let mut range = (0, index.number_of_trees() - 1);
    for &c in &pattern[..pattern.len() - 1] {
        range = index.subtree_for_symbol(range, c);
        if range.1 < range.0 {
            return None;
        }
    }
    Some(range)
}

/// Number of nodes whose root-to-node label sequence equals `pattern`.
pub fn subpath_count(index: &TbwtIndex, pattern: &[u8]) -> u64 {
    let Some(range) = (!pattern.is_empty()).then(|| range_before_last(index, pattern)).flatten()
    else {
        return 0;
    };
    let last = pattern[pattern.len() - 1];
    let leaf_matches = index.leaf_count(range, last);
    let range = index.subtree_for_symbol(range, last);
    index.internal_count(range) + leaf_matches
}

/// Per-document counts of nodes whose root-to-node label sequence equals
/// `pattern`.
pub fn subpath_freq(index: &TbwtIndex, pattern: &[u8]) -> FreqMap {
    let Some(range) = (!pattern.is_empty()).then(|| range_before_last(index, pattern)).flatten()
    else {
        return FreqMap::new();
    };
    let last = pattern[pattern.len() - 1];
    let mut result = index.leaf_frequency(range, last);
    let range = index.subtree_for_symbol(range, last);
    if range.0 <= range.1 {
        merge_into(&mut result, index.internal_frequency(range));
    }
    result
}

fn subtree_leaves(index: &TbwtIndex, range: NodeRange) -> u64 {
    let mut leaves = 0;
    for c in index.labels_in_subtree(range).iter() {
        leaves += subtree_leaves(index, index.subtree_for_symbol(range, c));
    }
    leaves + index.total_leaf_count(range)
}

/// Number of leaves in the subtrees rooted at nodes matching `pattern`.
pub fn subpath_subtree(index: &TbwtIndex, pattern: &[u8]) -> u64 {
    let Some(range) = (!pattern.is_empty()).then(|| range_before_last(index, pattern)).flatten()
    else {
        return 0;
    };
    let last = pattern[pattern.len() - 1];
    let leaf_matches = index.leaf_count(range, last);
    let range = index.subtree_for_symbol(range, last);
    if range.0 <= range.1 { subtree_leaves(index, range) + leaf_matches } else { leaf_matches }
}
