//! Pointer-per-node forest used to validate the compressed index.
//!
//! Keeps the full parent/child/sibling structure in plain vectors so a DFS
//! can be compared node-by-node against the index's navigation. Memory is
//! no concern here; being obviously correct is.

use crate::error::{IndexError, Result};
use crate::index::TbwtIndex;

pub struct NaiveNode {
    pub parent: Option<u32>,
    pub first_child: Option<u32>,
    pub next_sibling: Option<u32>,
    pub label: u8,
    pub document: u32,
}

#[derive(Default)]
pub struct NaiveForest {
    nodes: Vec<NaiveNode>,
    roots: Vec<u32>,
    leaves: u64,
    height: u32,
}

impl NaiveForest {
    pub fn new() -> Self {
        NaiveForest::default()
    }

    pub fn number_of_nodes(&self) -> u64 {
        self.nodes.len() as u64
    }

    pub fn number_of_trees(&self) -> u64 {
        self.roots.len() as u64
    }

    pub fn number_of_leaves(&self) -> u64 {
        self.leaves
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn roots(&self) -> &[u32] {
        &self.roots
    }

    pub fn label(&self, n: u32) -> u8 {
        self.nodes[n as usize].label
    }

    pub fn document(&self, n: u32) -> u32 {
        self.nodes[n as usize].document
    }

    pub fn is_root(&self, n: u32) -> bool {
        self.nodes[n as usize].parent.is_none()
    }

    pub fn is_leaf(&self, n: u32) -> bool {
        self.nodes[n as usize].first_child.is_none()
    }

    pub fn is_last(&self, n: u32) -> bool {
        self.nodes[n as usize].next_sibling.is_none()
    }

    pub fn first_child(&self, n: u32) -> Option<u32> {
        self.nodes[n as usize].first_child
    }

    pub fn next_sibling(&self, n: u32) -> Option<u32> {
        self.nodes[n as usize].next_sibling
    }

    /// Parses one tree line into linked nodes, ids in DFS order.
    pub fn add(&mut self, line: &str, document: u32) -> Result<()> {
        let bp = line.as_bytes();
        if bp.is_empty() {
            return Err(IndexError::InvalidTree("empty tree line".into()));
        }
        // Stack frames: (open node, its most recently closed child)
        let mut stack: Vec<(u32, Option<u32>)> = Vec::new();
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
                    let id = self.nodes.len() as u32;
                    let parent = stack.last().map(|&(p, _)| p);
                    self.nodes.push(NaiveNode {
                        parent,
                        first_child: None,
                        next_sibling: None,
                        label,
                        document,
                    });
                    match stack.last_mut() {
                        Some((p, last_child)) => {
                            match *last_child {
                                Some(prev) => self.nodes[prev as usize].next_sibling = Some(id),
                                None => self.nodes[*p as usize].first_child = Some(id),
                            }
                            *last_child = Some(id);
                        }
                        None => self.roots.push(id),
                    }
                    stack.push((id, None));
                    if stack.len() as u32 > self.height {
                        self.height = stack.len() as u32;
                    }
                    i += 2;
                    match bp.get(i).copied() {
                        Some(b'(') | Some(b')') => {}
                        _ => {
                            return Err(IndexError::InvalidTree(format!(
                                "expecting '(' or ')' at {i} in: {line}"
                            )));
                        }
                    }
                }
                b')' => {
                    let (id, _) = stack.pop().ok_or_else(|| {
                        IndexError::InvalidTree(format!("unbalanced ')' at {i} in: {line}"))
                    })?;
                    if self.nodes[id as usize].first_child.is_none() {
                        self.leaves += 1;
                    }
                    i += 1;
                    match bp.get(i).copied() {
                        Some(b'(') if stack.is_empty() => {
                            return Err(IndexError::InvalidTree(format!(
                                "more than one tree on a line: {line}"
                            )));
                        }
                        Some(b'(') | Some(b')') | None => {}
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

/// DFS-compares every node of the naive forest against the index, in the
/// index's child order (which must equal the original sibling order).
/// Returns a description of the first mismatch.
pub fn compare_with_index(
    naive: &NaiveForest,
    index: &TbwtIndex,
) -> std::result::Result<(), String> {
    if index.number_of_trees() != naive.number_of_trees() {
        return Err(format!(
            "tree counts differ: index {} vs naive {}",
            index.number_of_trees(),
            naive.number_of_trees()
        ));
    }
    if index.number_of_nodes() != naive.number_of_nodes() {
        return Err(format!(
            "node counts differ: index {} vs naive {}",
            index.number_of_nodes(),
            naive.number_of_nodes()
        ));
    }
    if index.number_of_leaves() != naive.number_of_leaves() {
        return Err(format!(
            "leaf counts differ: index {} vs naive {}",
            index.number_of_leaves(),
            naive.number_of_leaves()
        ));
    }
    for (tree, &root) in naive.roots().iter().enumerate() {
        compare_node(naive, index, index.get_root(tree as u64), root)?;
    }
    Ok(())
}

fn compare_node(
    naive: &NaiveForest,
    index: &TbwtIndex,
    vi: u64,
    vn: u32,
) -> std::result::Result<(), String> {
    if index.is_root(vi) != naive.is_root(vn) {
        return Err(format!("root flag differs at index node {vi} / naive node {vn}"));
    }
    if index.is_leaf(vi) != naive.is_leaf(vn) {
        return Err(format!("leaf flag differs at index node {vi} / naive node {vn}"));
    }
    if index.label(vi) != naive.label(vn) {
        return Err(format!(
            "label differs at index node {vi} / naive node {vn}: {} vs {}",
            index.label(vi) as char,
            naive.label(vn) as char
        ));
    }
    if !index.is_leaf(vi) {
        let (lo, hi) = index.children(vi);
        let mut child = naive.first_child(vn);
        for i in lo..=hi {
            let Some(c) = child else {
                return Err(format!("index node {vi} has more children than naive node {vn}"));
            };
            compare_node(naive, index, i, c)?;
            child = naive.next_sibling(c);
        }
        if child.is_some() {
            return Err(format!("naive node {vn} has more children than index node {vi}"));
        }
    }
    Ok(())
}
