//! Random forest text generator for benchmarks and differential tests.

use std::io::{self, Write};

use rand::Rng;

/// One random tree with exactly `size` nodes in the parenthesized
/// encoding. Shape is decided by a coin flip per step: either close the
/// current node or open a child under it.
pub fn random_tree<R: Rng>(rng: &mut R, size: u64) -> String {
    let mut out = String::with_capacity(size as usize * 3);
    out.push('(');
    out.push(char::from(rng.gen_range(b'A'..b'I')));
    let mut depth = 1u64;
    let mut remaining = size.saturating_sub(1);
    while remaining > 0 {
        if depth > 1 && rng.gen_bool(0.5) {
            out.push(')');
            depth -= 1;
        } else {
            out.push('(');
            out.push(char::from(rng.gen_range(b'A'..b'I')));
            depth += 1;
            remaining -= 1;
        }
    }
    for _ in 0..depth {
        out.push(')');
    }
    out
}

/// FASTA-style forest: `entries` documents, each holding `size` trees of
/// `size` nodes.
pub fn write_random_forest<R: Rng, W: Write>(
    rng: &mut R,
    out: &mut W,
    entries: u32,
    size: u64,
) -> io::Result<()> {
    for entry in 0..entries {
        writeln!(out, ">{entry}")?;
        for _ in 0..size {
            writeln!(out, "{}", random_tree(rng, size))?;
        }
    }
    Ok(())
}
