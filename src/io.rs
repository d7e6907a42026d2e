//! Reading FASTA-style forest files.
//!
//! A file is a stream of documents: `> title` header lines, each followed by
//! one tree per line in the parenthesized encoding. Reading is two passes:
//! a counting pass sizes the bit-packed forest exactly (every node costs
//! three bytes on its line), then a parsing pass fills it. Files ending in
//! `.gz` are decompressed transparently; gzip streams cannot seek, so each
//! pass reopens the file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{IndexError, Result};
use crate::forest::BitForest;
use crate::naive::NaiveForest;

/// Sizes gathered by the counting pass.
#[derive(Clone, Copy, Debug)]
pub struct InputStats {
    pub documents: u32,
    pub trees: u64,
    pub nodes: u64,
}

/// Opens a forest file, decompressing when the name ends in `.gz`.
pub fn open_input(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Counting pass: documents, trees and nodes, with row validity checks.
pub fn count_input<R: BufRead>(input: R) -> Result<InputStats> {
    let mut stats = InputStats { documents: 0, trees: 0, nodes: 0 };
    for line in input.lines() {
        let line = line?;
        if line.starts_with('>') {
            stats.documents += 1;
        } else {
            if stats.documents == 0 {
                return Err(IndexError::InvalidTree(
                    "tree line before any document header".into(),
                ));
            }
            if line.is_empty() || line.len() % 3 != 0 {
                return Err(IndexError::InvalidTree(format!("invalid input row length: {line}")));
            }
            stats.trees += 1;
            stats.nodes += line.len() as u64 / 3;
        }
    }
    Ok(stats)
}

/// Parsing pass: fills a [`BitForest`] sized by `stats` and seals the
/// document marks.
pub fn parse_forest<R: BufRead>(input: R, stats: InputStats, verbose: bool) -> Result<BitForest> {
    if stats.nodes >= u32::MAX as u64 {
        return Err(IndexError::TooManyNodes(stats.nodes));
    }
    let mut forest = BitForest::new(stats.documents, stats.trees, stats.nodes);
    let mut documents = 0u32;
    for line in input.lines() {
        let line = line?;
        if let Some(title) = line.strip_prefix('>') {
            forest.mark_document_start();
            documents += 1;
            if verbose && documents % 1000 == 0 {
                eprintln!("io: inserting document {documents}: {title}");
            }
        } else {
            forest.add(&line)?;
        }
    }
    if forest.parsed_nodes() != stats.nodes {
        return Err(IndexError::InvalidTree("input changed between passes".into()));
    }
    forest.seal_documents();
    Ok(forest)
}

/// Counting pass plus parsing pass over a file.
pub fn read_forest(path: &Path, verbose: bool) -> Result<BitForest> {
    let stats = count_input(open_input(path)?)?;
    if verbose {
        eprintln!(
            "io: {} documents, {} trees, {} nodes",
            stats.documents, stats.trees, stats.nodes
        );
    }
    parse_forest(open_input(path)?, stats, verbose)
}

/// Single-pass read into the validation forest.
pub fn parse_naive<R: BufRead>(input: R) -> Result<NaiveForest> {
    let mut naive = NaiveForest::new();
    let mut documents = 0u32;
    for line in input.lines() {
        let line = line?;
        if line.starts_with('>') {
            documents += 1;
        } else {
            if documents == 0 {
                return Err(IndexError::InvalidTree(
                    "tree line before any document header".into(),
                ));
            }
            naive.add(&line, documents - 1)?;
        }
    }
    Ok(naive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TbwtIndex;
    use crate::naive::compare_with_index;
    use crate::traverse::{subpath_count, subpath_freq};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    const SMALL: &str = ">d0\n(A)\n(B(C)(D))\n>d1\n(X(Y(Z)))\n";

    #[test]
    fn test_count_pass() {
        let stats = count_input(Cursor::new(SMALL)).unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.trees, 3);
        assert_eq!(stats.nodes, 7);
    }

    #[test]
    fn test_count_rejects_bad_rows() {
        assert!(count_input(Cursor::new(">d\n(A)x\n")).is_err());
        assert!(count_input(Cursor::new(">d\n\n")).is_err());
        assert!(count_input(Cursor::new("(A)\n")).is_err());
    }

    #[test]
    fn test_parse_pass_documents() {
        let stats = count_input(Cursor::new(SMALL)).unwrap();
        let forest = parse_forest(Cursor::new(SMALL), stats, false).unwrap();
        assert_eq!(forest.parsed_nodes(), 7);
        assert_eq!(forest.document_of(0), 0);
        assert_eq!(forest.document_of(3), 0);
        assert_eq!(forest.document_of(4), 1);
    }

    #[test]
    fn test_end_to_end_queries() {
        let stats = count_input(Cursor::new(SMALL)).unwrap();
        let forest = parse_forest(Cursor::new(SMALL), stats, false).unwrap();
        let index = TbwtIndex::build(forest, false).unwrap();
        assert_eq!(subpath_count(&index, b"B"), 1);
        assert_eq!(subpath_count(&index, b"BC"), 1);
        let freq = subpath_freq(&index, b"XY");
        assert_eq!(freq.get(&1), Some(&1));
    }

    /// The differential law: naive traversal and indexed traversal agree at
    /// every node of a generated forest.
    #[test]
    fn test_differential_random_forest() {
        let mut text = Vec::new();
        let mut rng = StdRng::seed_from_u64(0xF0BE57);
        crate::generator::write_random_forest(&mut rng, &mut text, 10, 30).unwrap();

        let stats = count_input(Cursor::new(&text)).unwrap();
        assert_eq!(stats.documents, 10);
        assert_eq!(stats.trees, 300);
        let forest = parse_forest(Cursor::new(&text), stats, false).unwrap();
        let naive = parse_naive(Cursor::new(&text)).unwrap();
        let index = TbwtIndex::build(forest, false).unwrap();
        compare_with_index(&naive, &index).unwrap();
    }

    #[test]
    fn test_gzip_input() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.txt.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(SMALL.as_bytes()).unwrap();
        enc.finish().unwrap();

        let forest = read_forest(&path, false).unwrap();
        assert_eq!(forest.parsed_nodes(), 7);
        assert_eq!(forest.number_of_trees(), 3);
    }
}
