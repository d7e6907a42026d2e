use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tree_path_index::traverse::{subpath_count, subpath_freq, subpath_subtree};
use tree_path_index::{TbwtIndex, io};

/// Replay query patterns against a TBWT index and print timings.
///
/// Patterns are the first whitespace-separated token of each line in a
/// result file produced by 'traverse'.
#[derive(Parser, Debug)]
#[command(name = "queries", version, about = "Replay subpath queries against a TBWT index")]
struct Args {
    /// Index file built with 'builder' (stem or full .tbwt path)
    index: PathBuf,

    /// Result file produced by 'traverse'
    results: PathBuf,

    /// Minimum pattern length replayed
    #[arg(short = 'm', long = "min", default_value_t = 1)]
    min: usize,

    /// Maximum pattern length replayed
    #[arg(long = "max")]
    max: Option<usize>,

    /// Replay at most this many patterns per phase
    #[arg(short = 'n', long = "nqueries")]
    nqueries: Option<usize>,

    /// Restrict the subtree phase to patterns of exactly this length
    #[arg(short = 'k', long = "patlen")]
    patlen: Option<usize>,

    /// Print progress information
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn report(phase: &str, queries: usize, occurrences: u64, elapsed: f64) {
    let rate = if elapsed > 0.0 { queries as f64 / elapsed } else { f64::INFINITY };
    eprintln!(
        "{phase}: {queries} queries, {occurrences} occurrences, {elapsed:.3}s ({rate:.0} queries/s)"
    );
}

fn main() {
    let args = Args::parse();

    let index = match TbwtIndex::open(&args.index) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("queries: {e}");
            process::exit(1);
        }
    };
    if args.verbose {
        eprintln!(
            "Loaded index: {} documents, {} trees, {} nodes",
            index.number_of_documents(),
            index.number_of_trees(),
            index.number_of_nodes()
        );
    }

    let max = args.max.unwrap_or(usize::MAX);
    let limit = args.nqueries.unwrap_or(usize::MAX);
    let patterns: Vec<Vec<u8>> = match io::open_input(&args.results) {
        Ok(input) => {
            use std::io::BufRead;
            let mut patterns = Vec::new();
            for line in input.lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        eprintln!("queries: failed to read {:?}: {e}", args.results);
                        process::exit(1);
                    }
                };
                let token = line.split_whitespace().next().unwrap_or("");
                if token.len() >= args.min && token.len() <= max {
                    patterns.push(token.as_bytes().to_vec());
                }
            }
            patterns
        }
        Err(e) => {
            eprintln!("queries: unable to read result file {:?}: {e}", args.results);
            process::exit(1);
        }
    };

    let t0 = Instant::now();
    let mut occurrences = 0u64;
    let mut count = 0usize;
    for pattern in patterns.iter().take(limit) {
        occurrences += subpath_count(&index, pattern);
        count += 1;
    }
    report("subpath_count", count, occurrences, t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    occurrences = 0;
    count = 0;
    for pattern in patterns.iter().take(limit) {
        occurrences +=
            subpath_freq(&index, pattern).values().map(|&c| c as u64).sum::<u64>();
        count += 1;
    }
    report("subpath_freq", count, occurrences, t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    occurrences = 0;
    count = 0;
    for pattern in patterns
        .iter()
        .filter(|p| args.patlen.is_none_or(|k| p.len() == k))
        .take(limit)
    {
        occurrences += subpath_subtree(&index, pattern);
        count += 1;
    }
    report("subpath_subtree", count, occurrences, t2.elapsed().as_secs_f64());
}
