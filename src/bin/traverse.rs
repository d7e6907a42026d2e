use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tree_path_index::TbwtIndex;
use tree_path_index::traverse::{TraverseOptions, traverse_all};

/// Enumerate every root-originating path of an indexed forest.
///
/// Prints one line per path: the path itself, then per-document occurrence
/// counts as `doc:count` pairs.
#[derive(Parser, Debug)]
#[command(name = "traverse", version, about = "List all paths of a TBWT index")]
struct Args {
    /// Index file built with 'builder' (stem or full .tbwt path)
    index: PathBuf,

    /// Minimum path length in the result set
    #[arg(short = 'm', long = "min", default_value_t = 1)]
    min: usize,

    /// Maximum path length in the result set
    #[arg(long = "max")]
    max: Option<usize>,

    /// Print progress information
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let index = match TbwtIndex::open(&args.index) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("traverse: {e}");
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

    let opts = TraverseOptions {
        min_length: args.min,
        max_length: args.max.unwrap_or(usize::MAX),
        verbose: args.verbose,
    };
    let t0 = Instant::now();
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let stats = match traverse_all(&index, &opts, &mut out) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("traverse: {e}");
            process::exit(2);
        }
    };
    if let Err(e) = out.flush() {
        eprintln!("traverse: {e}");
        process::exit(2);
    }
    if args.verbose {
        eprintln!(
            "Traverse complete: {} groups visited, {} occurrences, {:.3}s",
            stats.traversed,
            stats.total_occurrences,
            t0.elapsed().as_secs_f64()
        );
    }
}
