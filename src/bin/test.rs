use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tree_path_index::naive::compare_with_index;
use tree_path_index::{TbwtIndex, io};

/// Validate an index against the forest file it was built from.
///
/// Re-parses the forest into a naive pointer representation and DFS-compares
/// every node against the index. Exits 0 on a full match.
#[derive(Parser, Debug)]
#[command(name = "test", version, about = "Compare a TBWT index against its source forest")]
struct Args {
    /// Forest file the index was built from (FASTA-style; .gz accepted)
    fasta: PathBuf,

    /// Index file built with 'builder' (stem or full .tbwt path)
    index: PathBuf,

    /// Print progress information
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let t0 = Instant::now();

    let naive = match io::open_input(&args.fasta).map_err(Into::into).and_then(io::parse_naive) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("test: {e}");
            process::exit(1);
        }
    };
    if args.verbose {
        eprintln!(
            "Parsed {} trees, {} nodes, {} leaves",
            naive.number_of_trees(),
            naive.number_of_nodes(),
            naive.number_of_leaves()
        );
    }

    let index = match TbwtIndex::open(&args.index) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("test: {e}");
            process::exit(1);
        }
    };

    if let Err(mismatch) = compare_with_index(&naive, &index) {
        eprintln!("test: MISMATCH: {mismatch}");
        process::exit(1);
    }
    eprintln!("Test complete ({:.3}s)", t0.elapsed().as_secs_f64());
}
