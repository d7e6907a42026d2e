use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::BufWriter;
use std::process;
use tree_path_index::generator::write_random_forest;

/// Generate a random forest file on stdout.
///
/// Each document holds `size` trees of `size` nodes.
#[derive(Parser, Debug)]
#[command(name = "generate", version, about = "Generate a random forest file")]
struct Args {
    /// Trees per document and nodes per tree
    size: u64,

    /// Number of documents
    entries: u32,

    /// Seed for reproducible output (default: random)
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,
}

fn main() {
    let args = Args::parse();
    if args.size == 0 {
        eprintln!("generate: size must be at least 1");
        process::exit(1);
    }
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if let Err(e) = write_random_forest(&mut rng, &mut out, args.entries, args.size) {
        eprintln!("generate: {e}");
        process::exit(2);
    }
}
