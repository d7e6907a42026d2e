use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tree_path_index::{TbwtIndex, io};

/// Build a compressed TBWT index from a FASTA-style forest file.
#[derive(Parser, Debug)]
#[command(name = "builder", version, about = "Build a TBWT index from a forest file")]
struct Args {
    /// Input forest file (FASTA-style; .gz accepted)
    input: PathBuf,

    /// Output stem; the index is written to <output>.tbwt (default: <input>.tbwt)
    output: Option<PathBuf>,

    /// Print progress information
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let t0 = Instant::now();
    let forest = match io::read_forest(&args.input, args.verbose) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("builder: {e}");
            process::exit(1);
        }
    };
    log_if(
        args.verbose,
        format!(
            "Parsed {} nodes, {} leaves, height {} in {:.3}s",
            forest.number_of_nodes(),
            forest.number_of_leaves(),
            forest.height(),
            t0.elapsed().as_secs_f64()
        ),
    );

    let t1 = Instant::now();
    let index = match TbwtIndex::build(forest, args.verbose) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("builder: {e}");
            process::exit(2);
        }
    };
    log_if(args.verbose, format!("Built index in {:.3}s", t1.elapsed().as_secs_f64()));

    let mut output = args.output.unwrap_or_else(|| args.input.clone()).into_os_string();
    output.push(".tbwt");
    let output = PathBuf::from(output);

    let t2 = Instant::now();
    if let Err(e) = index.save(&output) {
        eprintln!("builder: failed to write {output:?}: {e}");
        process::exit(3);
    }
    log_if(
        args.verbose,
        format!("Saved {} in {:.3}s", output.display(), t2.elapsed().as_secs_f64()),
    );
}

fn log_if(show: bool, msg: String) {
    if show {
        eprintln!("{}", msg);
    }
}
