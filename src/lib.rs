//! Crate root: lightweight module orchestration and public re-exports.
//!
//! A compressed, self-indexed representation of forests of ordinal labeled
//! trees (a tree Burrows–Wheeler transform), answering count, frequency and
//! subtree-enumeration queries against root-originating label paths.
//!
//! Modules:
//! - `forest`: bit-packed mutable forest built from parenthesized tree text.
//! - `builder`: path-doubling sort producing the TBWT arrays.
//! - `bitrank` / `wavelet` / `blockarray`: the succinct structures the
//!   index is made of.
//! - `index`: read-only navigation and query engine, framed save/load.
//! - `traverse`: path enumeration and subpath queries on top of the index.
//! - `io`: FASTA-style input reading (plain or gzip).
//! - `naive`: pointer-based reference forest for differential validation.
//! - `generator`: random forest text for tests and benchmarks.
//! - `byteset` / `error`: small shared pieces.
//!
//! Public API kept stable by re-exporting key items from the modules.

mod bits;

pub mod bitrank;
pub mod blockarray;
pub mod builder;
pub mod byteset;
pub mod error;
pub mod forest;
pub mod generator;
pub mod index;
pub mod io;
pub mod naive;
pub mod traverse;
pub mod wavelet;

// Re-export frequently used types & functions
pub use builder::TbwtBuilder;
pub use byteset::ByteSet;
pub use error::{IndexError, Result};
pub use forest::BitForest;
pub use index::{FreqMap, NodeRange, TbwtIndex};
pub use naive::NaiveForest;
