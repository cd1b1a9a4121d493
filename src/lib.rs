//! Canonical k-mer hash sets for trio binning of sequencing reads.
//!
//! - 2-bit LSB-first k-mer keys (k <= 32), canonicalized against strand
//! - Fixed-capacity open-addressing table with linear probing and an
//!   xor-shift-multiply home-slot hash
//! - Strict, legacy (alias to `A`) or skipping treatment of non-ACGT symbols
//! - Rolling window counting of a read against one or more sets
//! - Parallel FASTA/FASTQ binning into haplotype A, B or unassigned
//!
//! A [`KmerSet`] is built once and is read-only afterwards; a shared
//! reference can be queried from any number of threads.

mod builder;
pub mod classify;
pub mod encode;
mod error;
pub mod hash;
mod set;

pub use builder::{
    SetConfig, build_haplotype_sets, build_kmer_set, build_kmer_set_from_path, read_kmer_list,
};
pub use classify::{
    BinWriter, Classification, ClassifyConfig, ClassifySummary, FastxRecord, Haplotype,
    HaplotypeClassifier, OutputFormat, classify_fastx, classify_fastx_reader, count_matches,
    scaling_factors, write_summary_line,
};
pub use encode::{
    MAX_K, SymbolPolicy, canonical_key, decode_kmer, encode, reverse_complement,
    reverse_complement_into,
};
pub use error::{KmerError, Result};
pub use hash::HashPolicy;
pub use set::{InsertMode, KmerSet, capacity_for};
