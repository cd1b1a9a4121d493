//! Build-phase helpers: set configuration and bulk loading from k-mer lists.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::encode::{SymbolPolicy, check_k};
use crate::error::{KmerError, Result, invalid};
use crate::hash::HashPolicy;
use crate::set::{InsertMode, KmerSet};

/// Per-set configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetConfig {
    symbol_policy: SymbolPolicy,
    insert_mode: InsertMode,
    hash_policy: HashPolicy,
}

impl SetConfig {
    /// Treatment of non-ACGT bytes (default: strict).
    pub fn with_symbol_policy(mut self, p: SymbolPolicy) -> Self {
        self.symbol_policy = p;
        self
    }
    /// Duplicate handling on insert (default: dedup).
    pub fn with_insert_mode(mut self, m: InsertMode) -> Self {
        self.insert_mode = m;
        self
    }
    /// Home-slot hashing (default: avalanche mix).
    pub fn with_hash_policy(mut self, h: HashPolicy) -> Self {
        self.hash_policy = h;
        self
    }
    /// Legacy table behaviour: unknown symbols alias to `A` and duplicates
    /// take their own slot.
    pub fn legacy() -> Self {
        Self::default()
            .with_symbol_policy(SymbolPolicy::Legacy)
            .with_insert_mode(InsertMode::Bag)
    }

    pub fn symbol_policy(&self) -> SymbolPolicy {
        self.symbol_policy
    }
    pub fn insert_mode(&self) -> InsertMode {
        self.insert_mode
    }
    pub fn hash_policy(&self) -> HashPolicy {
        self.hash_policy
    }
}

/// Parse a k-mer list, one k-mer per line. Blank lines are skipped and
/// surrounding whitespace is trimmed. `k` is taken from the first k-mer.
pub fn read_kmer_list<R: BufRead>(reader: R) -> Result<(usize, Vec<String>)> {
    let mut k = 0usize;
    let mut kmers = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let kmer = line.trim();
        if kmer.is_empty() {
            continue;
        }
        if k == 0 {
            k = kmer.len();
            check_k(k)?;
        } else if kmer.len() != k {
            return invalid(format!(
                "line {}: k-mer length {} differs from k={k}",
                lineno + 1,
                kmer.len()
            ));
        }
        kmers.push(kmer.to_owned());
    }
    if kmers.is_empty() {
        return invalid("k-mer list is empty");
    }
    Ok((k, kmers))
}

/// Build a set of length-`k` k-mers sized for `expected_count` entries.
pub fn build_kmer_set<I, S>(
    k: usize,
    expected_count: usize,
    kmers: I,
    cfg: &SetConfig,
) -> Result<KmerSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut set = KmerSet::with_config(k, expected_count, cfg)?;
    let mut inserted = 0usize;
    let mut seen = 0usize;
    for kmer in kmers {
        seen += 1;
        if set.insert(kmer.as_ref())? {
            inserted += 1;
        }
    }
    let dropped = seen - inserted;
    if dropped > 0 {
        log::debug!("{dropped} of {seen} k-mers were duplicates or skipped");
    }
    Ok(set)
}

/// Build a set from a k-mer list file. The list is read in full first so the
/// table can be sized from its line count.
pub fn build_kmer_set_from_path(path: &Path, cfg: &SetConfig) -> Result<KmerSet> {
    let reader = BufReader::new(File::open(path)?);
    let (k, kmers) = read_kmer_list(reader)?;
    log::info!("Found {} {k}-mers in {}", kmers.len(), path.display());
    let set = build_kmer_set(k, kmers.len(), &kmers, cfg)?;
    log::info!(
        "Loaded {} {k}-mers into {} slots (load {:.2})",
        set.len(),
        set.capacity(),
        set.load_factor()
    );
    if set.is_empty() {
        log::warn!("no usable k-mers in {}", path.display());
    }
    Ok(set)
}

/// Build the haplotype A and B sets concurrently. Both lists must share `k`.
pub fn build_haplotype_sets(
    path_a: &Path,
    path_b: &Path,
    cfg: &SetConfig,
) -> Result<(KmerSet, KmerSet)> {
    let (a, b) = rayon::join(
        || build_kmer_set_from_path(path_a, cfg),
        || build_kmer_set_from_path(path_b, cfg),
    );
    let (a, b) = (a?, b?);
    if a.k() != b.k() {
        return Err(KmerError::InvalidArgument(format!(
            "haplotype k-mer lengths differ: {} vs {}",
            a.k(),
            b.k()
        )));
    }
    Ok((a, b))
}
