//! Query side: window counting, haplotype scoring and batch classification
//! of FASTA/FASTQ reads.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use needletail::parser::LineEnding;
use rayon::prelude::*;

use crate::encode::{SymbolPolicy, key_mask, map_base};
use crate::error::{KmerError, Result, invalid};
use crate::set::KmerSet;

/// Count, for every set, how many length-`k` windows of `read` it contains.
///
/// Windows start at offsets `0..=read.len() - k`; a read shorter than `k`
/// yields all zeros. All sets must share `k` and symbol policy. Forward and
/// reverse-complement keys are rolled so each window costs O(1) to encode.
pub fn count_matches(read: &[u8], sets: &[&KmerSet]) -> Result<Vec<u32>> {
    let Some(first) = sets.first() else {
        return Ok(Vec::new());
    };
    let k = first.k();
    let policy = first.symbol_policy();
    for s in &sets[1..] {
        if s.k() != k || s.symbol_policy() != policy {
            return invalid(format!(
                "sets disagree: k={k}/{policy:?} vs k={}/{:?}",
                s.k(),
                s.symbol_policy()
            ));
        }
    }

    let mut counts = vec![0u32; sets.len()];
    if read.len() < k {
        return Ok(counts);
    }

    let mask = key_mask(k);
    let top = 2 * (k - 1);
    let mut fwd = 0u64;
    let mut rc = 0u64;
    let mut filled = 0usize;

    for (i, &b) in read.iter().enumerate() {
        let v = match (map_base(b), policy) {
            (Some(v), _) => v as u64,
            (None, SymbolPolicy::Legacy) => 0,
            (None, SymbolPolicy::Skip) => {
                filled = 0;
                continue;
            }
            (None, SymbolPolicy::Strict) => {
                return Err(KmerError::MalformedSymbol {
                    symbol: b as char,
                    pos: i,
                });
            }
        };

        // new base enters the forward key at position k-1 and the
        // reverse-complement key at position 0
        fwd = (fwd >> 2) | (v << top);
        rc = ((rc << 2) | (v ^ 0b11)) & mask;
        filled += 1;

        if filled >= k {
            let key = fwd.min(rc);
            for (c, s) in counts.iter_mut().zip(sets) {
                if s.contains_key(key) {
                    *c += 1;
                }
            }
        }
    }
    Ok(counts)
}

/// Bin a read is assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Haplotype {
    A,
    B,
    /// Tied scores, including reads with no hits at all.
    Unassigned,
}

impl Haplotype {
    pub fn label(self) -> &'static str {
        match self {
            Haplotype::A => "A",
            Haplotype::B => "B",
            Haplotype::Unassigned => "U",
        }
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-haplotype multipliers that compensate for unequal set sizes:
/// `max(|A|, |B|) / |X|`. An empty set gets factor 0.
pub fn scaling_factors(a: &KmerSet, b: &KmerSet) -> (f64, f64) {
    let max = a.len().max(b.len()) as f64;
    let factor = |n: usize| if n == 0 { 0.0 } else { max / n as f64 };
    (factor(a.len()), factor(b.len()))
}

/// Outcome of classifying one read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub count_a: u32,
    pub count_b: u32,
    pub score_a: f64,
    pub score_b: f64,
    pub haplotype: Haplotype,
}

/// Two haplotype sets plus their precomputed scaling factors.
pub struct HaplotypeClassifier {
    a: KmerSet,
    b: KmerSet,
    scale_a: f64,
    scale_b: f64,
}

impl HaplotypeClassifier {
    pub fn new(a: KmerSet, b: KmerSet) -> Result<Self> {
        if a.k() != b.k() || a.symbol_policy() != b.symbol_policy() {
            return invalid("haplotype sets must share k and symbol policy");
        }
        let (scale_a, scale_b) = scaling_factors(&a, &b);
        log::debug!("scaling factors: A={scale_a:.4} B={scale_b:.4}");
        Ok(Self {
            a,
            b,
            scale_a,
            scale_b,
        })
    }

    pub fn k(&self) -> usize {
        self.a.k()
    }

    pub fn scaling_factors(&self) -> (f64, f64) {
        (self.scale_a, self.scale_b)
    }

    pub fn classify(&self, read: &[u8]) -> Result<Classification> {
        let counts = count_matches(read, &[&self.a, &self.b])?;
        let (count_a, count_b) = (counts[0], counts[1]);
        let score_a = count_a as f64 * self.scale_a;
        let score_b = count_b as f64 * self.scale_b;
        let haplotype = if score_a > score_b {
            Haplotype::A
        } else if score_b > score_a {
            Haplotype::B
        } else {
            Haplotype::Unassigned
        };
        Ok(Classification {
            count_a,
            count_b,
            score_a,
            score_b,
            haplotype,
        })
    }
}

/// Owned copy of a FASTA/FASTQ record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastxRecord {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl FastxRecord {
    /// Header up to the first whitespace.
    pub fn name(&self) -> &[u8] {
        self.id
            .split(|b| b.is_ascii_whitespace())
            .next()
            .unwrap_or(&[])
    }
}

/// Query-phase configuration.
#[derive(Clone, Debug)]
pub struct ClassifyConfig {
    batch_size: usize,
    threads: Option<usize>,
    gzip: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            batch_size: 16_384,
            threads: None,
            gzip: false,
        }
    }
}

impl ClassifyConfig {
    /// Records read and classified per parallel batch.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }
    /// Threads for each classify call made with this config. They come from
    /// a pool local to the call; the global rayon pool is left untouched.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }
    /// Gzip the binned output files.
    pub fn gzip(mut self, yes: bool) -> Self {
        self.gzip = yes;
        self
    }
    pub fn is_gzip(&self) -> bool {
        self.gzip
    }

    /// Run `op` on the pool this config selects: a fresh pool of
    /// `threads(n)` workers if set, otherwise the caller's current pool.
    pub fn install<R, OP>(&self, op: OP) -> Result<R>
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        Ok(match self.thread_pool()? {
            Some(pool) => pool.install(op),
            None => op(),
        })
    }

    fn thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        self.threads
            .map(|n| rayon::ThreadPoolBuilder::new().num_threads(n).build())
            .transpose()
            .map_err(KmerError::from)
    }
}

/// Reads per bin after a classification run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub reads_a: u64,
    pub reads_b: u64,
    pub reads_unassigned: u64,
}

impl ClassifySummary {
    fn record(&mut self, h: Haplotype) {
        match h {
            Haplotype::A => self.reads_a += 1,
            Haplotype::B => self.reads_b += 1,
            Haplotype::Unassigned => self.reads_unassigned += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.reads_a + self.reads_b + self.reads_unassigned
    }
}

/// Classify every record of a FASTA/FASTQ file (optionally gzipped).
pub fn classify_fastx<F>(
    path: &Path,
    classifier: &HaplotypeClassifier,
    cfg: &ClassifyConfig,
    sink: F,
) -> Result<ClassifySummary>
where
    F: FnMut(&FastxRecord, &Classification) -> Result<()>,
{
    let reader = needletail::parse_fastx_file(path)?;
    classify_records(reader, classifier, cfg, sink)
}

/// Like [`classify_fastx`] over any byte stream.
pub fn classify_fastx_reader<R, F>(
    input: R,
    classifier: &HaplotypeClassifier,
    cfg: &ClassifyConfig,
    sink: F,
) -> Result<ClassifySummary>
where
    R: Read + Send,
    F: FnMut(&FastxRecord, &Classification) -> Result<()>,
{
    let reader = needletail::parse_fastx_reader(input)?;
    classify_records(reader, classifier, cfg, sink)
}

fn classify_records<F>(
    mut reader: Box<dyn needletail::FastxReader + '_>,
    classifier: &HaplotypeClassifier,
    cfg: &ClassifyConfig,
    mut sink: F,
) -> Result<ClassifySummary>
where
    F: FnMut(&FastxRecord, &Classification) -> Result<()>,
{
    let pool = cfg.thread_pool()?;

    let mut summary = ClassifySummary::default();
    let mut batch_no = 0usize;
    loop {
        let mut block: Vec<FastxRecord> = Vec::with_capacity(cfg.batch_size);
        while block.len() < cfg.batch_size {
            let Some(item) = reader.next() else { break };
            let rec = item?;
            block.push(FastxRecord {
                id: rec.id().to_vec(),
                seq: rec.seq().into_owned(),
                qual: rec.qual().map(<[u8]>::to_vec),
            });
        }
        if block.is_empty() {
            break;
        }

        let run = || -> Vec<Result<Classification>> {
            block
                .par_iter()
                .map(|rec| classifier.classify(&rec.seq))
                .collect()
        };
        let results = match &pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        // results are consumed in input order
        for (rec, res) in block.iter().zip(results) {
            let c = res?;
            summary.record(c.haplotype);
            sink(rec, &c)?;
        }
        batch_no += 1;
        log::debug!("batch {batch_no}: {} reads classified", summary.total());
    }
    Ok(summary)
}

/// Record format of the binned outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Fasta,
    Fastq,
}

impl OutputFormat {
    /// Guess from the input file name, ignoring a trailing `.gz`.
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy().to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".fq") || name.ends_with(".fastq") {
            OutputFormat::Fastq
        } else {
            OutputFormat::Fasta
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Fasta => "fa",
            OutputFormat::Fastq => "fq",
        }
    }
}

enum BinOut {
    Plain(BufWriter<File>),
    Gz(GzEncoder<BufWriter<File>>),
}

impl BinOut {
    fn create(path: &Path, gzip: bool) -> Result<Self> {
        let w = BufWriter::new(File::create(path)?);
        Ok(if gzip {
            BinOut::Gz(GzEncoder::new(w, GzLevel::default()))
        } else {
            BinOut::Plain(w)
        })
    }

    fn finish(self) -> Result<()> {
        let mut w = match self {
            BinOut::Plain(w) => w,
            BinOut::Gz(gz) => gz.finish()?,
        };
        w.flush()?;
        Ok(())
    }
}

impl Write for BinOut {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            BinOut::Plain(w) => w.write(buf),
            BinOut::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            BinOut::Plain(w) => w.flush(),
            BinOut::Gz(w) => w.flush(),
        }
    }
}

/// Writes each read to the output file of its bin (A, B or U).
pub struct BinWriter {
    format: OutputFormat,
    outs: [BinOut; 3],
    paths: [PathBuf; 3],
}

impl BinWriter {
    /// Create `<prefix>.fa|fq[.gz]` for the A, B and unassigned bins.
    pub fn create(prefixes: [&str; 3], format: OutputFormat, gzip: bool) -> Result<Self> {
        let ext = if gzip {
            format!("{}.gz", format.extension())
        } else {
            format.extension().to_owned()
        };
        let paths = prefixes.map(|p| PathBuf::from(format!("{p}.{ext}")));
        let outs = [
            BinOut::create(&paths[0], gzip)?,
            BinOut::create(&paths[1], gzip)?,
            BinOut::create(&paths[2], gzip)?,
        ];
        Ok(Self {
            format,
            outs,
            paths,
        })
    }

    pub fn paths(&self) -> &[PathBuf; 3] {
        &self.paths
    }

    pub fn write(&mut self, rec: &FastxRecord, h: Haplotype) -> Result<()> {
        let out = &mut self.outs[match h {
            Haplotype::A => 0,
            Haplotype::B => 1,
            Haplotype::Unassigned => 2,
        }];
        match self.format {
            OutputFormat::Fasta => {
                needletail::parser::write_fasta(&rec.id, &rec.seq, out, LineEnding::Unix)?
            }
            OutputFormat::Fastq => needletail::parser::write_fastq(
                &rec.id,
                &rec.seq,
                rec.qual.as_deref(),
                out,
                LineEnding::Unix,
            )?,
        }
        Ok(())
    }

    /// Flush and close all three outputs.
    pub fn finish(self) -> Result<()> {
        for out in self.outs {
            out.finish()?;
        }
        Ok(())
    }
}

/// TSV summary line: `name  bin  score_a  score_b`.
pub fn write_summary_line<W: Write>(
    w: &mut W,
    rec: &FastxRecord,
    c: &Classification,
) -> Result<()> {
    w.write_all(rec.name())?;
    writeln!(w, "\t{}\t{}\t{}", c.haplotype, c.score_a, c.score_b)?;
    Ok(())
}
