use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use trio_kmer_set::*;

/// Classify reads by haplotype using k-mers unique to each parent.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// K-mers unique to haplotype A, one per line
    #[arg(short = 'a', long = "hapA-kmers")]
    hap_a_kmers: PathBuf,

    /// K-mers unique to haplotype B, one per line
    #[arg(short = 'b', long = "hapB-kmers")]
    hap_b_kmers: PathBuf,

    /// FASTA/FASTQ(.gz) reads to classify
    #[arg(short, long = "input-reads")]
    input_reads: PathBuf,

    /// Prefix for haplotype A output
    #[arg(short = 'A', long = "hapA-out-prefix", default_value = "hapA")]
    hap_a_out_prefix: String,

    /// Prefix for haplotype B output
    #[arg(short = 'B', long = "hapB-out-prefix", default_value = "hapB")]
    hap_b_out_prefix: String,

    /// Prefix for unassigned output
    #[arg(short = 'U', long = "hapU-out-prefix", default_value = "hapU")]
    hap_u_out_prefix: String,

    /// Threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Reads per parallel batch
    #[arg(long, default_value_t = 16_384)]
    batch_size: usize,

    /// Treat non-ACGT symbols as A instead of failing
    #[arg(long, conflicts_with = "skip_ambiguous")]
    legacy_symbols: bool,

    /// Ignore k-mers and read windows containing non-ACGT symbols
    #[arg(long)]
    skip_ambiguous: bool,

    /// Let duplicate k-mers take their own slot
    #[arg(long)]
    bag: bool,

    /// Use raw key modulo capacity for the home slot
    #[arg(long)]
    raw_hash: bool,

    /// Gzip the binned outputs
    #[arg(long)]
    gzip: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_log(verbosity: usize) {
    stderrlog::new()
        .module(module_path!())
        .module("trio_kmer_set")
        .verbosity(verbosity)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .ok();
}

fn set_config(args: &Args) -> SetConfig {
    let policy = if args.legacy_symbols {
        SymbolPolicy::Legacy
    } else if args.skip_ambiguous {
        SymbolPolicy::Skip
    } else {
        SymbolPolicy::Strict
    };
    SetConfig::default()
        .with_symbol_policy(policy)
        .with_insert_mode(if args.bag {
            InsertMode::Bag
        } else {
            InsertMode::Dedup
        })
        .with_hash_policy(if args.raw_hash {
            HashPolicy::RawModulo
        } else {
            HashPolicy::Mixed
        })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_log(if args.verbose { 3 } else { 2 });

    if args.threads == Some(0) {
        anyhow::bail!("--threads must be >= 1");
    }

    log::info!("Reading k-mers into sets...");
    let (hap_a, hap_b) =
        build_haplotype_sets(&args.hap_a_kmers, &args.hap_b_kmers, &set_config(&args))?;
    let classifier = HaplotypeClassifier::new(hap_a, hap_b)?;

    let cfg = ClassifyConfig::default()
        .batch_size(args.batch_size)
        .gzip(args.gzip);
    let cfg = match args.threads {
        Some(n) => cfg.threads(n),
        None => cfg,
    };

    let mut bins = BinWriter::create(
        [
            args.hap_a_out_prefix.as_str(),
            args.hap_b_out_prefix.as_str(),
            args.hap_u_out_prefix.as_str(),
        ],
        OutputFormat::from_path(&args.input_reads),
        cfg.is_gzip(),
    )?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    log::info!("Classifying reads...");
    let summary = classify_fastx(&args.input_reads, &classifier, &cfg, |rec, c| {
        bins.write(rec, c.haplotype)?;
        write_summary_line(&mut out, rec, c)
    })?;
    out.flush()?;
    bins.finish()?;

    log::info!(
        "Classified {} reads: A={}, B={}, U={}",
        summary.total(),
        summary.reads_a,
        summary.reads_b,
        summary.reads_unassigned
    );
    Ok(())
}
