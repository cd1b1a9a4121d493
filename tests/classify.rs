use std::io::Cursor;

use trio_kmer_set::*;

fn set_of(k: usize, kmers: &[&str], cfg: &SetConfig) -> KmerSet {
    build_kmer_set(k, kmers.len(), kmers, cfg).unwrap()
}

fn haplotypes() -> HaplotypeClassifier {
    let cfg = SetConfig::default();
    let a = set_of(5, &["ACGGG", "CGGGC", "AAAAA"], &cfg);
    let b = set_of(5, &["ACGGG", "TTTTC", "GATAT"], &cfg);
    HaplotypeClassifier::new(a, b).unwrap()
}

#[test]
fn test_basic_build_and_query_scenario() {
    let cfg = SetConfig::default();
    let a = set_of(3, &["AAA", "CCC"], &cfg);
    let b = set_of(3, &["GGG", "TTT"], &cfg);
    assert_eq!(a.capacity(), 2);
    assert_eq!(b.capacity(), 2);

    // 10 windows; AAA~TTT and CCC~GGG, so both sets hit AAA, CCC, GGG, TTT
    let counts = count_matches(b"AAACCCGGGTTT", &[&a, &b]).unwrap();
    assert_eq!(counts, vec![4, 4]);
}

#[test]
fn test_count_matches_boundaries() {
    let cfg = SetConfig::default();
    let a = set_of(5, &["ACGGG"], &cfg);
    let b = set_of(5, &["TTTTC"], &cfg);
    assert_eq!(count_matches(b"ACGG", &[&a, &b]).unwrap(), vec![0, 0]);
    assert_eq!(count_matches(b"", &[&a]).unwrap(), vec![0]);
    assert_eq!(count_matches(b"ACGGG", &[&a, &b]).unwrap(), vec![1, 0]);
    assert!(count_matches(b"ACGGG", &[]).unwrap().is_empty());

    let other_k = set_of(4, &["ACGG"], &cfg);
    assert!(matches!(
        count_matches(b"ACGGG", &[&a, &other_k]),
        Err(KmerError::InvalidArgument(_))
    ));
}

#[test]
fn test_count_matches_overlapping_windows() {
    let cfg = SetConfig::default();
    let a = set_of(5, &["ACGGG", "CGGGC", "AAAAA"], &cfg);
    let b = set_of(5, &["ACGGG", "TTTTC", "GATAT"], &cfg);
    let counts = count_matches(b"ACGGGCATCGCGGC", &[&a, &b]).unwrap();
    assert_eq!(counts, vec![2, 1]);
    // a homopolymer run hits AAAAA once per window, on either strand
    assert_eq!(count_matches(b"TTTTTTTT", &[&a]).unwrap(), vec![4]);
}

#[test]
fn test_count_matches_symbol_policies() {
    let strict = set_of(3, &["AAA"], &SetConfig::default());
    match count_matches(b"AAAAN", &[&strict]) {
        Err(KmerError::MalformedSymbol { symbol, pos }) => {
            assert_eq!(symbol, 'N');
            assert_eq!(pos, 4);
        }
        other => panic!("unexpected {other:?}"),
    }
    // shorter than k: no windows, no error
    assert_eq!(count_matches(b"NN", &[&strict]).unwrap(), vec![0]);

    let legacy_cfg = SetConfig::default().with_symbol_policy(SymbolPolicy::Legacy);
    let legacy = set_of(3, &["AAA"], &legacy_cfg);
    assert_eq!(count_matches(b"AANAA", &[&legacy]).unwrap(), vec![3]);

    let skip_cfg = SetConfig::default().with_symbol_policy(SymbolPolicy::Skip);
    let skip = set_of(3, &["AAA"], &skip_cfg);
    assert_eq!(count_matches(b"AAANAAAA", &[&skip]).unwrap(), vec![3]);

    assert!(matches!(
        count_matches(b"AAA", &[&strict, &skip]),
        Err(KmerError::InvalidArgument(_))
    ));
}

#[test]
fn test_scaling_factors() {
    let cfg = SetConfig::default();
    let a = set_of(3, &["AAC", "ACC", "CAG", "AGC"], &cfg);
    let b = set_of(3, &["AAG", "ACG"], &cfg);
    assert_eq!(scaling_factors(&a, &b), (1.0, 2.0));
    assert_eq!(scaling_factors(&b, &a), (2.0, 1.0));

    let skip_cfg = SetConfig::default().with_symbol_policy(SymbolPolicy::Skip);
    let empty = set_of(3, &["NNN"], &skip_cfg);
    let c = set_of(3, &["AAG"], &skip_cfg);
    assert_eq!(scaling_factors(&empty, &c), (0.0, 1.0));
}

#[test]
fn test_classify_single_reads() {
    let clf = haplotypes();
    assert_eq!(clf.k(), 5);
    assert_eq!(clf.scaling_factors(), (1.0, 1.0));

    let c = clf.classify(b"ACGGGCATCGCGGC").unwrap();
    assert_eq!((c.count_a, c.count_b), (2, 1));
    assert_eq!(c.haplotype, Haplotype::A);

    let c = clf.classify(b"GATATC").unwrap();
    assert_eq!(c.haplotype, Haplotype::B);
    assert_eq!(c.score_b, 2.0);

    let c = clf.classify(b"CCCCCC").unwrap();
    assert_eq!(c.haplotype, Haplotype::Unassigned);
    assert_eq!(c.haplotype.to_string(), "U");
}

#[test]
fn test_classify_fastq_stream_in_order() {
    let fastq = "@read1 first\nACGGGCATCGCGGC\n+\nIIIIIIIIIIIIII\n\
                 @read2\nTTTTTTTT\n+\nIIIIIIII\n\
                 @readAwesome\nGATATC\n+\nIIIIII\n\
                 @read4\nCCCCCC\n+\nIIIIII\n";
    let clf = haplotypes();
    // batch size 1 exercises the block loop
    let cfg = ClassifyConfig::default().batch_size(1);
    let mut seen = Vec::new();
    let mut tsv = Vec::new();
    let summary = classify_fastx_reader(Cursor::new(fastq), &clf, &cfg, |rec, c| {
        seen.push((String::from_utf8_lossy(rec.name()).into_owned(), c.haplotype));
        write_summary_line(&mut tsv, rec, c)
    })
    .unwrap();

    assert_eq!(
        seen,
        vec![
            ("read1".to_owned(), Haplotype::A),
            ("read2".to_owned(), Haplotype::A),
            ("readAwesome".to_owned(), Haplotype::B),
            ("read4".to_owned(), Haplotype::Unassigned),
        ]
    );
    assert_eq!(summary.reads_a, 2);
    assert_eq!(summary.reads_b, 1);
    assert_eq!(summary.reads_unassigned, 1);
    assert_eq!(summary.total(), 4);

    let tsv = String::from_utf8(tsv).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();
    assert_eq!(lines[2], "readAwesome\tB\t0\t2");
    assert_eq!(lines[3], "read4\tU\t0\t0");
}

#[test]
fn test_thread_count_applies_after_sets_are_built() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("hapA.txt");
    let b = dir.path().join("hapB.txt");
    std::fs::write(&a, "ACGGG\nCGGGC\nAAAAA\n").unwrap();
    std::fs::write(&b, "ACGGG\nTTTTC\nGATAT\n").unwrap();
    // building the pair runs rayon::join, which starts the global pool first
    let (sa, sb) = build_haplotype_sets(&a, &b, &SetConfig::default()).unwrap();
    let clf = HaplotypeClassifier::new(sa, sb).unwrap();
    let global = rayon::current_num_threads();

    let cfg = ClassifyConfig::default().threads(3).batch_size(2);
    assert_eq!(cfg.install(rayon::current_num_threads).unwrap(), 3);
    assert_eq!(
        ClassifyConfig::default()
            .install(rayon::current_num_threads)
            .unwrap(),
        global
    );

    let fastq = "@r1\nACGGGCATCGCGGC\n+\nIIIIIIIIIIIIII\n\
                 @r2\nGATATC\n+\nIIIIII\n\
                 @r3\nCCCCCC\n+\nIIIIII\n";
    let mut bins = Vec::new();
    let summary = classify_fastx_reader(Cursor::new(fastq), &clf, &cfg, |_, c| {
        bins.push(c.haplotype);
        Ok(())
    })
    .unwrap();
    assert_eq!(bins, vec![Haplotype::A, Haplotype::B, Haplotype::Unassigned]);
    assert_eq!(summary.total(), 3);
    // the global pool keeps its own size
    assert_eq!(rayon::current_num_threads(), global);
}

#[test]
fn test_strict_policy_fails_on_ambiguous_read() {
    let fastq = "@r1\nACGGGNACGGG\n+\nIIIIIIIIIII\n";
    let clf = haplotypes();
    let res = classify_fastx_reader(Cursor::new(fastq), &clf, &ClassifyConfig::default(), |_, _| {
        Ok(())
    });
    assert!(matches!(res, Err(KmerError::MalformedSymbol { pos: 5, .. })));
}

#[test]
fn test_output_format_from_path() {
    use std::path::Path;
    assert_eq!(OutputFormat::from_path(Path::new("reads.fq.gz")), OutputFormat::Fastq);
    assert_eq!(OutputFormat::from_path(Path::new("reads.FASTQ")), OutputFormat::Fastq);
    assert_eq!(OutputFormat::from_path(Path::new("reads.fa")), OutputFormat::Fasta);
    assert_eq!(OutputFormat::from_path(Path::new("reads")), OutputFormat::Fasta);
}

#[test]
fn test_bin_writer_routes_reads() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = |p: &str| dir.path().join(p).to_string_lossy().into_owned();
    let (pa, pb, pu) = (prefix("hapA"), prefix("hapB"), prefix("hapU"));

    let mut bins = BinWriter::create([&pa, &pb, &pu].map(String::as_str), OutputFormat::Fasta, false)
        .unwrap();
    let rec = FastxRecord {
        id: b"readB".to_vec(),
        seq: b"GATATC".to_vec(),
        qual: None,
    };
    bins.write(&rec, Haplotype::B).unwrap();
    let paths = bins.paths().clone();
    bins.finish().unwrap();

    assert!(paths[1].ends_with("hapB.fa"));
    let b = std::fs::read_to_string(&paths[1]).unwrap();
    assert!(b.starts_with(">readB"), "{b}");
    assert!(b.contains("GATATC"));
    assert!(std::fs::read_to_string(&paths[0]).unwrap().is_empty());
    assert!(std::fs::read_to_string(&paths[2]).unwrap().is_empty());
}
