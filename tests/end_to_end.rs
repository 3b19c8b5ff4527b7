//! End to end runs over on-disk profiles

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use straincmp::{
    build_tasks, compare_main, compare_scaffold, greedy_main, profileparser, writer, Cli,
    CmpParams, Commands, ComparisonScheduler, NullModel, PoolKind, RcError,
    SampleHandle, SampleProfile, ScaffoldJob, ScaffoldOutcome, ScaffoldTask,
};
use indexmap::IndexMap;

const SNV_HEADER: &str =
    "scaffold\tposition\tmm\tcon_base\tref_base\tvar_base\tbase_coverage\tA\tC\tT\tG\tallele_count\n";

/// (scaffold, start, end) spans at depth 10 on a single 1000bp scaffold named chr1
fn write_profile(
    root: &Path,
    name: &str,
    spans: &[(u64, u64)],
    snvs: &[(u64, char, [u32; 4])],
) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir(&dir).unwrap();
    fs::write(
        dir.join(profileparser::LENGTHS_FILE),
        "scaffold\tlength\nchr1\t1000\n",
    )
    .unwrap();

    let mut cov = String::from("scaffold\tmm\tposition\tdepth\n");
    for (start, end) in spans {
        for pos in *start..=*end {
            cov.push_str(&format!("chr1\t0\t{}\t10\n", pos));
        }
    }
    fs::write(dir.join(profileparser::COVERAGE_FILE), cov).unwrap();

    if !snvs.is_empty() {
        let mut text = String::from(SNV_HEADER);
        for (pos, con, counts) in snvs {
            let alleles = counts.iter().filter(|&&c| c > 0).count();
            text.push_str(&format!(
                "chr1\t{}\t0\t{}\tA\tA\t{}\t{}\t{}\t{}\t{}\t{}\n",
                pos,
                con,
                counts.iter().sum::<u32>(),
                counts[0],
                counts[1],
                counts[2],
                counts[3],
                alleles
            ));
        }
        fs::write(dir.join(profileparser::SNVS_FILE), text).unwrap();
    }
    dir
}

fn parse(args: &[&str]) -> Commands {
    let mut full = vec!["straincmp"];
    full.extend_from_slice(args);
    Cli::parse_from(full).command
}

/// Data rows of a tsv as maps keyed by the header
fn read_table(path: &Path) -> Vec<IndexMap<String, String>> {
    let text = fs::read_to_string(path).unwrap();
    let mut lines = text.lines();
    let header: Vec<String> = lines
        .next()
        .unwrap()
        .split('\t')
        .map(String::from)
        .collect();
    lines
        .map(|l| {
            header
                .iter()
                .cloned()
                .zip(l.split('\t').map(String::from))
                .collect()
        })
        .collect()
}

#[test]
fn minority_allele_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_profile(tmp.path(), "A", &[(1, 800)], &[]);
    let b = write_profile(tmp.path(), "B", &[(200, 1000)], &[(500, 'C', [4, 6, 0, 0])]);
    let out = tmp.path().join("out");

    let Commands::Compare(args) = parse(&[
        "compare",
        "-i",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "-p",
        "2",
        "--store-mismatch-locations",
        "--store-coverage-overlap",
    ]) else {
        panic!("expected compare");
    };
    compare_main(args).unwrap();

    let rows = read_table(&out.join(writer::COMPARISONS_FILE));
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["scaffold"], "chr1");
    assert_eq!(row["compared_bases_count"], "601");
    assert_eq!(row["consensus_SNPs"], "1");
    assert_eq!(row["population_SNPs"], "0");
    assert!((row["coverage_overlap"].parse::<f64>().unwrap() - 0.601).abs() < 1e-12);
    assert!((row["conANI"].parse::<f64>().unwrap() - 600.0 / 601.0).abs() < 1e-12);
    assert_eq!(row["popANI"].parse::<f64>().unwrap(), 1.0);

    let genome = read_table(&out.join(writer::GENOME_FILE));
    assert_eq!(genome.len(), 1);
    assert_eq!(genome[0]["compared_bases"], "601");

    let snps = read_table(&out.join(writer::SNP_LOCATIONS_FILE));
    assert_eq!(snps.len(), 1);
    assert_eq!(snps[0]["position"], "500");
    assert_eq!(snps[0]["consensus_SNP"], "true");
    assert_eq!(snps[0]["population_SNP"], "false");

    let overlap: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(writer::COVERAGE_OVERLAP_FILE)).unwrap())
            .unwrap();
    assert_eq!(overlap["chr1"]["A-vs-B"]["0"].as_array().unwrap().len(), 601);

    assert!(out.join(writer::PARAMS_FILE).is_file());
    assert!(!out.join(writer::FAILED_FILE).exists());
}

#[test]
fn fixed_difference_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_profile(tmp.path(), "A", &[(1, 800)], &[]);
    let b = write_profile(tmp.path(), "B", &[(200, 1000)], &[(500, 'C', [0, 10, 0, 0])]);

    let samples: Vec<SampleHandle> = [a, b]
        .iter()
        .map(|p| profileparser::load_profile(p).unwrap().into_handle())
        .collect();
    let task = ScaffoldTask {
        scaffold: "chr1".to_string(),
        length: 1000,
        samples,
        params: Arc::new(CmpParams::default()),
        model: Arc::new(NullModel::binomial(0.001, 1000, 1e-6).unwrap()),
    };
    let ScaffoldOutcome::Compared(res) = compare_scaffold(&task).unwrap() else {
        panic!("expected a comparison");
    };
    assert_eq!(res.rows[0].population_snps, 1);
    assert!((res.rows[0].pop_ani.unwrap() - 600.0 / 601.0).abs() < 1e-12);
}

#[test]
fn too_few_profiles() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_profile(tmp.path(), "A", &[(1, 800)], &[]);
    let missing = tmp.path().join("nope");

    let Commands::Compare(args) = parse(&[
        "compare",
        "-i",
        a.to_str().unwrap(),
        missing.to_str().unwrap(),
        "-o",
        tmp.path().join("out").to_str().unwrap(),
    ]) else {
        panic!("expected compare");
    };
    assert!(matches!(compare_main(args), Err(RcError::Config(_))));
}

#[test]
fn greedy_clusters() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_profile(tmp.path(), "A", &[(1, 800)], &[]);
    let b = write_profile(tmp.path(), "B", &[(200, 1000)], &[(500, 'C', [4, 6, 0, 0])]);
    // 20 fixed differences inside A's coverage
    let snvs: Vec<(u64, char, [u32; 4])> = (0..20).map(|i| (10 + i * 30, 'G', [0, 0, 0, 10])).collect();
    let c = write_profile(tmp.path(), "C", &[(1, 1000)], &snvs);
    let out = tmp.path().join("out");

    let Commands::Greedy(args) = parse(&[
        "greedy",
        "-i",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        c.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "-p",
        "1",
    ]) else {
        panic!("expected greedy");
    };
    greedy_main(args).unwrap();

    let clusters = read_table(&out.join(writer::GREEDY_CLUSTERS_FILE));
    let got: Vec<(&str, &str)> = clusters
        .iter()
        .map(|r| (r["name"].as_str(), r["cluster"].as_str()))
        .collect();
    assert_eq!(got, vec![("A", "0"), ("B", "0"), ("C", "1")]);

    let summary = read_table(&out.join(writer::GREEDY_SUMMARY_FILE));
    // B vs A, then C vs A
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[1]["query"], "C");
    assert!((summary[1]["popANI"].parse::<f64>().unwrap() - 0.975).abs() < 1e-12);
    assert!(out.join(writer::GREEDY_COMPARISONS_FILE).is_file());
}

#[test]
fn greedy_reports_failed_scaffolds() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dirs = vec![];
    for name in ["A", "B"] {
        let dir = write_profile(tmp.path(), name, &[(1, 1000)], &[]);
        // chr2 is covered past its own length and fails on every attempt
        let mut lengths = fs::read_to_string(dir.join(profileparser::LENGTHS_FILE)).unwrap();
        lengths.push_str("chr2\t10\n");
        fs::write(dir.join(profileparser::LENGTHS_FILE), lengths).unwrap();
        let mut cov = fs::read_to_string(dir.join(profileparser::COVERAGE_FILE)).unwrap();
        for pos in 1..=50 {
            cov.push_str(&format!("chr2\t0\t{}\t10\n", pos));
        }
        fs::write(dir.join(profileparser::COVERAGE_FILE), cov).unwrap();
        dirs.push(dir);
    }
    let out = tmp.path().join("out");

    let Commands::Greedy(args) = parse(&[
        "greedy",
        "-i",
        dirs[0].to_str().unwrap(),
        dirs[1].to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "-p",
        "1",
    ]) else {
        panic!("expected greedy");
    };
    greedy_main(args).unwrap();

    let failed = fs::read_to_string(out.join(writer::FAILED_FILE)).unwrap();
    assert_eq!(failed, "chr2\n");
    let clusters = read_table(&out.join(writer::GREEDY_CLUSTERS_FILE));
    assert_eq!(clusters.len(), 2);
}

#[test]
fn retry_recovers_every_scaffold() {
    let model = Arc::new(NullModel::binomial(0.001, 100, 1e-6).unwrap());
    let params = Arc::new(CmpParams::default());
    let mut lengths = IndexMap::new();
    let mut a = SampleProfile::new("A");
    let mut b = SampleProfile::new("B");
    let scaffolds: Vec<String> = (0..10).map(|i| format!("scaf_{}", i)).collect();
    for name in &scaffolds {
        lengths.insert(name.clone(), 100);
        for prof in [&mut a, &mut b] {
            prof.set_length(name, 100);
            prof.coverage_mut(name).add_span(0, 1, 50, 8);
        }
    }
    let samples = vec![a.into_handle(), b.into_handle()];
    let tasks = build_tasks(&scaffolds, &lengths, &samples, &params, &model).unwrap();

    let first = Arc::new(AtomicBool::new(true));
    let job: ScaffoldJob = Arc::new(move |task: &ScaffoldTask| -> Result<ScaffoldOutcome, RcError> {
        if task.scaffold == "scaf_7" && first.swap(false, Ordering::SeqCst) {
            return Err(RcError::Scaffold {
                scaffold: task.scaffold.clone(),
                msg: "simulated failure".to_string(),
            });
        }
        compare_scaffold(task)
    });

    let set = ComparisonScheduler::new(4)
        .with_pool(PoolKind::Threads(4))
        .with_job(job)
        .with_progress(false)
        .run(tasks);

    assert!(set.failed.is_empty());
    assert!(set.skipped.is_empty());
    let mut seen: Vec<&str> = set.rows.iter().map(|r| r.scaffold.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 10);
    assert!(set.rows.iter().all(|r| r.pop_ani == Some(1.0)));
}
