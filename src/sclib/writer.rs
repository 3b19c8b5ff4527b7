use crate::sclib::{
    ClusterState, ComparisonRow, GreedyComparison, GreedyParams, MismatchLevel, PairOverlaps,
    PairSummary, RcError, SnpLocation,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const COMPARISONS_FILE: &str = "comparisons.tsv";
pub const GENOME_FILE: &str = "genome_comparisons.tsv";
pub const SNP_LOCATIONS_FILE: &str = "snp_locations.tsv";
pub const COVERAGE_OVERLAP_FILE: &str = "coverage_overlap.json";
pub const GREEDY_CLUSTERS_FILE: &str = "greedy_clusters.tsv";
pub const GREEDY_COMPARISONS_FILE: &str = "greedy_comparisons.tsv";
pub const GREEDY_SUMMARY_FILE: &str = "greedy_summary.tsv";
pub const FAILED_FILE: &str = "failed_scaffolds.txt";
pub const PARAMS_FILE: &str = "params.json";

fn open(path: &Path) -> Result<BufWriter<File>, RcError> {
    let file = File::create(path).map_err(|e| {
        RcError::Config(format!("unable to create {}: {}", path.display(), e))
    })?;
    let m_page = page_size::get() * 1000;
    Ok(BufWriter::with_capacity(m_page, file))
}

/// Undefined values are written as an empty field
fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

fn base(b: u8) -> char {
    b as char
}

pub fn write_comparisons(path: &Path, rows: &[ComparisonRow]) -> Result<(), RcError> {
    let mut out = open(path)?;
    writeln!(
        out,
        "scaffold\tname1\tname2\tmm\tcoverage_overlap\tcompared_bases_count\tpercent_genome_compared\tlength\tconsensus_SNPs\tpopulation_SNPs\tconANI\tpopANI"
    )?;
    for r in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.scaffold,
            r.name1,
            r.name2,
            r.mm,
            r.coverage_overlap,
            r.compared_bases_count,
            r.percent_genome_compared,
            r.length,
            r.consensus_snps,
            r.population_snps,
            fmt_opt(r.con_ani),
            fmt_opt(r.pop_ani)
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_genome_comparisons(
    path: &Path,
    summaries: &[PairSummary],
    mm_ceiling: MismatchLevel,
) -> Result<(), RcError> {
    let mut out = open(path)?;
    writeln!(out, "name1\tname2\tmm_ceiling\tpopANI\tcoverage\tcompared_bases")?;
    for s in summaries {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            s.name1,
            s.name2,
            mm_ceiling,
            fmt_opt(s.summary.pop_ani),
            s.summary.coverage,
            s.summary.compared_bases
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_snp_locations(path: &Path, locations: &[SnpLocation]) -> Result<(), RcError> {
    let mut out = open(path)?;
    writeln!(
        out,
        "scaffold\tname1\tname2\tposition\tmm\tcon_base_1\tcon_base_2\tref_base\tdepth_1\tdepth_2\tconsensus_SNP\tpopulation_SNP"
    )?;
    for loc in locations {
        let c = &loc.call;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            loc.scaffold,
            loc.name1,
            loc.name2,
            c.position,
            c.mm,
            base(c.con_base_1),
            base(c.con_base_2),
            base(c.ref_base),
            c.depth_1.map_or_else(String::new, |d| d.to_string()),
            c.depth_2.map_or_else(String::new, |d| d.to_string()),
            c.consensus_snp,
            c.population_snp
        )?;
    }
    out.flush()?;
    Ok(())
}

/// scaffold -> pair -> mm -> positions
pub fn write_coverage_overlap(
    path: &Path,
    overlaps: &IndexMap<String, PairOverlaps>,
) -> Result<(), RcError> {
    let mut out = open(path)?;
    serde_json::to_writer(&mut out, overlaps)?;
    out.flush()?;
    Ok(())
}

pub fn write_clusters(path: &Path, state: &ClusterState) -> Result<(), RcError> {
    let mut out = open(path)?;
    writeln!(out, "name\tcluster\trepresentative")?;
    for (name, cluster) in state.assignments() {
        writeln!(
            out,
            "{}\t{}\t{}",
            name,
            cluster,
            state.representatives()[cluster]
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_greedy_summary(
    path: &Path,
    summaries: &[GreedyComparison],
    params: &GreedyParams,
) -> Result<(), RcError> {
    let mut out = open(path)?;
    writeln!(
        out,
        "query\treference\tcluster\tpopANI\tcoverage\tcompared_bases\tg_ani\tg_cov\tg_mm"
    )?;
    for s in summaries {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            s.query,
            s.reference,
            s.cluster,
            fmt_opt(s.summary.pop_ani),
            s.summary.coverage,
            s.summary.compared_bases,
            params.g_ani,
            params.g_cov,
            params.g_mm
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_failed(path: &Path, failed: &[String]) -> Result<(), RcError> {
    let mut out = open(path)?;
    for name in failed {
        writeln!(out, "{}", name)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_params<T: Serialize>(path: &Path, params: &T) -> Result<(), RcError> {
    let mut out = open(path)?;
    serde_json::to_writer_pretty(&mut out, params)?;
    out.flush()?;
    Ok(())
}
