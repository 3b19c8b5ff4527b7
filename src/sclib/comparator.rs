use crate::sclib::{
    mm_overlaps, CmpParams, CoverageByMismatch, MismatchLevel, NullModel, OverlapSet, RcError,
    SampleHandle, SnpCall, SnpCaller, VariantTable,
};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Comparison of one sample pair on one scaffold at one mismatch level
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub scaffold: String,
    pub name1: String,
    pub name2: String,
    pub mm: MismatchLevel,
    pub coverage_overlap: f64,
    pub compared_bases_count: u64,
    pub percent_genome_compared: f64,
    pub length: u64,
    pub consensus_snps: u64,
    pub population_snps: u64,
    /// None when no bases were compared
    pub con_ani: Option<f64>,
    pub pop_ani: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnpLocation {
    pub scaffold: String,
    pub name1: String,
    pub name2: String,
    pub call: SnpCall,
}

/// pair key -> mismatch level -> compared positions
pub type PairOverlaps = IndexMap<String, BTreeMap<MismatchLevel, OverlapSet>>;

#[derive(Debug, Clone, Default)]
pub struct ScaffoldComparison {
    pub scaffold: String,
    pub rows: Vec<ComparisonRow>,
    /// Only filled when --store-mismatch-locations
    pub snp_locations: Vec<SnpLocation>,
    /// Only filled when --store-coverage-overlap
    pub pair_overlaps: PairOverlaps,
}

#[derive(Debug)]
pub enum ScaffoldOutcome {
    Compared(ScaffoldComparison),
    /// Fewer than two samples have the scaffold. Never retried
    Skipped(String),
    /// Something went wrong. Eligible for a retry
    Failed(String),
}

impl ScaffoldOutcome {
    pub fn scaffold(&self) -> &str {
        match self {
            ScaffoldOutcome::Compared(c) => &c.scaffold,
            ScaffoldOutcome::Skipped(s) | ScaffoldOutcome::Failed(s) => s,
        }
    }
}

/// Everything a worker needs to compare one scaffold
#[derive(Clone)]
pub struct ScaffoldTask {
    pub scaffold: String,
    pub length: u64,
    pub samples: Vec<SampleHandle>,
    pub params: Arc<CmpParams>,
    pub model: Arc<NullModel>,
}

impl std::fmt::Debug for ScaffoldTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaffoldTask")
            .field("scaffold", &self.scaffold)
            .field("length", &self.length)
            .field(
                "samples",
                &self.samples.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Make one task per scaffold over the same set of samples
pub fn build_tasks(
    scaffolds: &[String],
    lengths: &IndexMap<String, u64>,
    samples: &[SampleHandle],
    params: &Arc<CmpParams>,
    model: &Arc<NullModel>,
) -> Result<Vec<ScaffoldTask>, RcError> {
    scaffolds
        .iter()
        .map(|scaffold| {
            let length = *lengths.get(scaffold).ok_or_else(|| {
                RcError::Config(format!("no length known for scaffold {}", scaffold))
            })?;
            Ok(ScaffoldTask {
                scaffold: scaffold.clone(),
                length,
                samples: samples.to_vec(),
                params: params.clone(),
                model: model.clone(),
            })
        })
        .collect()
}

/// Name of a pair independent of its order
pub fn pair_key(name1: &str, name2: &str) -> String {
    if name1 <= name2 {
        format!("{}-vs-{}", name1, name2)
    } else {
        format!("{}-vs-{}", name2, name1)
    }
}

fn ani(compared: u64, snps: u64) -> Option<f64> {
    if compared == 0 {
        None
    } else {
        Some((compared - snps) as f64 / compared as f64)
    }
}

/// Compare every pair of samples that have data for the task's scaffold.
///
/// Pairs are processed one after another. Each pair produces one row per mismatch
/// level seen in either sample.
pub fn compare_scaffold(task: &ScaffoldTask) -> Result<ScaffoldOutcome, RcError> {
    let empty = VariantTable::default();
    let present: Vec<(&str, &CoverageByMismatch, &VariantTable)> = task
        .samples
        .iter()
        .filter_map(|s| {
            s.coverage(&task.scaffold).map(|cov| {
                (
                    s.name(),
                    cov,
                    s.variants(&task.scaffold).unwrap_or(&empty),
                )
            })
        })
        .collect();

    if present.len() < 2 {
        debug!("skipping {} with {} samples", task.scaffold, present.len());
        return Ok(ScaffoldOutcome::Skipped(task.scaffold.clone()));
    }

    let params = &task.params;
    let caller = SnpCaller::new(&task.model, params.min_freq);
    let pairs: Vec<(usize, usize)> = if params.include_self_comparisons {
        (0..present.len())
            .combinations_with_replacement(2)
            .map(|p| (p[0], p[1]))
            .collect()
    } else {
        (0..present.len()).tuple_combinations().collect()
    };

    let mut ret = ScaffoldComparison {
        scaffold: task.scaffold.clone(),
        ..Default::default()
    };

    for (i, j) in pairs {
        let (name1, cov1, snv1) = present[i];
        let (name2, cov2, snv2) = present[j];
        debug!("{} {} vs {}", task.scaffold, name1, name2);

        let overlaps = mm_overlaps(cov1, cov2, params.min_cov);
        let calls = caller.call_levels(snv1, snv2, &overlaps);

        let mut snp_counts: BTreeMap<MismatchLevel, (u64, u64)> = BTreeMap::new();
        for call in &calls {
            let counts = snp_counts.entry(call.mm).or_default();
            counts.0 += call.consensus_snp as u64;
            counts.1 += call.population_snp as u64;
        }

        for ov in &overlaps {
            let compared = ov.compared_bases();
            if compared > task.length {
                return Err(RcError::Scaffold {
                    scaffold: task.scaffold.clone(),
                    msg: format!(
                        "{} vs {} compared {} bases on a scaffold of length {}",
                        name1, name2, compared, task.length
                    ),
                });
            }
            let (consensus_snps, population_snps) =
                snp_counts.get(&ov.mm).copied().unwrap_or_default();

            ret.rows.push(ComparisonRow {
                scaffold: task.scaffold.clone(),
                name1: name1.to_string(),
                name2: name2.to_string(),
                mm: ov.mm,
                coverage_overlap: ov.fraction,
                compared_bases_count: compared,
                percent_genome_compared: if task.length > 0 {
                    compared as f64 / task.length as f64
                } else {
                    0.0
                },
                length: task.length,
                consensus_snps,
                population_snps,
                con_ani: ani(compared, consensus_snps),
                pop_ani: ani(compared, population_snps),
            });
        }

        if params.store_mismatch_locations {
            ret.snp_locations
                .extend(calls.into_iter().map(|call| SnpLocation {
                    scaffold: task.scaffold.clone(),
                    name1: name1.to_string(),
                    name2: name2.to_string(),
                    call,
                }));
        }

        if params.store_coverage_overlap {
            ret.pair_overlaps.insert(
                pair_key(name1, name2),
                overlaps.into_iter().map(|o| (o.mm, o.positions)).collect(),
            );
        }
    }

    debug!("{} produced {} rows", task.scaffold, ret.rows.len());
    Ok(ScaffoldOutcome::Compared(ret))
}
