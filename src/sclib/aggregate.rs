use crate::sclib::{ComparisonRow, MismatchLevel};
use indexmap::IndexMap;

/// Genome-wide result for one sample pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenomeSummary {
    /// None when no bases were compared
    pub pop_ani: Option<f64>,
    pub coverage: f64,
    pub compared_bases: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairSummary {
    pub name1: String,
    pub name2: String,
    pub summary: GenomeSummary,
}

/// Collapses the per-scaffold rows of one sample pair into a genome-wide popANI and coverage.
///
/// For every scaffold only the row with the highest mismatch level at or below the ceiling
/// is kept. When two rows share that level, the later one wins.
///
/// # Parameters
/// - `rows`: Comparison rows of a single sample pair, in any order.
/// - `mm_ceiling`: Highest mismatch level considered.
/// - `genome_length`: Sum of the lengths of the scaffolds making up the genome.
///
/// # Returns
/// A `GenomeSummary` where:
/// - `pop_ani` is the compared-base weighted average of the kept rows' popANI. Rows without
///   a popANI add nothing. It is None when no bases were compared.
/// - `coverage` is the total compared bases over `genome_length`, or 0.0 for an empty genome.
pub fn genome_summary<'a, I>(rows: I, mm_ceiling: MismatchLevel, genome_length: u64) -> GenomeSummary
where
    I: IntoIterator<Item = &'a ComparisonRow>,
{
    let mut kept: IndexMap<(&str, &str, &str), &ComparisonRow> = IndexMap::new();
    for row in rows.into_iter().filter(|r| r.mm <= mm_ceiling) {
        let key = (row.scaffold.as_str(), row.name1.as_str(), row.name2.as_str());
        if kept.get(&key).map_or(true, |prev| prev.mm <= row.mm) {
            kept.insert(key, row);
        }
    }

    let compared_bases: u64 = kept.values().map(|r| r.compared_bases_count).sum();
    let weighted: f64 = kept
        .values()
        .map(|r| r.pop_ani.unwrap_or(0.0) * r.compared_bases_count as f64)
        .sum();

    GenomeSummary {
        pop_ani: if compared_bases > 0 {
            Some(weighted / compared_bases as f64)
        } else {
            None
        },
        coverage: if genome_length > 0 {
            compared_bases as f64 / genome_length as f64
        } else {
            0.0
        },
        compared_bases,
    }
}

/// One genome summary per sample pair, in order of first appearance
pub fn pairwise_summaries(
    rows: &[ComparisonRow],
    mm_ceiling: MismatchLevel,
    genome_length: u64,
) -> Vec<PairSummary> {
    let mut groups: IndexMap<(&str, &str), Vec<&ComparisonRow>> = IndexMap::new();
    for row in rows {
        groups
            .entry((row.name1.as_str(), row.name2.as_str()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((name1, name2), group)| PairSummary {
            name1: name1.to_string(),
            name2: name2.to_string(),
            summary: genome_summary(group, mm_ceiling, genome_length),
        })
        .collect()
}
