use crate::sclib::{
    build_tasks, genome_summary, CmpParams, ComparisonRow, ComparisonScheduler, GenomeSummary,
    GreedyParams, NullModel, RcError, SampleHandle,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Rows of one pair plus the scaffolds that could not be compared
#[derive(Debug, Clone, Default)]
pub struct PairComparison {
    pub rows: Vec<ComparisonRow>,
    pub failed: Vec<String>,
}

/// Anything that can produce the comparison rows of two samples over a genome
pub trait GenomeComparer {
    fn compare(
        &self,
        query: &SampleHandle,
        reference: &SampleHandle,
    ) -> Result<PairComparison, RcError>;
}

/// Compares a pair through the regular scaffold scheduler
pub struct ScheduledComparer {
    pub scaffolds: Vec<String>,
    pub lengths: IndexMap<String, u64>,
    pub params: Arc<CmpParams>,
    pub model: Arc<NullModel>,
    pub threads: usize,
    pub task_timeout: Option<Duration>,
}

impl GenomeComparer for ScheduledComparer {
    fn compare(
        &self,
        query: &SampleHandle,
        reference: &SampleHandle,
    ) -> Result<PairComparison, RcError> {
        let samples = vec![query.clone(), reference.clone()];
        let tasks = build_tasks(
            &self.scaffolds,
            &self.lengths,
            &samples,
            &self.params,
            &self.model,
        )?;
        let set = ComparisonScheduler::new(self.threads)
            .with_timeout(self.task_timeout)
            .with_progress(false)
            .run(tasks);
        debug!(
            "{} vs {}: {} scaffolds compared",
            query.name(),
            reference.name(),
            set.compared.len()
        );
        Ok(PairComparison {
            rows: set.rows,
            failed: set.failed,
        })
    }
}

/// Sample to cluster assignments plus each cluster's representative
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterState {
    name2cluster: IndexMap<String, usize>,
    representatives: Vec<String>,
}

impl ClusterState {
    /// Start a new cluster represented by `name`
    fn open(&mut self, name: &str) -> usize {
        let cluster = self.representatives.len();
        self.representatives.push(name.to_string());
        self.name2cluster.insert(name.to_string(), cluster);
        cluster
    }

    fn assign(&mut self, name: &str, cluster: usize) {
        self.name2cluster.insert(name.to_string(), cluster);
    }

    pub fn cluster_of(&self, name: &str) -> Option<usize> {
        self.name2cluster.get(name).copied()
    }

    /// Representative of every cluster, by cluster id
    pub fn representatives(&self) -> &[String] {
        &self.representatives
    }

    /// (sample, cluster) in the order samples were placed
    pub fn assignments(&self) -> impl Iterator<Item = (&str, usize)> {
        self.name2cluster.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn num_clusters(&self) -> usize {
        self.representatives.len()
    }
}

/// Genome summary of one query against one representative
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyComparison {
    pub query: String,
    pub reference: String,
    pub cluster: usize,
    pub summary: GenomeSummary,
}

#[derive(Debug, Default)]
pub struct GreedyResult {
    pub state: ClusterState,
    /// Every row of every comparison that was made
    pub comparisons: Vec<ComparisonRow>,
    pub summaries: Vec<GreedyComparison>,
    /// Scaffolds that failed in any comparison, in the order first seen
    pub failed: Vec<String>,
}

/// Single pass clustering against cluster representatives.
///
/// Samples are placed in input order. Each one is compared to every current representative
/// and joins the first cluster (by id) whose representative clears both thresholds, else it
/// opens a new cluster. Placements are never revisited, so the result depends on input order
/// and is not a globally optimal clustering.
pub struct GreedyClusterer {
    pub thresholds: GreedyParams,
    /// Denominator of the genome coverage
    pub genome_length: u64,
}

impl GreedyClusterer {
    pub fn new(thresholds: GreedyParams, genome_length: u64) -> Self {
        Self {
            thresholds,
            genome_length,
        }
    }

    fn qualifies(&self, summary: &GenomeSummary) -> bool {
        summary.pop_ani.is_some_and(|ani| ani >= self.thresholds.g_ani)
            && summary.coverage >= self.thresholds.g_cov
    }

    pub fn run<C: GenomeComparer>(
        &self,
        comparer: &C,
        samples: &[SampleHandle],
    ) -> Result<GreedyResult, RcError> {
        let mut by_name: IndexMap<&str, &SampleHandle> = IndexMap::new();
        let mut seen = HashSet::new();
        for sample in samples {
            if !seen.insert(sample.name()) {
                return Err(RcError::Config(format!(
                    "sample name {} is used more than once",
                    sample.name()
                )));
            }
            by_name.insert(sample.name(), sample);
        }

        let mut ret = GreedyResult::default();
        let mut failed: IndexSet<String> = IndexSet::new();
        for sample in samples {
            let name = sample.name();
            if ret.state.num_clusters() == 0 {
                ret.state.open(name);
                info!("{} seeds cluster 0", name);
                continue;
            }

            let mut joined = None;
            let reps = ret.state.representatives().to_vec();
            for (cluster, rep_name) in reps.iter().enumerate() {
                let reference = by_name[rep_name.as_str()];
                let pair = comparer.compare(sample, reference)?;
                if !pair.failed.is_empty() {
                    warn!(
                        "{} vs {}: {} scaffolds missing from the genome summary",
                        name,
                        rep_name,
                        pair.failed.len()
                    );
                    failed.extend(pair.failed);
                }
                let rows = pair.rows;
                let summary = genome_summary(&rows, self.thresholds.g_mm, self.genome_length);
                debug!(
                    "{} vs {}: popANI {:?} coverage {:.4}",
                    name, rep_name, summary.pop_ani, summary.coverage
                );

                if joined.is_none() && self.qualifies(&summary) {
                    joined = Some(cluster);
                }
                ret.comparisons.extend(rows);
                ret.summaries.push(GreedyComparison {
                    query: name.to_string(),
                    reference: rep_name.clone(),
                    cluster,
                    summary,
                });
            }

            match joined {
                Some(cluster) => {
                    ret.state.assign(name, cluster);
                    info!("{} joins cluster {}", name, cluster);
                }
                None => {
                    let cluster = ret.state.open(name);
                    info!("{} opens cluster {}", name, cluster);
                }
            }
        }

        info!(
            "{} samples in {} clusters",
            samples.len(),
            ret.state.num_clusters()
        );
        ret.failed = failed.into_iter().collect();
        Ok(ret)
    }
}
