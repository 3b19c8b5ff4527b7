use crate::sclib::nullmodel::DEFAULT_MAX_DEPTH;
use crate::sclib::writer::{
    write_clusters, write_comparisons, write_coverage_overlap, write_failed,
    write_genome_comparisons, write_greedy_summary, write_params, write_snp_locations,
    COMPARISONS_FILE, COVERAGE_OVERLAP_FILE, FAILED_FILE, GENOME_FILE, GREEDY_CLUSTERS_FILE,
    GREEDY_COMPARISONS_FILE, GREEDY_SUMMARY_FILE, PARAMS_FILE, SNP_LOCATIONS_FILE,
};
use crate::sclib::{
    build_tasks, load_profile, load_scaffold_list, pairwise_summaries, CmpParams, CompareArgs,
    ComparisonScheduler, GreedyArgs, GreedyClusterer, IOParams, NullModel, RcError,
    SampleHandle, ScheduledComparer,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Loaded profiles and the scaffolds to compare
pub struct RunInputs {
    pub samples: Vec<SampleHandle>,
    pub lengths: IndexMap<String, u64>,
    pub scaffolds: Vec<String>,
    /// The user's scaffold list, if one was given
    pub scaffold_list: Option<Vec<String>>,
}

impl RunInputs {
    /// Summed length of the compared scaffolds
    pub fn compared_length(&self) -> u64 {
        self.scaffolds
            .iter()
            .filter_map(|s| self.lengths.get(s))
            .sum()
    }

    /// Summed length of the listed scaffolds, or of every known scaffold without a list
    pub fn genome_length(&self) -> u64 {
        match &self.scaffold_list {
            Some(list) => list.iter().filter_map(|s| self.lengths.get(s)).sum(),
            None => self.lengths.values().sum(),
        }
    }
}

pub fn load_inputs(io: &IOParams) -> Result<RunInputs, RcError> {
    let mut samples: Vec<SampleHandle> = vec![];
    for path in &io.input {
        if !path.is_dir() {
            error!("{} does not exist, skipping", path.display());
            continue;
        }
        let profile = load_profile(path)?;
        let handle = profile.into_handle();
        info!(
            "loaded {} with {} scaffolds",
            handle.name(),
            handle.scaffolds().len()
        );
        samples.push(handle);
    }

    if samples.len() < 2 {
        return Err(RcError::Config(format!(
            "need at least two profiles to compare, found {}",
            samples.len()
        )));
    }

    let mut names = HashSet::new();
    for sample in &samples {
        if !names.insert(sample.name()) {
            return Err(RcError::Config(format!(
                "sample name {} is used more than once",
                sample.name()
            )));
        }
    }

    let lengths = scaffold_lengths(&samples)?;
    let scaffold_list = io
        .scaffolds
        .as_deref()
        .map(load_scaffold_list)
        .transpose()?;
    let scaffolds = shared_scaffolds(&samples, scaffold_list.as_deref())?;

    Ok(RunInputs {
        samples,
        lengths,
        scaffolds,
        scaffold_list,
    })
}

/// Every known scaffold's length. All samples must agree
pub fn scaffold_lengths(samples: &[SampleHandle]) -> Result<IndexMap<String, u64>, RcError> {
    let mut ret: IndexMap<String, u64> = IndexMap::new();
    let mut source: IndexMap<String, &str> = IndexMap::new();
    for sample in samples {
        for (scaffold, length) in sample.scaffold_lengths() {
            match ret.get(scaffold).copied() {
                Some(prev) if prev != length => {
                    return Err(RcError::Config(format!(
                        "scaffold {} has length {} in {} but {} in {}",
                        scaffold,
                        prev,
                        source[scaffold],
                        length,
                        sample.name()
                    )));
                }
                Some(_) => {}
                None => {
                    ret.insert(scaffold.to_string(), length);
                    source.insert(scaffold.to_string(), sample.name());
                }
            }
        }
    }
    Ok(ret)
}

/// Scaffolds with coverage in at least two samples, optionally restricted to a list
pub fn shared_scaffolds(
    samples: &[SampleHandle],
    list: Option<&[String]>,
) -> Result<Vec<String>, RcError> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for sample in samples {
        for scaffold in sample.scaffolds() {
            *counts.entry(scaffold).or_insert(0) += 1;
        }
    }

    let mut shared: Vec<String> = counts
        .into_iter()
        .filter(|(_, n)| *n >= 2)
        .map(|(s, _)| s.to_string())
        .collect();
    info!("{} scaffolds are in at least two samples", shared.len());

    if let Some(list) = list {
        let keep: HashSet<&str> = list.iter().map(|s| s.as_str()).collect();
        shared.retain(|s| keep.contains(s.as_str()));
        info!(
            "{} of {} listed scaffolds will be compared",
            shared.len(),
            keep.len()
        );
    }

    if shared.is_empty() {
        return Err(RcError::Config(
            "no scaffolds are shared by at least two samples".to_string(),
        ));
    }
    Ok(shared)
}

/// Detection model from --null-model, or built from --error-rate
pub fn build_model(cmp: &CmpParams) -> Result<Arc<NullModel>, RcError> {
    let model = match &cmp.null_model {
        Some(path) => {
            info!("loading null model {}", path.display());
            NullModel::from_path(path, cmp.fdr)?
        }
        None => NullModel::binomial(cmp.error_rate, DEFAULT_MAX_DEPTH, cmp.fdr)?,
    };
    Ok(Arc::new(model))
}

fn task_timeout(io: &IOParams) -> Option<Duration> {
    io.task_timeout.map(Duration::from_secs)
}

pub fn compare_main(args: CompareArgs) -> Result<(), RcError> {
    fs::create_dir_all(&args.io.output)?;
    let out = args.io.output.as_path();
    write_params(&out.join(PARAMS_FILE), &args)?;

    let model = build_model(&args.cmp)?;
    let inputs = load_inputs(&args.io)?;
    let params = Arc::new(args.cmp.clone());
    let tasks = build_tasks(
        &inputs.scaffolds,
        &inputs.lengths,
        &inputs.samples,
        &params,
        &model,
    )?;

    info!(
        "comparing {} samples on {} scaffolds",
        inputs.samples.len(),
        tasks.len()
    );
    let set = ComparisonScheduler::new(args.io.threads)
        .with_timeout(task_timeout(&args.io))
        .run(tasks);

    write_comparisons(&out.join(COMPARISONS_FILE), &set.rows)?;
    let summaries = pairwise_summaries(&set.rows, args.mm_ceiling, inputs.compared_length());
    write_genome_comparisons(&out.join(GENOME_FILE), &summaries, args.mm_ceiling)?;

    if args.cmp.store_mismatch_locations {
        write_snp_locations(&out.join(SNP_LOCATIONS_FILE), &set.snp_locations)?;
    }
    if args.cmp.store_coverage_overlap {
        write_coverage_overlap(&out.join(COVERAGE_OVERLAP_FILE), &set.coverage_overlaps)?;
    }
    if !set.failed.is_empty() {
        write_failed(&out.join(FAILED_FILE), &set.failed)?;
    }

    info!("finished");
    Ok(())
}

pub fn greedy_main(args: GreedyArgs) -> Result<(), RcError> {
    fs::create_dir_all(&args.io.output)?;
    let out = args.io.output.as_path();
    write_params(&out.join(PARAMS_FILE), &args)?;

    let model = build_model(&args.cmp)?;
    let inputs = load_inputs(&args.io)?;
    let genome_length = inputs.genome_length();
    info!(
        "clustering {} samples over {} scaffolds ({} bp)",
        inputs.samples.len(),
        inputs.scaffolds.len(),
        genome_length
    );

    let comparer = ScheduledComparer {
        scaffolds: inputs.scaffolds.clone(),
        lengths: inputs.lengths.clone(),
        params: Arc::new(args.cmp.clone()),
        model,
        threads: args.io.threads,
        task_timeout: task_timeout(&args.io),
    };
    let clusterer = GreedyClusterer::new(args.greedy.clone(), genome_length);
    let result = clusterer.run(&comparer, &inputs.samples)?;

    write_clusters(&out.join(GREEDY_CLUSTERS_FILE), &result.state)?;
    write_comparisons(&out.join(GREEDY_COMPARISONS_FILE), &result.comparisons)?;
    write_greedy_summary(&out.join(GREEDY_SUMMARY_FILE), &result.summaries, &args.greedy)?;
    if !result.failed.is_empty() {
        write_failed(&out.join(FAILED_FILE), &result.failed)?;
    }

    info!("finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sclib::SampleProfile;

    fn sample(name: &str, scaffolds: &[(&str, u64)]) -> SampleHandle {
        let mut prof = SampleProfile::new(name);
        for (scaffold, length) in scaffolds {
            prof.set_length(scaffold, *length);
            prof.coverage_mut(scaffold).add(0, 1, 10);
        }
        prof.into_handle()
    }

    #[test]
    fn shared_needs_two_samples() {
        let samples = vec![
            sample("A", &[("chr1", 10), ("chr2", 20)]),
            sample("B", &[("chr2", 20), ("chr3", 30)]),
            sample("C", &[("chr3", 30)]),
        ];
        assert_eq!(shared_scaffolds(&samples, None).unwrap(), vec!["chr2", "chr3"]);

        let list = vec!["chr3".to_string(), "chr9".to_string()];
        assert_eq!(shared_scaffolds(&samples, Some(list.as_slice())).unwrap(), vec!["chr3"]);

        let list = vec!["chr1".to_string()];
        assert!(matches!(
            shared_scaffolds(&samples, Some(list.as_slice())),
            Err(RcError::Config(_))
        ));
    }

    #[test]
    fn lengths_must_agree() {
        let good = vec![sample("A", &[("chr1", 10)]), sample("B", &[("chr1", 10)])];
        assert_eq!(scaffold_lengths(&good).unwrap()["chr1"], 10);

        let bad = vec![sample("A", &[("chr1", 10)]), sample("B", &[("chr1", 12)])];
        assert!(matches!(scaffold_lengths(&bad), Err(RcError::Config(_))));
    }

    #[test]
    fn genome_lengths() {
        let samples = vec![
            sample("A", &[("chr1", 100), ("chr2", 200)]),
            sample("B", &[("chr1", 100)]),
        ];
        let lengths = scaffold_lengths(&samples).unwrap();
        let mut inputs = RunInputs {
            samples,
            lengths,
            scaffolds: vec!["chr1".to_string()],
            scaffold_list: None,
        };
        assert_eq!(inputs.compared_length(), 100);
        assert_eq!(inputs.genome_length(), 300);
        inputs.scaffold_list = Some(vec!["chr2".to_string(), "chrX".to_string()]);
        assert_eq!(inputs.genome_length(), 200);
    }

    #[test]
    fn model_from_error_rate() {
        let model = build_model(&CmpParams::default()).unwrap();
        assert_eq!(model.threshold(10), 3);
    }
}
