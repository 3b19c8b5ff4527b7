#[macro_use]
extern crate log;

mod sclib;
pub use self::{
    sclib::build_model, sclib::build_tasks, sclib::compare_main, sclib::compare_scaffold,
    sclib::genome_summary, sclib::greedy_main, sclib::load_inputs, sclib::load_profile,
    sclib::load_scaffold_list, sclib::mm_overlaps, sclib::nullmodel, sclib::pair_key,
    sclib::pairwise_summaries, sclib::profileparser, sclib::shared_scaffolds, sclib::writer,
    sclib::Cli, sclib::ClusterState, sclib::CmpParams, sclib::Commands, sclib::CompareArgs,
    sclib::ComparisonRow, sclib::ComparisonScheduler, sclib::ComparisonSet,
    sclib::CoverageByMismatch, sclib::GenomeComparer, sclib::GenomeSummary, sclib::GreedyArgs,
    sclib::GreedyClusterer, sclib::GreedyParams, sclib::GreedyResult, sclib::IOParams,
    sclib::LevelOverlap, sclib::MergedPosition, sclib::NullModel, sclib::PairComparison,
    sclib::PairSummary, sclib::PoolKind, sclib::ProfileSource, sclib::RcError, sclib::RcParams,
    sclib::RunInputs, sclib::SampleHandle, sclib::SampleProfile, sclib::ScaffoldComparison,
    sclib::ScaffoldJob, sclib::ScaffoldOutcome, sclib::ScaffoldTask, sclib::ScheduledComparer,
    sclib::SideCall, sclib::SnpCall, sclib::SnpCaller, sclib::VariantRecord, sclib::VariantTable,
};
