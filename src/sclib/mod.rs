mod aggregate;
pub use crate::sclib::aggregate::{genome_summary, pairwise_summaries, GenomeSummary, PairSummary};

mod cli;
pub use crate::sclib::cli::{
    Cli, CmpParams, Commands, CompareArgs, GreedyArgs, GreedyParams, IOParams, RcParams,
};

mod comparator;
pub use crate::sclib::comparator::{
    build_tasks, compare_scaffold, pair_key, ComparisonRow, PairOverlaps, ScaffoldComparison,
    ScaffoldOutcome, ScaffoldTask, SnpLocation,
};

mod errors;
pub use crate::sclib::errors::RcError;

mod greedy;
pub use crate::sclib::greedy::{
    ClusterState, GenomeComparer, GreedyClusterer, GreedyComparison, GreedyResult,
    PairComparison, ScheduledComparer,
};

pub mod nullmodel;
pub use crate::sclib::nullmodel::NullModel;

mod overlap;
pub use crate::sclib::overlap::{mm_overlaps, LevelOverlap, OverlapSet};

mod profile;
pub use crate::sclib::profile::{
    CoverageByMismatch, MismatchLevel, Position, ProfileSource, SampleHandle, SampleProfile,
    VariantRecord, VariantTable,
};

pub mod profileparser;
pub use crate::sclib::profileparser::{load_profile, load_scaffold_list};

mod runner;
pub use crate::sclib::runner::{
    build_model, compare_main, greedy_main, load_inputs, shared_scaffolds, RunInputs,
};

mod scheduler;
pub use crate::sclib::scheduler::{ComparisonScheduler, ComparisonSet, PoolKind, ScaffoldJob};

mod snpcaller;
pub use crate::sclib::snpcaller::{MergedPosition, SideCall, SnpCall, SnpCaller};

pub mod writer;
