extern crate pretty_env_logger;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_MIN_COV: u32 = 5;
pub const DEFAULT_MIN_FREQ: f64 = 0.05;
pub const DEFAULT_FDR: f64 = 1e-6;
pub const DEFAULT_THREADS: usize = 6;

#[derive(Parser, Clone, Debug)]
#[command(name = "straincmp")]
#[command(about = "Pairwise popANI / conANI comparison of strain profiles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

pub trait RcParams: std::fmt::Debug {
    fn validate(&self) -> bool;
    fn debug(&self) -> bool;
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(about = "Compare every pair of profiles on every shared scaffold")]
    Compare(CompareArgs),

    #[command(about = "Greedily cluster profiles against cluster representatives")]
    Greedy(GreedyArgs),
}

#[derive(Parser, Serialize, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub io: IOParams,

    #[command(flatten)]
    pub cmp: CmpParams,

    /// Highest mismatch level used for the genome-wide summary
    #[arg(long, default_value_t = 100, help_heading = "Comparison")]
    pub mm_ceiling: u32,
}

#[derive(Parser, Serialize, Debug, Clone)]
pub struct GreedyArgs {
    #[command(flatten)]
    pub io: IOParams,

    #[command(flatten)]
    pub cmp: CmpParams,

    #[command(flatten)]
    pub greedy: GreedyParams,
}

#[derive(clap::Args, Serialize, Clone, Debug)]
pub struct IOParams {
    /// Profile directories, all mapped to the same reference
    #[arg(short, long, num_args = 1.., required = true, help_heading = "I/O")]
    pub input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "straincmp_out", help_heading = "I/O")]
    pub output: PathBuf,

    /// Scaffold names to compare (one per line, or a fasta)
    #[arg(short, long, help_heading = "I/O")]
    pub scaffolds: Option<PathBuf>,

    /// Number of threads
    #[arg(short = 'p', long, default_value_t = DEFAULT_THREADS, help_heading = "I/O")]
    pub threads: usize,

    /// Seconds a scaffold may run before it's marked failed
    #[arg(long, help_heading = "I/O")]
    pub task_timeout: Option<u64>,

    /// Verbose logging
    #[arg(long, default_value_t = false, help_heading = "I/O")]
    pub debug: bool,
}

#[derive(clap::Args, Serialize, Clone, Debug)]
pub struct CmpParams {
    /// Minimum depth for a position to be compared
    #[arg(short = 'c', long, default_value_t = DEFAULT_MIN_COV, help_heading = "Comparison")]
    pub min_cov: u32,

    /// Minimum frequency for an allele to be present
    #[arg(short = 'f', long, default_value_t = DEFAULT_MIN_FREQ, help_heading = "Comparison")]
    pub min_freq: f64,

    /// False discovery rate of the allele detection model
    #[arg(long, default_value_t = DEFAULT_FDR, help_heading = "Comparison")]
    pub fdr: f64,

    /// Sequencing error rate for the built-in detection model
    #[arg(long, default_value_t = crate::sclib::nullmodel::DEFAULT_ERROR_RATE, help_heading = "Comparison")]
    pub error_rate: f64,

    /// Precomputed detection model table (overrides --error-rate)
    #[arg(long, help_heading = "Comparison")]
    pub null_model: Option<PathBuf>,

    /// Also compare each profile against itself
    #[arg(long, default_value_t = false, help_heading = "Comparison")]
    pub include_self_comparisons: bool,

    /// Keep the per-position SNP calls of every pair
    #[arg(long, default_value_t = false, help_heading = "Comparison")]
    pub store_mismatch_locations: bool,

    /// Keep the positions compared for every pair and mismatch level
    #[arg(long, default_value_t = false, help_heading = "Comparison")]
    pub store_coverage_overlap: bool,
}

impl Default for CmpParams {
    fn default() -> Self {
        Self {
            min_cov: DEFAULT_MIN_COV,
            min_freq: DEFAULT_MIN_FREQ,
            fdr: DEFAULT_FDR,
            error_rate: crate::sclib::nullmodel::DEFAULT_ERROR_RATE,
            null_model: None,
            include_self_comparisons: false,
            store_mismatch_locations: false,
            store_coverage_overlap: false,
        }
    }
}

#[derive(clap::Args, Serialize, Clone, Debug)]
pub struct GreedyParams {
    /// Minimum popANI to join a cluster
    #[arg(long, default_value_t = 0.99, help_heading = "Greedy")]
    pub g_ani: f64,

    /// Minimum genome coverage to join a cluster
    #[arg(long, default_value_t = 0.5, help_heading = "Greedy")]
    pub g_cov: f64,

    /// Highest mismatch level considered
    #[arg(long, default_value_t = 100, help_heading = "Greedy")]
    pub g_mm: u32,
}

impl Default for GreedyParams {
    fn default() -> Self {
        Self {
            g_ani: 0.99,
            g_cov: 0.5,
            g_mm: 100,
        }
    }
}

impl RcParams for CompareArgs {
    fn debug(&self) -> bool {
        self.io.debug
    }

    fn validate(&self) -> bool {
        validate_io(&self.io) & validate_cmp(&self.cmp)
    }
}

impl RcParams for GreedyArgs {
    fn debug(&self) -> bool {
        self.io.debug
    }

    fn validate(&self) -> bool {
        let mut is_ok = validate_io(&self.io) & validate_cmp(&self.cmp);

        if !(0.0..=1.0).contains(&self.greedy.g_ani) {
            error!("--g-ani must be between 0.0 and 1.0");
            is_ok = false;
        }

        if !(0.0..=1.0).contains(&self.greedy.g_cov) {
            error!("--g-cov must be between 0.0 and 1.0");
            is_ok = false;
        }

        is_ok
    }
}

fn validate_io(io: &IOParams) -> bool {
    let mut is_ok = true;

    if io.input.len() < 2 {
        error!("--input needs at least two profiles");
        is_ok = false;
    }

    // Missing profiles are skipped at load time
    for path in io.input.iter().filter(|p| !p.is_dir()) {
        warn!("--input {} is not a directory", path.display());
    }

    if let Some(path) = &io.scaffolds {
        if !path.is_file() {
            error!("--scaffolds {} does not exist", path.display());
            is_ok = false;
        }
    }

    if io.threads < 1 {
        error!("--threads must be at least 1");
        is_ok = false;
    }

    if io.task_timeout == Some(0) {
        error!("--task-timeout must be at least 1");
        is_ok = false;
    }

    is_ok
}

fn validate_cmp(cmp: &CmpParams) -> bool {
    let mut is_ok = true;

    if !(0.0..=1.0).contains(&cmp.min_freq) {
        error!("--min-freq must be between 0.0 and 1.0");
        is_ok = false;
    }

    if !(cmp.fdr > 0.0 && cmp.fdr < 1.0) {
        error!("--fdr must be between 0.0 and 1.0 (exclusive)");
        is_ok = false;
    }

    if !(cmp.error_rate > 0.0 && cmp.error_rate < 1.0) {
        error!("--error-rate must be between 0.0 and 1.0 (exclusive)");
        is_ok = false;
    }

    if let Some(path) = &cmp.null_model {
        if !path.is_file() {
            error!("--null-model {} does not exist", path.display());
            is_ok = false;
        }
    }

    if cmp.min_cov == 0 {
        warn!("--min-cov 0 compares every position with any reads");
    }

    is_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["straincmp", "compare", "-i", "a", "b"]);
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.io.threads, 6);
        assert_eq!(args.cmp.min_cov, 5);
        assert_eq!(args.cmp.min_freq, 0.05);
        assert_eq!(args.cmp.fdr, 1e-6);
        assert!(!args.cmp.include_self_comparisons);
        assert!(!args.cmp.store_mismatch_locations);
        assert!(!args.cmp.store_coverage_overlap);
        assert_eq!(args.mm_ceiling, 100);
        assert_eq!(args.io.input.len(), 2);
    }

    #[test]
    fn greedy_thresholds() {
        let cli = Cli::parse_from(["straincmp", "greedy", "-i", "a", "b", "--g-ani", "0.95"]);
        let Commands::Greedy(mut args) = cli.command else {
            panic!("expected greedy");
        };
        assert_eq!(args.greedy.g_ani, 0.95);
        assert_eq!(args.greedy.g_cov, 0.5);
        assert_eq!(args.greedy.g_mm, 100);
        // missing inputs only warn here, they're skipped at load time
        assert!(args.validate());
        args.greedy.g_cov = 1.5;
        assert!(!args.validate());
    }

    #[test]
    fn bad_numbers() {
        let cli = Cli::parse_from([
            "straincmp", "compare", "-i", "a", "b", "--min-freq", "2.0", "--fdr", "0",
        ]);
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert!(!validate_cmp(&args.cmp));
        assert!(validate_cmp(&CmpParams::default()));
    }
}
