use crate::sclib::RcError;
use statrs::distribution::{Binomial, DiscreteCDF};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Per-read probability of an error producing a given non-reference base (Q30)
pub const DEFAULT_ERROR_RATE: f64 = 0.001;
/// Deepest depth tabulated when the model is built analytically
pub const DEFAULT_MAX_DEPTH: u32 = 10_000;

/// Depth-indexed detection thresholds.
///
/// For a sequencing depth `d`, `threshold(d)` is the smallest count of reads that
/// has a probability below the false discovery rate of arising from sequencing
/// error alone. The model is immutable once built and shared between all workers.
#[derive(Debug, Clone)]
pub struct NullModel {
    thresholds: BTreeMap<u32, u32>,
    fdr: f64,
}

impl NullModel {
    /// Load a precomputed table.
    ///
    /// Each row is a depth followed by the chance probabilities of observing at least
    /// 0, 1, 2, ... non-reference reads at that depth. The threshold for the row is the
    /// first count whose probability falls under `fdr`.
    pub fn from_path(path: &Path, fdr: f64) -> Result<Self, RcError> {
        let file = File::open(path).map_err(|e| {
            RcError::NullModel(format!("unable to open {}: {}", path.display(), e))
        })?;
        Self::from_reader(BufReader::new(file), fdr)
    }

    pub fn from_reader<R: BufRead>(reader: R, fdr: f64) -> Result<Self, RcError> {
        check_fdr(fdr)?;
        let mut thresholds = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RcError::NullModel(format!("line {}: {}", idx + 1, e)))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.contains("coverage") {
                continue;
            }

            let mut fields = line.split_whitespace();
            let depth = fields
                .next()
                .and_then(|d| d.parse::<u32>().ok())
                .ok_or_else(|| RcError::NullModel(format!("line {}: bad depth", idx + 1)))?;

            let mut found = None;
            for (count, field) in fields.enumerate() {
                let prob: f64 = field.parse().map_err(|_| {
                    RcError::NullModel(format!("line {}: bad probability {}", idx + 1, field))
                })?;
                if prob < fdr {
                    found = Some(count as u32);
                    break;
                }
            }
            if let Some(count) = found {
                thresholds.insert(depth, count);
            }
        }

        if thresholds.is_empty() {
            return Err(RcError::NullModel(format!(
                "table defines no thresholds at fdr {}",
                fdr
            )));
        }
        debug!("loaded null model with {} depths", thresholds.len());
        Ok(Self { thresholds, fdr })
    }

    /// Build the table from the binomial tail of i.i.d. sequencing errors
    pub fn binomial(error_rate: f64, max_depth: u32, fdr: f64) -> Result<Self, RcError> {
        check_fdr(fdr)?;
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(RcError::NullModel(format!(
                "error rate {} outside (0, 1)",
                error_rate
            )));
        }
        if max_depth == 0 {
            return Err(RcError::NullModel("max depth must be at least 1".to_string()));
        }

        // the tail only grows with depth, so each search resumes from the last threshold
        let mut thresholds = BTreeMap::new();
        let mut floor = 1;
        for depth in 1..=max_depth {
            floor = binomial_threshold(depth, error_rate, fdr, floor)?;
            thresholds.insert(depth, floor);
        }
        debug!(
            "built null model to depth {} at error rate {}",
            max_depth, error_rate
        );
        Ok(Self { thresholds, fdr })
    }

    /// Minimum supporting read count at `depth`.
    /// Depths missing from the table use the nearest defined depth below them,
    /// or the smallest defined depth when nothing lies below.
    pub fn threshold(&self, depth: u32) -> u32 {
        self.thresholds
            .range(..=depth)
            .next_back()
            .or_else(|| self.thresholds.range(depth..).next())
            .map_or(u32::MAX, |(_, t)| *t)
    }

    /// Is a base observed `count` times in `depth` reads above background?
    /// Zero depth can't be evaluated and is never present.
    pub fn is_present(&self, count: u32, depth: u32, min_freq: f64) -> bool {
        if depth == 0 {
            return false;
        }
        count >= self.threshold(depth) && (count as f64 / depth as f64) >= min_freq
    }

    pub fn fdr(&self) -> f64 {
        self.fdr
    }

    pub fn max_depth(&self) -> u32 {
        self.thresholds.keys().next_back().copied().unwrap_or(0)
    }
}

fn check_fdr(fdr: f64) -> Result<(), RcError> {
    if fdr > 0.0 && fdr < 1.0 {
        Ok(())
    } else {
        Err(RcError::NullModel(format!("fdr {} outside (0, 1)", fdr)))
    }
}

/// Smallest k >= `floor` with P(X >= k) < fdr for X ~ Binomial(depth, error_rate)
fn binomial_threshold(depth: u32, error_rate: f64, fdr: f64, floor: u32) -> Result<u32, RcError> {
    let dist = Binomial::new(error_rate, depth as u64)
        .map_err(|e| RcError::NullModel(format!("binomial at depth {}: {}", depth, e)))?;
    let mut k = floor.max(1);
    // sf(k - 1) is P(X >= k)
    while k <= depth && dist.sf((k - 1) as u64) >= fdr {
        k += 1;
    }
    Ok(k)
}
