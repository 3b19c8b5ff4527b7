use crate::sclib::{CoverageByMismatch, MismatchLevel, Position};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Positions covered at or above the minimum depth in both samples
pub type OverlapSet = BTreeSet<Position>;

/// Coverage overlap of a sample pair at one mismatch level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOverlap {
    pub mm: MismatchLevel,
    pub positions: OverlapSet,
    /// covered in both / covered in either, 0 when neither is covered
    pub fraction: f64,
}

impl LevelOverlap {
    pub fn compared_bases(&self) -> u64 {
        self.positions.len() as u64
    }
}

/// Running cumulative depth of one sample as mismatch levels are added
#[derive(Default)]
struct RunningCoverage {
    depth: HashMap<Position, u32>,
    covered: HashSet<Position>,
}

impl RunningCoverage {
    /// Add one level's contributions and return positions that just reached `min_cov`
    fn add_level(&mut self, level: Option<&HashMap<Position, u32>>, min_cov: u32) -> Vec<Position> {
        let mut newly = vec![];
        for (&pos, &add) in level.into_iter().flatten() {
            let d = self.depth.entry(pos).or_insert(0);
            *d = d.saturating_add(add);
            if *d >= min_cov && self.covered.insert(pos) {
                newly.push(pos);
            }
        }
        newly
    }
}

/// Compute the coverage overlap at every mismatch level present in either sample.
///
/// Depth is accumulated level by level, so each position is touched once per level
/// it has data at. A position covered at level M stays covered at every level N > M.
pub fn mm_overlaps(
    cov1: &CoverageByMismatch,
    cov2: &CoverageByMismatch,
    min_cov: u32,
) -> Vec<LevelOverlap> {
    let levels: BTreeSet<MismatchLevel> = cov1.mm_levels().chain(cov2.mm_levels()).collect();

    let mut run1 = RunningCoverage::default();
    let mut run2 = RunningCoverage::default();
    let mut both = OverlapSet::new();
    let mut ret = Vec::with_capacity(levels.len());

    for mm in levels {
        let new1 = run1.add_level(cov1.level(mm), min_cov);
        let new2 = run2.add_level(cov2.level(mm), min_cov);

        both.extend(new1.into_iter().filter(|p| run2.covered.contains(p)));
        both.extend(new2.into_iter().filter(|p| run1.covered.contains(p)));

        let either = run1.covered.len() + run2.covered.len() - both.len();
        let fraction = if either > 0 {
            both.len() as f64 / either as f64
        } else {
            0.0
        };

        ret.push(LevelOverlap {
            mm,
            positions: both.clone(),
            fraction,
        });
    }

    ret
}
