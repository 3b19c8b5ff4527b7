use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type Position = u64;
pub type MismatchLevel = u32;

/// Base order of the per-base count arrays
pub const BASES: [u8; 4] = *b"ACTG";

pub fn base_index(base: u8) -> Option<usize> {
    let base = base.to_ascii_uppercase();
    BASES.iter().position(|&b| b == base)
}

/// Depth contributed at each mismatch level for one sample on one scaffold.
///
/// Level `mm` holds the depth of reads with exactly `mm` mismatches, so the
/// cumulative depth at level N is the sum over every level <= N.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageByMismatch {
    levels: BTreeMap<MismatchLevel, HashMap<Position, u32>>,
}

impl CoverageByMismatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mm: MismatchLevel, position: Position, depth: u32) {
        let entry = self
            .levels
            .entry(mm)
            .or_default()
            .entry(position)
            .or_insert(0);
        *entry = entry.saturating_add(depth);
    }

    /// Add `depth` for every position in `start..=end`
    pub fn add_span(&mut self, mm: MismatchLevel, start: Position, end: Position, depth: u32) {
        for position in start..=end {
            self.add(mm, position, depth);
        }
    }

    pub fn level(&self, mm: MismatchLevel) -> Option<&HashMap<Position, u32>> {
        self.levels.get(&mm)
    }

    /// Mismatch levels with any data, ascending
    pub fn mm_levels(&self) -> impl Iterator<Item = MismatchLevel> + '_ {
        self.levels.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// One variable position at one mismatch level
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub position: Position,
    pub mm: MismatchLevel,
    pub con_base: u8,
    pub ref_base: u8,
    pub var_base: Option<u8>,
    pub depth: u32,
    /// Read counts in `BASES` order
    pub counts: [u32; 4],
    /// Number of alleles observed above background
    pub allele_count: u32,
}

impl VariantRecord {
    pub fn count(&self, base: u8) -> u32 {
        base_index(base).map_or(0, |i| self.counts[i])
    }
}

/// Variant rows for one sample on one scaffold, ordered by mismatch level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantTable {
    records: Vec<VariantRecord>,
}

impl VariantTable {
    pub fn new(mut records: Vec<VariantRecord>) -> Self {
        // stable so rows at the same level keep their input order
        records.sort_by_key(|r| r.mm);
        Self { records }
    }

    pub fn records(&self) -> &[VariantRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read-only lookups into one sample's profile
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &str;

    /// Scaffolds this sample has coverage for
    fn scaffolds(&self) -> Vec<&str>;

    fn scaffold_length(&self, scaffold: &str) -> Option<u64>;

    fn coverage(&self, scaffold: &str) -> Option<&CoverageByMismatch>;

    /// None when the sample has no variable positions on the scaffold
    fn variants(&self, scaffold: &str) -> Option<&VariantTable>;

    fn scaffold_lengths(&self) -> Vec<(&str, u64)>;
}

/// Handle to a sample shared across worker threads
pub type SampleHandle = Arc<dyn ProfileSource>;

/// In-memory profile
#[derive(Debug, Clone, Default)]
pub struct SampleProfile {
    name: String,
    lengths: IndexMap<String, u64>,
    coverage: IndexMap<String, CoverageByMismatch>,
    variants: HashMap<String, VariantTable>,
}

impl SampleProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn set_length(&mut self, scaffold: &str, length: u64) {
        self.lengths.insert(scaffold.to_string(), length);
    }

    pub fn insert_coverage(&mut self, scaffold: &str, coverage: CoverageByMismatch) {
        self.coverage.insert(scaffold.to_string(), coverage);
    }

    pub fn insert_variants(&mut self, scaffold: &str, table: VariantTable) {
        self.variants.insert(scaffold.to_string(), table);
    }

    pub fn coverage_mut(&mut self, scaffold: &str) -> &mut CoverageByMismatch {
        self.coverage.entry(scaffold.to_string()).or_default()
    }

    pub fn into_handle(self) -> SampleHandle {
        Arc::new(self)
    }
}

impl ProfileSource for SampleProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn scaffolds(&self) -> Vec<&str> {
        self.coverage.keys().map(|k| k.as_str()).collect()
    }

    fn scaffold_length(&self, scaffold: &str) -> Option<u64> {
        self.lengths.get(scaffold).copied()
    }

    fn coverage(&self, scaffold: &str) -> Option<&CoverageByMismatch> {
        self.coverage.get(scaffold)
    }

    fn variants(&self, scaffold: &str) -> Option<&VariantTable> {
        self.variants.get(scaffold)
    }

    fn scaffold_lengths(&self) -> Vec<(&str, u64)> {
        self.lengths.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(position: Position, mm: MismatchLevel) -> VariantRecord {
        VariantRecord {
            position,
            mm,
            con_base: b'A',
            ref_base: b'A',
            var_base: None,
            depth: 10,
            counts: [10, 0, 0, 0],
            allele_count: 1,
        }
    }

    #[test]
    fn coverage_accumulates_within_level() {
        let mut cov = CoverageByMismatch::new();
        cov.add(0, 5, 3);
        cov.add(0, 5, 4);
        cov.add_span(2, 1, 3, 1);
        assert_eq!(cov.level(0).unwrap()[&5], 7);
        assert_eq!(cov.level(2).unwrap().len(), 3);
        assert_eq!(cov.mm_levels().collect::<Vec<_>>(), vec![0, 2]);
        assert!(cov.level(1).is_none());
    }

    #[test]
    fn table_sorted_by_level() {
        let table = VariantTable::new(vec![record(1, 3), record(2, 0), record(3, 3), record(4, 1)]);
        let order: Vec<_> = table.records().iter().map(|r| r.position).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn base_counts() {
        let mut rec = record(1, 0);
        rec.counts = [4, 6, 0, 1];
        assert_eq!(rec.count(b'A'), 4);
        assert_eq!(rec.count(b'c'), 6);
        assert_eq!(rec.count(b'G'), 1);
        assert_eq!(rec.count(b'N'), 0);
    }

    #[test]
    fn profile_lookups() {
        let mut prof = SampleProfile::new("s1");
        prof.set_length("chr1", 100);
        prof.coverage_mut("chr1").add(0, 1, 5);
        let handle = prof.into_handle();
        assert_eq!(handle.name(), "s1");
        assert_eq!(handle.scaffolds(), vec!["chr1"]);
        assert_eq!(handle.scaffold_length("chr1"), Some(100));
        assert!(handle.variants("chr1").is_none());
        assert!(handle.coverage("chr2").is_none());
    }
}
