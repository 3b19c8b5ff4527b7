use crate::sclib::{LevelOverlap, MismatchLevel, NullModel, Position, VariantRecord, VariantTable};
use itertools::{EitherOrBoth, Itertools};
use std::collections::BTreeMap;

/// One sample's view of a merged position
#[derive(Debug, Clone, Copy)]
pub enum SideCall<'a> {
    /// The sample has a variant row here
    Called(&'a VariantRecord),
    /// No variant row: the sample's consensus is the reference base
    Reference(u8),
}

impl SideCall<'_> {
    pub fn con_base(&self) -> u8 {
        match self {
            SideCall::Called(rec) => rec.con_base.to_ascii_uppercase(),
            SideCall::Reference(base) => base.to_ascii_uppercase(),
        }
    }

    pub fn depth(&self) -> Option<u32> {
        match self {
            SideCall::Called(rec) => Some(rec.depth),
            SideCall::Reference(_) => None,
        }
    }
}

/// Both samples joined at one covered position
#[derive(Debug, Clone, Copy)]
pub struct MergedPosition<'a> {
    pub position: Position,
    pub side1: SideCall<'a>,
    pub side2: SideCall<'a>,
}

/// Classification of one merged position at one mismatch level
#[derive(Debug, Clone, PartialEq)]
pub struct SnpCall {
    pub position: Position,
    pub mm: MismatchLevel,
    pub con_base_1: u8,
    pub con_base_2: u8,
    pub ref_base: u8,
    pub depth_1: Option<u32>,
    pub depth_2: Option<u32>,
    pub consensus_snp: bool,
    pub population_snp: bool,
}

/// Calls consensus and population SNPs between two samples
pub struct SnpCaller<'a> {
    model: &'a NullModel,
    min_freq: f64,
}

impl<'a> SnpCaller<'a> {
    pub fn new(model: &'a NullModel, min_freq: f64) -> Self {
        Self { model, min_freq }
    }

    /// Classify every variable position of either sample at every overlap level
    pub fn call_levels(
        &self,
        table1: &VariantTable,
        table2: &VariantTable,
        overlaps: &[LevelOverlap],
    ) -> Vec<SnpCall> {
        overlaps
            .iter()
            .flat_map(|ov| self.call_level(table1, table2, ov))
            .collect()
    }

    pub fn call_level(
        &self,
        table1: &VariantTable,
        table2: &VariantTable,
        overlap: &LevelOverlap,
    ) -> Vec<SnpCall> {
        let s1 = restrict(table1, overlap);
        let s2 = restrict(table2, overlap);

        merge(&s1, &s2)
            .map(|m| SnpCall {
                position: m.position,
                mm: overlap.mm,
                con_base_1: m.side1.con_base(),
                con_base_2: m.side2.con_base(),
                ref_base: reference_base(&m),
                depth_1: m.side1.depth(),
                depth_2: m.side2.depth(),
                consensus_snp: consensus_snp(&m),
                population_snp: self.population_snp(&m),
            })
            .collect()
    }

    /// Population SNPs need the consensus bases to differ and neither sample to carry
    /// the other's allele above background, nor both to share a minor allele.
    pub fn population_snp(&self, m: &MergedPosition) -> bool {
        if m.side1.con_base() == m.side2.con_base() {
            return false;
        }

        match (m.side1, m.side2) {
            // Only one sample has a variant: is the reference still detectable in it?
            (SideCall::Called(rec), SideCall::Reference(base))
            | (SideCall::Reference(base), SideCall::Called(rec)) => !self.is_present(base, rec),
            (SideCall::Called(r1), SideCall::Called(r2)) => {
                if self.is_present(r1.con_base, r2) || self.is_present(r2.con_base, r1) {
                    return false;
                }
                let shared_minor = r1.allele_count > 1
                    && r2.allele_count > 1
                    && r1.var_base.is_some()
                    && r1.var_base.map(|b| b.to_ascii_uppercase())
                        == r2.var_base.map(|b| b.to_ascii_uppercase());
                !shared_minor
            }
            (SideCall::Reference(_), SideCall::Reference(_)) => false,
        }
    }

    fn is_present(&self, base: u8, rec: &VariantRecord) -> bool {
        self.model.is_present(rec.count(base), rec.depth, self.min_freq)
    }
}

pub fn consensus_snp(m: &MergedPosition) -> bool {
    m.side1.con_base() != m.side2.con_base()
}

fn reference_base(m: &MergedPosition) -> u8 {
    match (m.side1, m.side2) {
        (SideCall::Called(rec), _) | (_, SideCall::Called(rec)) => rec.ref_base.to_ascii_uppercase(),
        (SideCall::Reference(base), _) => base,
    }
}

/// Rows at covered positions, one per position, from the most permissive
/// mismatch level not above the overlap's level
fn restrict<'t>(table: &'t VariantTable, overlap: &LevelOverlap) -> BTreeMap<Position, &'t VariantRecord> {
    let mut ret = BTreeMap::new();
    // records are ordered by level so later rows win
    for rec in table
        .records()
        .iter()
        .filter(|r| r.mm <= overlap.mm && overlap.positions.contains(&r.position))
    {
        ret.insert(rec.position, rec);
    }
    ret
}

/// Outer join by position. A sample without a row gets the other's reference base
fn merge<'t>(
    s1: &'t BTreeMap<Position, &'t VariantRecord>,
    s2: &'t BTreeMap<Position, &'t VariantRecord>,
) -> impl Iterator<Item = MergedPosition<'t>> {
    s1.iter()
        .merge_join_by(s2.iter(), |a, b| a.0.cmp(b.0))
        .map(|pair| match pair {
            EitherOrBoth::Both((&position, &r1), (_, &r2)) => MergedPosition {
                position,
                side1: SideCall::Called(r1),
                side2: SideCall::Called(r2),
            },
            EitherOrBoth::Left((&position, &r1)) => MergedPosition {
                position,
                side1: SideCall::Called(r1),
                side2: SideCall::Reference(r1.ref_base),
            },
            EitherOrBoth::Right((&position, &r2)) => MergedPosition {
                position,
                side1: SideCall::Reference(r2.ref_base),
                side2: SideCall::Called(r2),
            },
        })
}
