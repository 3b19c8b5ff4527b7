use crate::sclib::{ProfileSource, RcError, SampleProfile, VariantRecord, VariantTable};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::FromStr;

pub const LENGTHS_FILE: &str = "scaffold_lengths.tsv";
pub const COVERAGE_FILE: &str = "coverage.tsv";
pub const SNVS_FILE: &str = "snvs.tsv";

type FileHandler = io::Lines<io::BufReader<File>>;

fn read_lines(path: &Path) -> Result<FileHandler, RcError> {
    let file = File::open(path).map_err(|e| {
        RcError::Config(format!("unable to open {}: {}", path.display(), e))
    })?;
    Ok(io::BufReader::new(file).lines())
}

/// Numbered, non-empty, non-comment lines of a table
fn data_lines(path: &Path) -> Result<Vec<(usize, String)>, RcError> {
    let mut ret = vec![];
    for (idx, line) in read_lines(path)?.enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        ret.push((idx + 1, line.to_string()));
    }
    Ok(ret)
}

fn parse_field<T: FromStr>(path: &Path, line: usize, value: &str, column: &str) -> Result<T, RcError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| RcError::parse(path, line, format!("bad {} '{}'", column, value)))
}

fn split_exact<'a>(path: &Path, line_no: usize, line: &'a str, n: usize) -> Result<Vec<&'a str>, RcError> {
    let collection: Vec<&str> = line.split('\t').collect();
    if collection.len() < n {
        return Err(RcError::parse(
            path,
            line_no,
            format!("expected {} columns, found {}", n, collection.len()),
        ));
    }
    Ok(collection)
}

/// Load one profile directory. The sample is named after the directory
pub fn load_profile(dir: &Path) -> Result<SampleProfile, RcError> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RcError::Config(format!("can't name a sample from {}", dir.display())))?;
    let mut profile = SampleProfile::new(name);

    load_lengths(&dir.join(LENGTHS_FILE), &mut profile)?;
    load_coverage(&dir.join(COVERAGE_FILE), &mut profile)?;

    let snvs = dir.join(SNVS_FILE);
    if snvs.is_file() {
        load_variants(&snvs, &mut profile)?;
    } else {
        debug!("{} has no {}", name, SNVS_FILE);
    }

    Ok(profile)
}

fn load_lengths(path: &Path, profile: &mut SampleProfile) -> Result<(), RcError> {
    for (line_no, line) in data_lines(path)? {
        let collection = split_exact(path, line_no, &line, 2)?;
        if collection[0] == "scaffold" {
            continue;
        }
        let length: u64 = parse_field(path, line_no, collection[1], "length")?;
        profile.set_length(collection[0], length);
    }
    Ok(())
}

fn load_coverage(path: &Path, profile: &mut SampleProfile) -> Result<(), RcError> {
    for (line_no, line) in data_lines(path)? {
        let collection = split_exact(path, line_no, &line, 4)?;
        if collection[0] == "scaffold" {
            continue;
        }
        let scaffold = collection[0];
        if profile.scaffold_length(scaffold).is_none() {
            return Err(RcError::parse(
                path,
                line_no,
                format!("scaffold {} has no length in {}", scaffold, LENGTHS_FILE),
            ));
        }
        let mm = parse_field(path, line_no, collection[1], "mm")?;
        let position = parse_field(path, line_no, collection[2], "position")?;
        let depth = parse_field(path, line_no, collection[3], "depth")?;
        profile.coverage_mut(scaffold).add(mm, position, depth);
    }
    Ok(())
}

/// Column positions of the snvs table, found from its header
struct SnvColumns {
    scaffold: usize,
    position: usize,
    mm: usize,
    con_base: usize,
    ref_base: usize,
    var_base: usize,
    depth: usize,
    counts: [usize; 4],
    allele_count: usize,
}

impl SnvColumns {
    fn from_header(path: &Path, line_no: usize, header: &str) -> Result<Self, RcError> {
        let names: HashMap<&str, usize> = header
            .split('\t')
            .enumerate()
            .map(|(i, n)| (n.trim(), i))
            .collect();
        let col = |n: &str| {
            names
                .get(n)
                .copied()
                .ok_or_else(|| RcError::parse(path, line_no, format!("missing column {}", n)))
        };
        // older profiles call the allele count "morphia"
        let allele_count = col("allele_count").or_else(|_| col("morphia"))?;

        Ok(Self {
            scaffold: col("scaffold")?,
            position: col("position")?,
            mm: col("mm")?,
            con_base: col("con_base")?,
            ref_base: col("ref_base")?,
            var_base: col("var_base")?,
            depth: col("base_coverage")?,
            counts: [col("A")?, col("C")?, col("T")?, col("G")?],
            allele_count,
        })
    }

    /// Columns a row needs to have
    fn width(&self) -> usize {
        let last = [
            self.scaffold,
            self.position,
            self.mm,
            self.con_base,
            self.ref_base,
            self.var_base,
            self.depth,
            self.allele_count,
        ]
        .into_iter()
        .chain(self.counts)
        .max()
        .unwrap_or(0);
        last + 1
    }
}

fn parse_base(path: &Path, line: usize, value: &str, column: &str) -> Result<u8, RcError> {
    match value.trim().as_bytes() {
        [b] => Ok(b.to_ascii_uppercase()),
        _ => Err(RcError::parse(path, line, format!("bad {} '{}'", column, value))),
    }
}

fn load_variants(path: &Path, profile: &mut SampleProfile) -> Result<(), RcError> {
    let mut lines = data_lines(path)?.into_iter();
    let Some((header_no, header)) = lines.next() else {
        return Ok(());
    };
    let cols = SnvColumns::from_header(path, header_no, &header)?;
    let width = cols.width();

    let mut per_scaffold: HashMap<String, Vec<VariantRecord>> = HashMap::new();
    for (line_no, line) in lines {
        let collection = split_exact(path, line_no, &line, width)?;
        let var_base = match collection[cols.var_base].trim() {
            "" | "NA" | "nan" | "." => None,
            v => Some(parse_base(path, line_no, v, "var_base")?),
        };
        let mut counts = [0u32; 4];
        for (slot, &idx) in counts.iter_mut().zip(cols.counts.iter()) {
            *slot = parse_field(path, line_no, collection[idx], "base count")?;
        }

        per_scaffold
            .entry(collection[cols.scaffold].to_string())
            .or_default()
            .push(VariantRecord {
                position: parse_field(path, line_no, collection[cols.position], "position")?,
                mm: parse_field(path, line_no, collection[cols.mm], "mm")?,
                con_base: parse_base(path, line_no, collection[cols.con_base], "con_base")?,
                ref_base: parse_base(path, line_no, collection[cols.ref_base], "ref_base")?,
                var_base,
                depth: parse_field(path, line_no, collection[cols.depth], "base_coverage")?,
                counts,
                allele_count: parse_field(
                    path,
                    line_no,
                    collection[cols.allele_count],
                    "allele_count",
                )?,
            });
    }

    for (scaffold, records) in per_scaffold {
        profile.insert_variants(&scaffold, VariantTable::new(records));
    }
    Ok(())
}

/// Scaffold names from a list file, one per line, or from the headers of a fasta
pub fn load_scaffold_list(path: &Path) -> Result<Vec<String>, RcError> {
    let lines = data_lines(path)?;
    let is_fasta = lines.first().is_some_and(|(_, l)| l.starts_with('>'));

    let names: IndexSet<String> = lines
        .iter()
        .filter_map(|(_, line)| {
            if is_fasta {
                line.strip_prefix('>')
                    .and_then(|h| h.split_whitespace().next())
                    .map(|n| n.to_string())
            } else {
                line.split_whitespace().next().map(|n| n.to_string())
            }
        })
        .collect();

    Ok(names.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_profile(root: &Path, name: &str, snvs: Option<&str>) -> std::path::PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(LENGTHS_FILE), "scaffold\tlength\nchr1\t1000\nchr2\t50\n").unwrap();
        fs::write(
            dir.join(COVERAGE_FILE),
            "scaffold\tmm\tposition\tdepth\nchr1\t0\t10\t7\nchr1\t2\t10\t3\nchr1\t0\t11\t5\n",
        )
        .unwrap();
        if let Some(text) = snvs {
            fs::write(dir.join(SNVS_FILE), text).unwrap();
        }
        dir
    }

    #[test]
    fn loads_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let snvs = "scaffold\tposition\tmm\tcon_base\tref_base\tvar_base\tbase_coverage\tA\tC\tT\tG\tallele_count\n\
                    chr1\t10\t2\tC\tA\tA\t10\t4\t6\t0\t0\t2\n\
                    chr1\t10\t0\tC\tA\tA\t7\t2\t5\t0\t0\t1\n";
        let dir = write_profile(tmp.path(), "sample_1", Some(snvs));

        let prof = load_profile(&dir).unwrap();
        assert_eq!(prof.name(), "sample_1");
        assert_eq!(prof.scaffold_length("chr2"), Some(50));
        assert_eq!(prof.scaffolds(), vec!["chr1"]);

        let cov = prof.coverage("chr1").unwrap();
        assert_eq!(cov.level(0).unwrap()[&10], 7);
        assert_eq!(cov.level(2).unwrap()[&10], 3);

        let table = prof.variants("chr1").unwrap();
        assert_eq!(table.len(), 2);
        // ordered by mismatch level
        assert_eq!(table.records()[0].mm, 0);
        assert_eq!(table.records()[1].counts, [4, 6, 0, 0]);
        assert_eq!(table.records()[1].allele_count, 2);
    }

    #[test]
    fn legacy_allele_column() {
        let tmp = tempfile::tempdir().unwrap();
        let snvs = "scaffold\tposition\tmm\tcon_base\tref_base\tvar_base\tbase_coverage\tA\tC\tT\tG\tmorphia\n\
                    chr1\t11\t0\tg\tA\t\t5\t0\t0\t0\t5\t1\n";
        let dir = write_profile(tmp.path(), "old", Some(snvs));
        let prof = load_profile(&dir).unwrap();
        let rec = &prof.variants("chr1").unwrap().records()[0];
        assert_eq!(rec.allele_count, 1);
        assert_eq!(rec.con_base, b'G');
        assert_eq!(rec.var_base, None);
    }

    #[test]
    fn no_snvs_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_profile(tmp.path(), "plain", None);
        let prof = load_profile(&dir).unwrap();
        assert!(prof.variants("chr1").is_none());
    }

    #[test]
    fn bad_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_profile(tmp.path(), "bad", Some("scaffold\tposition\n"));
        assert!(matches!(load_profile(&dir), Err(RcError::Parse { .. })));

        let dir = write_profile(tmp.path(), "unknown", None);
        fs::write(dir.join(COVERAGE_FILE), "chr9\t0\t1\t5\n").unwrap();
        assert!(matches!(load_profile(&dir), Err(RcError::Parse { line: 1, .. })));

        let dir = write_profile(tmp.path(), "notanumber", None);
        fs::write(dir.join(COVERAGE_FILE), "chr1\t0\tten\t5\n").unwrap();
        assert!(load_profile(&dir).is_err());

        assert!(load_profile(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn scaffold_lists() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("list.txt");
        fs::write(&plain, "chr1\n\nchr2\nchr1\n").unwrap();
        assert_eq!(load_scaffold_list(&plain).unwrap(), vec!["chr1", "chr2"]);

        let fasta = tmp.path().join("ref.fa");
        fs::write(&fasta, ">chr1 first contig\nACGT\nAC\n>chr3\nGG\n").unwrap();
        assert_eq!(load_scaffold_list(&fasta).unwrap(), vec!["chr1", "chr3"]);
    }
}
