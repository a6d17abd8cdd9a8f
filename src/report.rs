//! Per-type statistics for a typed corpus.

use std::{
    collections::HashMap,
    fmt::Write as FmtWrite,
    fs::File,
    io,
    path::Path,
};

use anyhow::{Context, Result};
use csv::Writer;
use tracing::*;

use crate::{Label, LabelMap, MatchReport, RuleList};

/// How often one rule's type occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCount {
    pub label: Label,
    pub pattern: String,
    /// Atoms carrying the type.
    pub atoms: usize,
    /// Molecules with at least one atom of the type.
    pub molecules: usize,
}

/// Type counts for every rule, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStatistics {
    pub counts: Vec<TypeCount>,
    pub total_molecules: usize,
}

impl TypeStatistics {
    pub fn compute(rules: &RuleList, labels: &LabelMap) -> Self {
        let mut atoms: HashMap<&Label, usize> = HashMap::new();
        let mut molecules: HashMap<&Label, usize> = HashMap::new();
        for molecule in labels.molecules() {
            let mut seen: Vec<&Label> = Vec::new();
            for label in molecule {
                *atoms.entry(label).or_default() += 1;
                if !seen.contains(&label) {
                    seen.push(label);
                    *molecules.entry(label).or_default() += 1;
                }
            }
        }

        let counts = rules
            .iter()
            .map(|rule| TypeCount {
                label: rule.label.clone(),
                pattern: rule.pattern.clone(),
                atoms: atoms.get(&rule.label).copied().unwrap_or(0),
                molecules: molecules.get(&rule.label).copied().unwrap_or(0),
            })
            .collect();
        Self {
            counts,
            total_molecules: labels.molecule_count(),
        }
    }

    pub fn get(&self, label: &Label) -> Option<&TypeCount> {
        self.counts.iter().find(|count| &count.label == label)
    }

    pub fn atoms(&self, label: &Label) -> usize {
        self.get(label).map_or(0, |count| count.atoms)
    }

    pub fn total_atoms(&self) -> usize {
        self.counts.iter().map(|count| count.atoms).sum()
    }

    /// A fixed-width table, with reference columns when `matches` is given.
    pub fn render(&self, matches: Option<&MatchReport>) -> String {
        let mut table = String::new();
        let _ = match matches {
            Some(_) => writeln!(
                table,
                "{:>5}   {:>10} {:>10}   {:>48} {:>48} {:>16} {:>16}",
                "INDEX", "ATOMS", "MOLECULES", "TYPE NAME", "PATTERN", "REFERENCE TYPE", "REFERENCE COUNT"
            ),
            None => writeln!(
                table,
                "{:>5}   {:>10} {:>10}   {:>48} {:>48}",
                "INDEX", "ATOMS", "MOLECULES", "TYPE NAME", "PATTERN"
            ),
        };

        for (index, count) in self.counts.iter().enumerate() {
            let _ = write!(
                table,
                "{:>5} : {:>10} {:>10} | {:>48} {:>48}",
                index + 1,
                count.atoms,
                count.molecules,
                count.label.as_str(),
                count.pattern
            );
            if let Some(report) = matches {
                let paired = report
                    .reference_for(&count.label)
                    .and_then(|m| m.reference.as_ref().map(|r| (r, m.count)));
                let _ = match paired {
                    Some((reference, n)) => write!(table, " {:>16} {:>16}", reference.as_str(), n),
                    None => write!(table, " {:>16} {:>16}", "", ""),
                };
            }
            table.push('\n');
        }

        let _ = match matches {
            Some(report) => write!(
                table,
                "{:>5} : {:>10} {:>10} |  {:>48} {:>48} {:>10} / {:>10} match ({:.3} %)",
                "TOTAL",
                self.total_atoms(),
                self.total_molecules,
                "",
                "",
                report.total_matched,
                report.total_atoms,
                report.fraction_matched() * 100.0
            ),
            None => write!(
                table,
                "{:>5} : {:>10} {:>10}",
                "TOTAL",
                self.total_atoms(),
                self.total_molecules
            ),
        };
        table
    }

    /// Write one CSV row per type.
    pub fn write_csv_to<W: io::Write>(&self, writer: W, matches: Option<&MatchReport>) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record([
            "index",
            "type",
            "pattern",
            "atoms",
            "molecules",
            "reference_type",
            "reference_count",
        ])?;
        for (index, count) in self.counts.iter().enumerate() {
            let paired = matches
                .and_then(|report| report.reference_for(&count.label))
                .and_then(|m| m.reference.as_ref().map(|r| (r.to_string(), m.count.to_string())))
                .unwrap_or_default();
            wtr.write_record([
                (index + 1).to_string(),
                count.label.to_string(),
                count.pattern.clone(),
                count.atoms.to_string(),
                count.molecules.to_string(),
                paired.0,
                paired.1,
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>, matches: Option<&MatchReport>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv_to(file, matches)?;
        info!("Type statistics written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReferenceScorer;

    fn setup() -> (RuleList, LabelMap) {
        let rules = RuleList::parse("[*:1] generic\n[#6:1] carbon\n[#7:1] nitrogen\n", "rules").unwrap();
        let labels = LabelMap::new(vec![
            vec![Label::new("carbon"), Label::new("carbon"), Label::new("generic")],
            vec![Label::new("carbon"), Label::new("generic")],
        ]);
        (rules, labels)
    }

    #[test]
    fn test_counts() {
        let (rules, labels) = setup();
        let stats = TypeStatistics::compute(&rules, &labels);
        let carbon = stats.get(&Label::new("carbon")).unwrap();
        assert_eq!((carbon.atoms, carbon.molecules), (3, 2));
        assert_eq!(stats.atoms(&Label::new("generic")), 2);
        assert_eq!(stats.atoms(&Label::new("nitrogen")), 0);
        assert_eq!(stats.total_atoms(), 5);
        assert_eq!(stats.total_molecules, 2);
    }

    #[test]
    fn test_render_table() {
        let (rules, labels) = setup();
        let stats = TypeStatistics::compute(&rules, &labels);
        let table = stats.render(None);
        assert_eq!(table.lines().count(), 5);
        assert!(table.lines().last().unwrap().starts_with("TOTAL :          5          2"));

        let report = ReferenceScorer::new(labels.clone()).score(&labels).unwrap();
        let table = stats.render(Some(&report));
        assert!(table.contains("REFERENCE TYPE"));
        assert!(table.ends_with("5 /          5 match (100.000 %)"));
    }

    #[test]
    fn test_write_csv() -> Result<()> {
        let (rules, labels) = setup();
        let stats = TypeStatistics::compute(&rules, &labels);
        let report = ReferenceScorer::new(labels.clone()).score(&labels)?;
        let mut buffer = Vec::new();
        stats.write_csv_to(&mut buffer, Some(&report))?;
        let text = String::from_utf8(buffer)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "index,type,pattern,atoms,molecules,reference_type,reference_count");
        assert_eq!(lines[2], "2,carbon,[#6:1],3,2,carbon,3");
        assert_eq!(lines[3], "3,nitrogen,[#7:1],0,0,,");
        Ok(())
    }
}
