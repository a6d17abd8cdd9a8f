//! Scoring a labeling against a reference labeling.
//!
//! Type names of the two labelings need not agree. The score is the number
//! of atoms that agree under the best one-to-one renaming of current types
//! to reference types, found as a maximum-weight bipartite matching.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

use thiserror::Error;
use tracing::*;

use crate::{Label, LabelMap};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error(
        "Labelings differ in shape: {current_atoms} atoms in {current_molecules} molecules, \
         reference has {reference_atoms} atoms in {reference_molecules} molecules"
    )]
    Shape {
        current_molecules: usize,
        current_atoms: usize,
        reference_molecules: usize,
        reference_atoms: usize,
    },
}

/// The reference type paired with one current type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatch {
    pub current: Label,
    pub reference: Option<Label>,
    /// Atoms carrying both types. Zero when unmatched.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// One entry per current type, in order of first appearance.
    pub matches: Vec<TypeMatch>,
    pub total_matched: usize,
    pub total_atoms: usize,
}

impl MatchReport {
    pub fn reference_for(&self, current: &Label) -> Option<&TypeMatch> {
        self.matches.iter().find(|m| &m.current == current)
    }

    pub fn fraction_matched(&self) -> f64 {
        if self.total_atoms == 0 {
            return 0.0;
        }
        self.total_matched as f64 / self.total_atoms as f64
    }
}

impl Display for MatchReport {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        writeln!(f, "Atom type matches:")?;
        for m in &self.matches {
            match &m.reference {
                Some(reference) => writeln!(
                    f,
                    "{:<64} matches {:>8} : {:>8} atoms matched",
                    m.current.as_str(),
                    reference.as_str(),
                    m.count
                )?,
                None => writeln!(f, "{:<64}         no match", m.current.as_str())?,
            }
        }
        write!(
            f,
            "{} / {} total atoms match ({:.3} %)",
            self.total_matched,
            self.total_atoms,
            self.fraction_matched() * 100.0
        )
    }
}

/// Scores labelings against a fixed reference.
#[derive(Debug, Clone)]
pub struct ReferenceScorer {
    reference: LabelMap,
    reference_types: Vec<Label>,
    reference_index: Vec<usize>,
}

impl ReferenceScorer {
    pub fn new(reference: LabelMap) -> Self {
        let (reference_types, reference_index) = index_labels(&reference);
        Self {
            reference,
            reference_types,
            reference_index,
        }
    }

    pub fn reference(&self) -> &LabelMap {
        &self.reference
    }

    pub fn reference_types(&self) -> &[Label] {
        &self.reference_types
    }

    /// Find the renaming of current types that agrees with the reference on
    /// the most atoms.
    pub fn score(&self, current: &LabelMap) -> Result<MatchReport, ScoreError> {
        if !current.same_shape(&self.reference) {
            return Err(ScoreError::Shape {
                current_molecules: current.molecule_count(),
                current_atoms: current.atom_count(),
                reference_molecules: self.reference.molecule_count(),
                reference_atoms: self.reference.atom_count(),
            });
        }

        let (current_types, current_index) = index_labels(current);
        let mut weights = vec![vec![0i64; self.reference_types.len()]; current_types.len()];
        for (&row, &column) in current_index.iter().zip(&self.reference_index) {
            weights[row][column] += 1;
        }

        let assignment = maximum_weight_assignment(&weights);
        let mut total_matched = 0;
        let matches = current_types
            .into_iter()
            .zip(assignment)
            .enumerate()
            .map(|(row, (label, column))| {
                // An edge of weight zero pairs nothing.
                let paired = column.filter(|&c| weights[row][c] > 0);
                let count = paired.map_or(0, |c| weights[row][c] as usize);
                total_matched += count;
                TypeMatch {
                    current: label,
                    reference: paired.map(|c| self.reference_types[c].clone()),
                    count,
                }
            })
            .collect();

        let report = MatchReport {
            matches,
            total_matched,
            total_atoms: current.atom_count(),
        };
        trace!(
            "{} of {} atoms match the reference",
            report.total_matched,
            report.total_atoms
        );
        Ok(report)
    }
}

/// Distinct labels in order of first appearance, and the index of each
/// atom's label in that list.
fn index_labels(labels: &LabelMap) -> (Vec<Label>, Vec<usize>) {
    let mut distinct = Vec::new();
    let mut positions: HashMap<Label, usize> = HashMap::new();
    let index = labels
        .iter()
        .map(|label| {
            *positions.entry(label.clone()).or_insert_with(|| {
                distinct.push(label.clone());
                distinct.len() - 1
            })
        })
        .collect();
    (distinct, index)
}

/// For each row, the column it is assigned to, maximizing the total weight.
///
/// Hungarian algorithm with potentials, O(n² m) for n ≤ m. Wider-than-tall
/// inputs are solved transposed. Every row is assigned when rows ≤ columns.
fn maximum_weight_assignment(weights: &[Vec<i64>]) -> Vec<Option<usize>> {
    let rows = weights.len();
    let columns = weights.first().map_or(0, Vec::len);
    if rows == 0 || columns == 0 {
        return vec![None; rows];
    }
    if rows > columns {
        let transposed: Vec<Vec<i64>> = (0..columns)
            .map(|c| (0..rows).map(|r| weights[r][c]).collect())
            .collect();
        let mut assignment = vec![None; rows];
        for (column, row) in maximum_weight_assignment(&transposed).into_iter().enumerate() {
            if let Some(row) = row {
                assignment[row] = Some(column);
            }
        }
        return assignment;
    }

    // Minimize negated weights. Index 0 is a sentinel in u, v, owner and way.
    let cost = |r: usize, c: usize| -weights[r - 1][c - 1];
    let mut u = vec![0i64; rows + 1];
    let mut v = vec![0i64; columns + 1];
    let mut owner = vec![0usize; columns + 1];
    let mut way = vec![0usize; columns + 1];

    for row in 1..=rows {
        owner[0] = row;
        let mut column = 0;
        let mut min_slack = vec![i64::MAX; columns + 1];
        let mut used = vec![false; columns + 1];
        loop {
            used[column] = true;
            let current_row = owner[column];
            let mut delta = i64::MAX;
            let mut next = 0;
            for c in 1..=columns {
                if used[c] {
                    continue;
                }
                let slack = cost(current_row, c) - u[current_row] - v[c];
                if slack < min_slack[c] {
                    min_slack[c] = slack;
                    way[c] = column;
                }
                if min_slack[c] < delta {
                    delta = min_slack[c];
                    next = c;
                }
            }
            for c in 0..=columns {
                if used[c] {
                    u[owner[c]] += delta;
                    v[c] -= delta;
                } else {
                    min_slack[c] -= delta;
                }
            }
            column = next;
            if owner[column] == 0 {
                break;
            }
        }
        while column != 0 {
            let previous = way[column];
            owner[column] = owner[previous];
            column = previous;
        }
    }

    let mut assignment = vec![None; rows];
    for c in 1..=columns {
        if owner[c] != 0 {
            assignment[owner[c] - 1] = Some(c - 1);
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn labeling(molecules: &[&[&str]]) -> LabelMap {
        LabelMap::new(
            molecules
                .iter()
                .map(|atoms| atoms.iter().map(|&l| Label::new(l)).collect())
                .collect(),
        )
    }

    fn assert_valid(report: &MatchReport) {
        let mut references = HashSet::new();
        for m in &report.matches {
            if let Some(reference) = &m.reference {
                assert!(references.insert(reference.clone()), "{reference} matched twice");
            }
        }
        assert_eq!(
            report.matches.iter().map(|m| m.count).sum::<usize>(),
            report.total_matched
        );
        assert!(report.total_matched <= report.total_atoms);
    }

    #[test]
    fn test_self_score_matches_every_atom() {
        let labels = labeling(&[&["c", "c", "o", "h"], &["n", "h", "h"]]);
        let report = ReferenceScorer::new(labels.clone()).score(&labels).unwrap();
        assert_eq!(report.total_matched, 7);
        assert_eq!(report.total_atoms, 7);
        for m in &report.matches {
            assert_eq!(m.reference.as_ref(), Some(&m.current));
        }
        assert_valid(&report);
    }

    #[test]
    fn test_renaming_is_found() {
        let current = labeling(&[&["a", "a", "b", "b", "c"]]);
        let reference = labeling(&[&["x", "x", "y", "y", "y"]]);
        let report = ReferenceScorer::new(reference).score(&current).unwrap();
        assert_eq!(report.total_matched, 4);
        assert_eq!(
            report.reference_for(&Label::new("a")).unwrap().reference,
            Some(Label::new("x"))
        );
        assert_eq!(report.reference_for(&Label::new("c")).unwrap().reference, None);
        assert_valid(&report);
    }

    #[test]
    fn test_optimal_beats_greedy() {
        // Greedy pairs a with x for 3 atoms and strands b. Pairing a with y
        // and b with x agrees on 4.
        let current = labeling(&[&["a", "a", "a", "a", "a", "b", "b"]]);
        let reference = labeling(&[&["x", "x", "x", "y", "y", "x", "x"]]);
        let report = ReferenceScorer::new(reference).score(&current).unwrap();
        assert_eq!(report.total_matched, 4);
        assert_valid(&report);
    }

    #[test]
    fn test_more_current_types_than_reference() {
        let current = labeling(&[&["a", "b", "c", "c"]]);
        let reference = labeling(&[&["x", "x", "x", "y"]]);
        let report = ReferenceScorer::new(reference).score(&current).unwrap();
        // c takes y (1) and one of a/b takes x (1), or c takes x (1): best is 2.
        assert_eq!(report.total_matched, 2);
        assert_eq!(report.matches.len(), 3);
        assert_valid(&report);
    }

    #[test]
    fn test_shape_mismatch() {
        let scorer = ReferenceScorer::new(labeling(&[&["x", "x"]]));
        assert!(matches!(
            scorer.score(&labeling(&[&["a"]])),
            Err(ScoreError::Shape { .. })
        ));
        assert!(scorer.score(&labeling(&[&["a"], &["a"]])).is_err());
    }

    #[test]
    fn test_report_rendering() {
        let current = labeling(&[&["a", "b"]]);
        let reference = labeling(&[&["x", "x"]]);
        let text = ReferenceScorer::new(reference)
            .score(&current)
            .unwrap()
            .to_string();
        assert!(text.contains("matches        x :        1 atoms matched"));
        assert!(text.contains("no match"));
        assert!(text.ends_with("1 / 2 total atoms match (50.000 %)"));
    }
}
