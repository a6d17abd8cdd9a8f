//! Loading the reference labeling that the sampler tries to reproduce.

use std::{io, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::*;

use crate::{
    AtomTyper, Corpus, Label, LabelMap, PatternMatcher, ReplacementBinding, RuleList, TypingError,
};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference types: {0}")]
    Csv(#[from] csv::Error),
    #[error("Reference header must name the columns molecule, atom and type")]
    MissingColumn,
    #[error("Reference row {row}: {message}")]
    BadRow { row: usize, message: String },
    #[error("Atom {atom} of molecule {molecule} is typed more than once")]
    Duplicate { molecule: usize, atom: usize },
    #[error("Atom {atom} of molecule {molecule} has no reference type")]
    Missing { molecule: usize, atom: usize },
}

fn column(headers: &StringRecord, name: &str) -> Result<usize, ReferenceError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or(ReferenceError::MissingColumn)
}

/// Read `molecule,atom,type` rows. Molecules are named by 0-based index or
/// by title; every atom of the corpus must be typed exactly once.
pub fn parse_reference_csv<R: io::Read>(
    reader: R,
    corpus: &Corpus,
) -> Result<LabelMap, ReferenceError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'%'))
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let (molecule_column, atom_column, type_column) = (
        column(&headers, "molecule")?,
        column(&headers, "atom")?,
        column(&headers, "type")?,
    );

    let mut slots: Vec<Vec<Option<Label>>> = corpus
        .molecules()
        .iter()
        .map(|m| vec![None; m.atom_count()])
        .collect();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let row = row + 1;
        let field = |index: usize| record.get(index).unwrap_or("");

        let name = field(molecule_column);
        let molecule = name
            .parse::<usize>()
            .ok()
            .filter(|&index| index < corpus.len())
            .or_else(|| corpus.molecules().iter().position(|m| m.title() == name))
            .ok_or_else(|| ReferenceError::BadRow {
                row,
                message: format!("unknown molecule '{name}'"),
            })?;
        let atom = field(atom_column)
            .parse::<usize>()
            .ok()
            .filter(|&atom| atom < slots[molecule].len())
            .ok_or_else(|| ReferenceError::BadRow {
                row,
                message: format!("molecule {molecule} has no atom '{}'", field(atom_column)),
            })?;
        let label = field(type_column);
        if label.is_empty() {
            warn!("Skipping reference row {} with an empty type", row);
            continue;
        }

        let slot = &mut slots[molecule][atom];
        if slot.is_some() {
            return Err(ReferenceError::Duplicate { molecule, atom });
        }
        *slot = Some(Label::new(label));
    }

    let labels = slots
        .into_iter()
        .enumerate()
        .map(|(molecule, atoms)| {
            atoms
                .into_iter()
                .enumerate()
                .map(|(atom, slot)| slot.ok_or(ReferenceError::Missing { molecule, atom }))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LabelMap::new(labels))
}

pub fn load_reference_csv(
    path: impl AsRef<Path>,
    corpus: &Corpus,
) -> Result<LabelMap, ReferenceError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    let labels = parse_reference_csv(file, corpus)?;
    info!(
        "Read reference types for {} atoms from {}",
        labels.atom_count(),
        path.display()
    );
    Ok(labels)
}

/// The labeling a reference rule list gives the corpus.
pub fn reference_from_rules<M: PatternMatcher>(
    rules: &RuleList,
    bindings: &[ReplacementBinding],
    corpus: &Corpus,
    matcher: &M,
) -> Result<LabelMap, TypingError> {
    AtomTyper::new(rules, bindings).assign(corpus, matcher)
}
