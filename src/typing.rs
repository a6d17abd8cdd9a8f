//! Assigning a type to every atom of a corpus from an ordered rule list.

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use thiserror::Error;
use tracing::*;

use crate::{
    Corpus, Element, Label, Molecule, PatternError, PatternMatcher, ReplacementBinding, RuleList,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypingError {
    #[error("Atom {atom} ({element}) of molecule {molecule} '{title}' was not assigned a type")]
    Coverage {
        molecule: usize,
        title: String,
        atom: usize,
        element: Element,
    },
    #[error("Could not match pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

/// A type for every atom of every molecule, in corpus order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: Vec<Vec<Label>>,
}

impl LabelMap {
    pub fn new(labels: Vec<Vec<Label>>) -> Self {
        Self { labels }
    }

    pub fn get(&self, molecule: usize, atom: usize) -> Option<&Label> {
        self.labels.get(molecule)?.get(atom)
    }

    pub fn molecule(&self, molecule: usize) -> &[Label] {
        self.labels.get(molecule).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn molecules(&self) -> impl Iterator<Item = &[Label]> {
        self.labels.iter().map(Vec::as_slice)
    }

    /// Every atom label, molecule by molecule.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter().flatten()
    }

    pub fn molecule_count(&self) -> usize {
        self.labels.len()
    }

    pub fn atom_count(&self) -> usize {
        self.labels.iter().map(Vec::len).sum()
    }

    /// Number of atoms carrying `label`.
    pub fn count(&self, label: &Label) -> usize {
        self.iter().filter(|l| *l == label).count()
    }

    /// Whether both maps label the same number of atoms in each molecule.
    pub fn same_shape(&self, other: &LabelMap) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(&other.labels)
                .all(|(a, b)| a.len() == b.len())
    }
}

/// Applies a rule list to molecules. Later rules override earlier ones.
#[derive(Debug, Clone)]
pub struct AtomTyper {
    rules: Vec<(String, Label)>,
}

impl AtomTyper {
    /// Expand the bindings in every rule pattern up front.
    pub fn new(rules: &RuleList, bindings: &[ReplacementBinding]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| (rule.expanded_pattern(bindings), rule.label.clone()))
                .collect(),
        }
    }

    /// Type every atom of the corpus.
    ///
    /// Molecules are typed in parallel, but when several fail, the error
    /// reported is always the first one in corpus order.
    pub fn assign<M: PatternMatcher>(
        &self,
        corpus: &Corpus,
        matcher: &M,
    ) -> Result<LabelMap, TypingError> {
        let typed: Vec<Result<Vec<Label>, TypingError>> = corpus
            .molecules()
            .par_iter()
            .enumerate()
            .map(|(index, molecule)| self.type_molecule(index, molecule, matcher))
            .collect();
        let labels = typed.into_iter().collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Typed {} molecules with {} rules",
            labels.len(),
            self.rules.len()
        );
        Ok(LabelMap::new(labels))
    }

    /// Type one molecule. `index` only identifies it in errors.
    pub fn type_molecule<M: PatternMatcher>(
        &self,
        index: usize,
        molecule: &Molecule,
        matcher: &M,
    ) -> Result<Vec<Label>, TypingError> {
        let mut slots: Vec<Option<Label>> = vec![None; molecule.atom_count()];

        for (pattern, label) in &self.rules {
            let embeddings =
                matcher
                    .find_embeddings(pattern, molecule)
                    .map_err(|source| TypingError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
            for atom in embeddings.iter().flatten() {
                if let Some(slot) = slots.get_mut(atom.index()) {
                    *slot = Some(label.clone());
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(atom, slot)| {
                slot.ok_or_else(|| TypingError::Coverage {
                    molecule: index,
                    title: molecule.title().to_string(),
                    atom,
                    element: molecule.atom(NodeIndex::new(atom)).element,
                })
            })
            .collect()
    }
}
