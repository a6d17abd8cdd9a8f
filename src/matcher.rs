//! Finding embeddings of patterns in molecules.
//!
//! Typing only needs the [`PatternMatcher`] trait. [`SmartsMatcher`] is the
//! implementation used by the command line tool; tests and other callers
//! can supply their own.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock},
};

use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::*;

use crate::{
    parse_smarts, AtomExpr, AtomPrimitive, Bond, BondExpr, BondPrimitive, Molecule, PatternError,
    SmartsPattern,
};

/// The molecule atoms matched by each pattern atom, in pattern order.
pub type Embedding = Vec<NodeIndex>;

/// Something that can find every embedding of a pattern in a molecule.
///
/// Implementations must not depend on call order: typing may call them from
/// several threads at once and expects the same answer every time.
pub trait PatternMatcher: Sync {
    fn find_embeddings(
        &self,
        pattern: &str,
        molecule: &Molecule,
    ) -> Result<Vec<Embedding>, PatternError>;
}

impl<M: PatternMatcher + ?Sized> PatternMatcher for &M {
    fn find_embeddings(
        &self,
        pattern: &str,
        molecule: &Molecule,
    ) -> Result<Vec<Embedding>, PatternError> {
        (**self).find_embeddings(pattern, molecule)
    }
}

/// A backtracking SMARTS matcher with a cache of parsed patterns.
#[derive(Debug, Default)]
pub struct SmartsMatcher {
    cache: RwLock<HashMap<String, Arc<SmartsPattern>>>,
}

impl SmartsMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `pattern`, or fetch it from the cache.
    pub fn compile(&self, pattern: &str) -> Result<Arc<SmartsPattern>, PatternError> {
        if let Some(compiled) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(compiled.clone());
        }

        let compiled = Arc::new(parse_smarts(pattern)?);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn cached_patterns(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PatternMatcher for SmartsMatcher {
    fn find_embeddings(
        &self,
        pattern: &str,
        molecule: &Molecule,
    ) -> Result<Vec<Embedding>, PatternError> {
        let compiled = self.compile(pattern)?;
        let embeddings = embeddings(&compiled, molecule);
        trace!(
            "{} embedding(s) of {} in {}",
            embeddings.len(),
            pattern,
            molecule.title()
        );
        Ok(embeddings)
    }
}

/// All embeddings of `pattern`, in discovery order, one per distinct atom set.
pub fn embeddings(pattern: &SmartsPattern, molecule: &Molecule) -> Vec<Embedding> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    Search::new(pattern, molecule).run(None, &mut |mapping: &[Option<NodeIndex>]| {
        let embedding: Embedding = mapping.iter().flatten().copied().collect();
        let mut key: Vec<usize> = embedding.iter().map(|atom| atom.index()).collect();
        key.sort_unstable();
        if seen.insert(key) {
            found.push(embedding);
        }
        false
    });
    found
}

/// Whether some embedding of `pattern` maps its first atom onto `anchor`.
fn matches_at(pattern: &SmartsPattern, molecule: &Molecule, anchor: NodeIndex) -> bool {
    Search::new(pattern, molecule).run(Some(anchor), &mut |_: &[Option<NodeIndex>]| true)
}

/// One pattern atom to place, and the already placed neighbor it hangs off.
#[derive(Debug, Clone, Copy)]
struct Step {
    atom: usize,
    via: Option<(usize, usize)>,
}

struct Search<'a> {
    pattern: &'a SmartsPattern,
    molecule: &'a Molecule,
    order: Vec<Step>,
    mapping: Vec<Option<NodeIndex>>,
    used: Vec<bool>,
}

impl<'a> Search<'a> {
    fn new(pattern: &'a SmartsPattern, molecule: &'a Molecule) -> Self {
        Self {
            pattern,
            molecule,
            order: search_order(pattern),
            mapping: vec![None; pattern.atoms().len()],
            used: vec![false; molecule.atom_count()],
        }
    }

    /// Depth-first search. `on_match` returns true to stop early; so does `run`.
    fn run(
        &mut self,
        anchor: Option<NodeIndex>,
        on_match: &mut dyn FnMut(&[Option<NodeIndex>]) -> bool,
    ) -> bool {
        self.extend(0, anchor, on_match)
    }

    fn extend(
        &mut self,
        depth: usize,
        anchor: Option<NodeIndex>,
        on_match: &mut dyn FnMut(&[Option<NodeIndex>]) -> bool,
    ) -> bool {
        if depth == self.order.len() {
            return on_match(&self.mapping);
        }
        let step = self.order[depth];

        let candidates: Vec<NodeIndex> = match (step.via, anchor) {
            (Some((from, _)), _) => {
                let Some(origin) = self.mapping[from] else {
                    return false;
                };
                self.molecule.graph().neighbors(origin).collect()
            }
            (None, Some(anchor)) if depth == 0 => vec![anchor],
            (None, _) => self.molecule.atoms().collect(),
        };

        for candidate in candidates {
            if self.used[candidate.index()] || !self.feasible(step.atom, candidate) {
                continue;
            }
            self.mapping[step.atom] = Some(candidate);
            self.used[candidate.index()] = true;
            let stop = self.extend(depth + 1, anchor, on_match);
            self.used[candidate.index()] = false;
            self.mapping[step.atom] = None;
            if stop {
                return true;
            }
        }
        false
    }

    /// The atom expression holds and every bond to a placed neighbor exists.
    fn feasible(&self, query: usize, candidate: NodeIndex) -> bool {
        if !atom_matches(&self.pattern.atoms()[query].expr, self.molecule, candidate) {
            return false;
        }
        self.pattern.neighbors(query).iter().all(|&(neighbor, bond)| {
            let Some(placed) = self.mapping[neighbor] else {
                return true;
            };
            match self.molecule.graph().find_edge(candidate, placed) {
                Some(edge) => bond_matches(
                    &self.pattern.bonds()[bond].expr,
                    self.molecule,
                    edge,
                ),
                None => false,
            }
        })
    }
}

/// Visit pattern atoms so that each one after the first of its component is
/// bonded to an atom placed earlier.
fn search_order(pattern: &SmartsPattern) -> Vec<Step> {
    let count = pattern.atoms().len();
    let mut visited = vec![false; count];
    let mut order = Vec::with_capacity(count);

    for root in 0..count {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack = vec![Step {
            atom: root,
            via: None,
        }];
        while let Some(step) = stack.pop() {
            order.push(step);
            for &(neighbor, bond) in pattern.neighbors(step.atom).iter().rev() {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    stack.push(Step {
                        atom: neighbor,
                        via: Some((step.atom, bond)),
                    });
                }
            }
        }
    }
    order
}

fn atom_matches(expr: &AtomExpr, molecule: &Molecule, index: NodeIndex) -> bool {
    match expr {
        AtomExpr::Primitive(primitive) => primitive_matches(*primitive, molecule, index),
        AtomExpr::Not(inner) => !atom_matches(inner, molecule, index),
        AtomExpr::And(terms) => terms.iter().all(|t| atom_matches(t, molecule, index)),
        AtomExpr::Or(terms) => terms.iter().any(|t| atom_matches(t, molecule, index)),
        AtomExpr::Recursive(pattern) => matches_at(pattern, molecule, index),
    }
}

fn primitive_matches(primitive: AtomPrimitive, molecule: &Molecule, index: NodeIndex) -> bool {
    let atom = molecule.atom(index);
    match primitive {
        AtomPrimitive::Wildcard => true,
        AtomPrimitive::AtomicNumber(n) => atom.element.atomic_number() == n,
        AtomPrimitive::Aromatic => atom.aromatic,
        AtomPrimitive::Aliphatic => !atom.aromatic,
        AtomPrimitive::Degree(n) => molecule.degree(index) == n as usize,
        AtomPrimitive::TotalHydrogens(n) => molecule.total_hydrogens(index) == n as usize,
        AtomPrimitive::ImplicitHydrogens(n) => atom.hydrogens == n,
        AtomPrimitive::Connectivity(n) => {
            molecule.degree(index) + atom.hydrogens as usize == n as usize
        }
        AtomPrimitive::Valence(n) => molecule.valence(index) == n as usize,
        AtomPrimitive::InRing(in_ring) => molecule.in_ring(index) == in_ring,
        AtomPrimitive::SmallestRing(n) => molecule.smallest_ring(index) == Some(n as usize),
        AtomPrimitive::Charge(charge) => atom.charge == charge,
    }
}

fn bond_matches(expr: &BondExpr, molecule: &Molecule, edge: EdgeIndex) -> bool {
    let bond = molecule.graph()[edge];
    match expr {
        BondExpr::Implicit => matches!(bond, Bond::Single | Bond::Aromatic),
        BondExpr::Primitive(primitive) => match primitive {
            BondPrimitive::Single => bond == Bond::Single,
            BondPrimitive::Double => bond == Bond::Double,
            BondPrimitive::Triple => bond == Bond::Triple,
            BondPrimitive::Aromatic => bond == Bond::Aromatic,
            BondPrimitive::Ring => molecule.is_ring_bond(edge),
            BondPrimitive::Any => true,
        },
        BondExpr::Not(inner) => !bond_matches(inner, molecule, edge),
        BondExpr::And(terms) => terms.iter().all(|t| bond_matches(t, molecule, edge)),
        BondExpr::Or(terms) => terms.iter().any(|t| bond_matches(t, molecule, edge)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn indices(embedding: &Embedding) -> Vec<usize> {
        embedding.iter().map(|atom| atom.index()).collect()
    }

    #[test]
    fn test_single_atom_patterns() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let ethanol = Molecule::from_smiles("ethanol", "CCO")?;
        assert_eq!(matcher.find_embeddings("[#6]", &ethanol)?.len(), 2);
        assert_eq!(matcher.find_embeddings("[*:1]", &ethanol)?.len(), 3);

        let methyl = matcher.find_embeddings("[CH3]", &ethanol)?;
        assert_eq!(methyl.iter().map(indices).collect::<Vec<_>>(), vec![vec![0]]);

        let hydroxyl = matcher.find_embeddings("[OX2H1]", &ethanol)?;
        assert_eq!(hydroxyl.iter().map(indices).collect::<Vec<_>>(), vec![vec![2]]);
        Ok(())
    }

    #[test]
    fn test_bonded_patterns() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let ethanol = Molecule::from_smiles("ethanol", "CCO")?;
        let found = matcher.find_embeddings("[#6]-[#8]", &ethanol)?;
        assert_eq!(found.iter().map(indices).collect::<Vec<_>>(), vec![vec![1, 2]]);
        assert!(matcher.find_embeddings("[#6]=[#8]", &ethanol)?.is_empty());

        let acid = Molecule::from_smiles("acetic acid", "CC(=O)O")?;
        let carboxyl = matcher.find_embeddings("[#6](=O)[OH]", &acid)?;
        assert_eq!(carboxyl.iter().map(indices).collect::<Vec<_>>(), vec![vec![1, 2, 3]]);
        Ok(())
    }

    #[test]
    fn test_symmetric_embeddings_are_merged() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let ethane = Molecule::from_smiles("ethane", "CC")?;
        assert_eq!(matcher.find_embeddings("[#6]~[#6]", &ethane)?.len(), 1);

        let benzene = Molecule::from_smiles("benzene", "c1ccccc1")?;
        assert_eq!(matcher.find_embeddings("c1ccccc1", &benzene)?.len(), 1);
        assert_eq!(matcher.find_embeddings("[c;r6;X3]", &benzene)?.len(), 6);
        Ok(())
    }

    #[test]
    fn test_ring_primitives() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let molecule = Molecule::from_smiles("methylcyclohexane", "CC1CCCCC1")?;
        assert_eq!(matcher.find_embeddings("[#6;R]", &molecule)?.len(), 6);
        assert_eq!(matcher.find_embeddings("[#6;!R]", &molecule)?.len(), 1);
        assert_eq!(matcher.find_embeddings("[#6]@[#6]", &molecule)?.len(), 6);
        Ok(())
    }

    #[test]
    fn test_recursive_environment() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let molecule = Molecule::from_smiles("test", "OCOOO")?;
        let found = matcher.find_embeddings("[*;$(*~[#6]):1]", &molecule)?;
        assert_eq!(found.iter().map(indices).collect::<Vec<_>>(), vec![vec![0], vec![2]]);
        Ok(())
    }

    #[test]
    fn test_pattern_cache() -> Result<()> {
        let matcher = SmartsMatcher::new();
        let first = matcher.compile("[#6X4]")?;
        let second = matcher.compile("[#6X4]")?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(matcher.cached_patterns(), 1);
        assert!(matcher.compile("[#6").is_err());
        assert_eq!(matcher.cached_patterns(), 1);
        Ok(())
    }
}
