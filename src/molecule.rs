//! Molecules and the corpus the typer runs over.

use std::{collections::VecDeque, fs, path::Path};

use anyhow::{Context, Result};
use petgraph::{
    graph::{EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use tracing::*;

use crate::{parse_smiles, Atom, Element, MoleculeGraph};

/// Ring facts about a molecule, computed once when it is built.
#[derive(Debug, Clone, Default)]
struct Perception {
    ring_bonds: Vec<bool>,
    smallest_ring: Vec<Option<usize>>,
}

impl Perception {
    fn new(graph: &MoleculeGraph) -> Self {
        let mut ring_bonds = vec![false; graph.edge_count()];
        let mut smallest_ring: Vec<Option<usize>> = vec![None; graph.node_count()];

        for edge in graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            let Some(path) = shortest_path_avoiding(graph, a, b, edge.id()) else {
                continue;
            };
            let size = path + 1;
            ring_bonds[edge.id().index()] = true;
            for atom in [a, b] {
                let slot = &mut smallest_ring[atom.index()];
                *slot = Some(slot.map_or(size, |s| s.min(size)));
            }
        }

        Self {
            ring_bonds,
            smallest_ring,
        }
    }
}

/// Number of bonds on the shortest path from `from` to `to` that does not use `skip`.
fn shortest_path_avoiding(
    graph: &MoleculeGraph,
    from: NodeIndex,
    to: NodeIndex,
    skip: EdgeIndex,
) -> Option<usize> {
    let mut distance = vec![usize::MAX; graph.node_count()];
    let mut queue = VecDeque::from([from]);
    distance[from.index()] = 0;

    while let Some(node) = queue.pop_front() {
        for edge in graph.edges(node) {
            if edge.id() == skip {
                continue;
            }
            let next = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            if distance[next.index()] != usize::MAX {
                continue;
            }
            distance[next.index()] = distance[node.index()] + 1;
            if next == to {
                return Some(distance[next.index()]);
            }
            queue.push_back(next);
        }
    }
    None
}

/// A titled molecular graph. Immutable once built.
#[derive(Debug, Clone)]
pub struct Molecule {
    title: String,
    graph: MoleculeGraph,
    perception: Perception,
}

impl Molecule {
    pub fn new(title: impl Into<String>, graph: MoleculeGraph) -> Self {
        let perception = Perception::new(&graph);
        Self {
            title: title.into(),
            graph,
            perception,
        }
    }

    pub fn from_smiles(title: impl Into<String>, smiles: &str) -> Result<Self> {
        Ok(Self::new(title, parse_smiles(smiles)?))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn graph(&self) -> &MoleculeGraph {
        &self.graph
    }

    pub fn atom(&self, index: NodeIndex) -> &Atom {
        &self.graph[index]
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn degree(&self, atom: NodeIndex) -> usize {
        self.graph.edges(atom).count()
    }

    /// Implicit plus explicit hydrogens.
    pub fn total_hydrogens(&self, atom: NodeIndex) -> usize {
        let explicit = self
            .graph
            .neighbors(atom)
            .filter(|&n| self.graph[n].element == Element::H)
            .count();
        self.graph[atom].hydrogens as usize + explicit
    }

    /// Sum of bond orders including implicit hydrogens. Aromatic bonds count 1.5.
    pub fn valence(&self, atom: NodeIndex) -> usize {
        let doubled: u32 = self
            .graph
            .edges(atom)
            .map(|edge| edge.weight().doubled_order())
            .sum();
        doubled as usize / 2 + self.graph[atom].hydrogens as usize
    }

    pub fn in_ring(&self, atom: NodeIndex) -> bool {
        self.perception.smallest_ring[atom.index()].is_some()
    }

    pub fn smallest_ring(&self, atom: NodeIndex) -> Option<usize> {
        self.perception.smallest_ring[atom.index()]
    }

    pub fn is_ring_bond(&self, bond: EdgeIndex) -> bool {
        self.perception.ring_bonds[bond.index()]
    }

    /// A copy of this molecule with every implicit hydrogen turned into an H atom.
    pub fn with_explicit_hydrogens(&self) -> Self {
        let mut graph = self.graph.clone();
        for atom in self.graph.node_indices() {
            let count = graph[atom].hydrogens;
            graph[atom].hydrogens = 0;
            for _ in 0..count {
                let hydrogen = graph.add_node(Atom::new(Element::H));
                graph.add_edge(atom, hydrogen, crate::Bond::Single);
            }
        }
        Self::new(self.title.clone(), graph)
    }
}

/// The fixed set of molecules being typed.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    molecules: Vec<Molecule>,
}

impl Corpus {
    pub fn new(molecules: Vec<Molecule>) -> Self {
        Self { molecules }
    }

    /// Read a file with one SMILES per line, optionally followed by a title.
    /// Blank lines are skipped. A comment starts at the first token beginning
    /// with `%`, so `%nn` ring closures inside a SMILES are kept.
    pub fn read_smiles_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read molecules from {}", path.display()))?;

        let mut molecules = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            let mut tokens = line
                .split_whitespace()
                .take_while(|token| !token.starts_with('%'));
            let Some(smiles) = tokens.next() else {
                continue;
            };
            let title = tokens
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| format!("molecule{}", molecules.len() + 1));
            let molecule = Molecule::from_smiles(title, smiles).with_context(|| {
                format!("{}:{}: invalid SMILES", path.display(), number + 1)
            })?;
            molecules.push(molecule);
        }
        info!("Read {} molecules from {}", molecules.len(), path.display());
        Ok(Self::new(molecules))
    }

    pub fn with_explicit_hydrogens(&self) -> Self {
        Self::new(
            self.molecules
                .iter()
                .map(Molecule::with_explicit_hydrogens)
                .collect(),
        )
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn atom_count(&self) -> usize {
        self.molecules.iter().map(Molecule::atom_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_perception() -> Result<()> {
        // Methylcyclohexane: six ring atoms, one exocyclic carbon.
        let molecule = Molecule::from_smiles("methylcyclohexane", "CC1CCCCC1")?;
        assert!(!molecule.in_ring(NodeIndex::new(0)));
        assert!(molecule.in_ring(NodeIndex::new(1)));
        assert_eq!(molecule.smallest_ring(NodeIndex::new(3)), Some(6));
        let ring_bonds = molecule
            .graph()
            .edge_indices()
            .filter(|&e| molecule.is_ring_bond(e))
            .count();
        assert_eq!(ring_bonds, 6);
        Ok(())
    }

    #[test]
    fn test_fused_rings_report_smallest() -> Result<()> {
        // Bicyclo[2.2.1]heptane has five-membered rings through the bridgeheads.
        let molecule = Molecule::from_smiles("norbornane", "C1CC2CCC1C2")?;
        assert_eq!(molecule.smallest_ring(NodeIndex::new(0)), Some(5));
        assert_eq!(molecule.smallest_ring(NodeIndex::new(6)), Some(5));
        Ok(())
    }

    #[test]
    fn test_hydrogen_counts() -> Result<()> {
        let ethanol = Molecule::from_smiles("ethanol", "CCO")?;
        assert_eq!(ethanol.total_hydrogens(NodeIndex::new(0)), 3);
        assert_eq!(ethanol.total_hydrogens(NodeIndex::new(2)), 1);
        assert_eq!(ethanol.valence(NodeIndex::new(1)), 4);

        let explicit = ethanol.with_explicit_hydrogens();
        assert_eq!(explicit.atom_count(), 9);
        assert_eq!(explicit.total_hydrogens(NodeIndex::new(0)), 3);
        assert_eq!(explicit.degree(NodeIndex::new(0)), 4);
        Ok(())
    }

    #[test]
    fn test_read_smiles_file() -> Result<()> {
        let path = std::env::temp_dir().join("smarty-corpus-test.smi");
        fs::write(&path, "% test corpus\nCCO ethanol\n\nc1ccccc1\n")?;
        let corpus = Corpus::read_smiles_file(&path)?;
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.molecules()[0].title(), "ethanol");
        assert_eq!(corpus.molecules()[1].title(), "molecule2");
        assert_eq!(corpus.atom_count(), 9);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_read_two_digit_ring_closures() -> Result<()> {
        let path = std::env::temp_dir().join("smarty-corpus-rings.smi");
        fs::write(&path, "C%10CCCCC%10 cyclohexane % six ring atoms
%C
")?;
        let corpus = Corpus::read_smiles_file(&path)?;
        fs::remove_file(&path)?;
        assert_eq!(corpus.len(), 1);
        let molecule = &corpus.molecules()[0];
        assert_eq!(molecule.title(), "cyclohexane");
        assert_eq!(molecule.atom_count(), 6);
        assert!(molecule.in_ring(NodeIndex::new(0)));
        Ok(())
    }
}
