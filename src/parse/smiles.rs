use std::collections::BTreeMap;

use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::{Atom, Bond, Element, MoleculeGraph};

#[derive(Error, Debug)]
pub enum SmilesError {
    #[error("Branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("Branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("Ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u8, usize),
    #[error("Ring closure {0} was never closed")]
    UnclosedRing(u8),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Unknown element '{0}' at position {1}")]
    UnknownElement(String, usize),
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("Unclosed branch '('")]
    UnclosedBranch,
}

/// Parses a SMILES string into a MoleculeGraph.
///
/// Unbracketed atoms get implicit hydrogens from their default valence;
/// bracket atoms carry exactly the hydrogens written inside the brackets.
pub fn parse_smiles(smiles: &str) -> Result<MoleculeGraph> {
    parse_smiles_helper(smiles).context(format!("Failed to parse SMILES string {smiles}"))
}

/// Parse the inside of a bracket atom, e.g. `NH4+`, `13CH3`, `nH`, `O-`.
fn parse_bracket_atom(content: &str, position: usize) -> Result<Atom, SmilesError> {
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    // Isotope.
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }

    let rest: String = chars[i..].iter().collect();
    let (mut atom, width) =
        bracket_element(&rest).ok_or_else(|| SmilesError::UnknownElement(rest.clone(), position))?;
    i += width;

    // Chirality.
    while i < chars.len() && chars[i] == '@' {
        i += 1;
    }

    if i < chars.len() && chars[i] == 'H' {
        i += 1;
        let digits: String = chars[i..].iter().take_while(|c| c.is_ascii_digit()).collect();
        i += digits.len();
        atom.hydrogens = digits.parse().unwrap_or(1);
    }

    while i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
        let sign: i8 = if chars[i] == '+' { 1 } else { -1 };
        i += 1;
        let digits: String = chars[i..].iter().take_while(|c| c.is_ascii_digit()).collect();
        i += digits.len();
        atom.charge += sign * digits.parse::<i8>().unwrap_or(1);
    }

    match chars.get(i) {
        // Atom class, ignored.
        Some(':') | None => Ok(atom),
        Some(&c) => Err(SmilesError::UnexpectedCharacter(c, position + 1 + i)),
    }
}

/// The element symbol at the start of a bracket atom and how many characters it spans.
fn bracket_element(text: &str) -> Option<(Atom, usize)> {
    let first = text.chars().next()?;
    let two: String = text.chars().take(2).collect();
    let one = first.to_string();
    if first.is_ascii_uppercase() {
        if two.len() == 2 {
            if let Some(element) = Element::from_symbol(&two) {
                return Some((Atom::new(element), 2));
            }
        }
        Element::from_symbol(&one).map(|element| (Atom::new(element), 1))
    } else {
        if two.len() == 2 {
            if let Some(element) = Element::from_symbol(&capitalize(&two)) {
                return Some((Atom::aromatic(element), 2));
            }
        }
        Element::from_symbol(&capitalize(&one)).map(|element| (Atom::aromatic(element), 1))
    }
}

fn capitalize(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn parse_smiles_helper(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    let mut graph = MoleculeGraph::new_undirected();
    let mut bracketed: Vec<bool> = Vec::new();
    let mut current_atom: Option<NodeIndex> = None;
    let mut pending_bond: Option<Bond> = None;
    let mut branch_stack: Vec<NodeIndex> = Vec::new();
    let mut ring_map: BTreeMap<u8, (NodeIndex, Option<Bond>)> = BTreeMap::new();

    let chars: Vec<char> = smiles.chars().collect();
    let mut i = 0;

    // Connect a freshly added atom to the previous one.
    fn attach(
        graph: &mut MoleculeGraph,
        current_atom: Option<NodeIndex>,
        new_atom: NodeIndex,
        pending_bond: &mut Option<Bond>,
    ) {
        if let Some(prev) = current_atom {
            let bond = pending_bond.take().unwrap_or_else(|| default_bond(graph, prev, new_atom));
            graph.add_edge(prev, new_atom, bond);
        }
        *pending_bond = None;
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current_atom.ok_or(SmilesError::BranchNoCurrentAtom(i))?;
                branch_stack.push(atom);
                i += 1;
            }
            ')' => {
                current_atom = Some(branch_stack.pop().ok_or(SmilesError::BranchEndNoStart(i))?);
                pending_bond = None;
                i += 1;
            }
            '-' | '=' | '#' | ':' => {
                pending_bond = Some(match c {
                    '-' => Bond::Single,
                    '=' => Bond::Double,
                    '#' => Bond::Triple,
                    _ => Bond::Aromatic,
                });
                i += 1;
            }
            '/' | '\\' => {
                // Directional single bonds; stereo is not represented.
                pending_bond = Some(Bond::Single);
                i += 1;
            }
            '%' | '0'..='9' => {
                let (ring_number, width) = if c == '%' {
                    let digits: String = chars.iter().skip(i + 1).take(2).collect();
                    let number = digits
                        .parse::<u8>()
                        .map_err(|_| SmilesError::UnexpectedCharacter(c, i))?;
                    (number, 3)
                } else {
                    (c as u8 - b'0', 1)
                };
                let current = current_atom.ok_or(SmilesError::RingClosureNoCurrentAtom(ring_number, i))?;
                if let Some((start, opening_bond)) = ring_map.remove(&ring_number) {
                    let bond = pending_bond
                        .take()
                        .or(opening_bond)
                        .unwrap_or_else(|| default_bond(&graph, start, current));
                    graph.add_edge(start, current, bond);
                } else {
                    ring_map.insert(ring_number, (current, pending_bond.take()));
                }
                i += width;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|offset| i + offset)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let atom = parse_bracket_atom(&content, i)?;
                let new_atom = graph.add_node(atom);
                bracketed.push(true);
                attach(&mut graph, current_atom, new_atom, &mut pending_bond);
                current_atom = Some(new_atom);
                i = end + 1;
            }
            '.' => {
                current_atom = None;
                pending_bond = None;
                i += 1;
            }
            _ if c.is_ascii_alphabetic() => {
                // Organic subset: try the two-letter halogens first.
                let (atom, width) = if c == 'C' && chars.get(i + 1) == Some(&'l') {
                    (Atom::new(Element::Cl), 2)
                } else if c == 'B' && chars.get(i + 1) == Some(&'r') {
                    (Atom::new(Element::Br), 2)
                } else {
                    let atom = match c {
                        'B' => Atom::new(Element::B),
                        'C' => Atom::new(Element::C),
                        'N' => Atom::new(Element::N),
                        'O' => Atom::new(Element::O),
                        'P' => Atom::new(Element::P),
                        'S' => Atom::new(Element::S),
                        'F' => Atom::new(Element::F),
                        'I' => Atom::new(Element::I),
                        'b' => Atom::aromatic(Element::B),
                        'c' => Atom::aromatic(Element::C),
                        'n' => Atom::aromatic(Element::N),
                        'o' => Atom::aromatic(Element::O),
                        'p' => Atom::aromatic(Element::P),
                        's' => Atom::aromatic(Element::S),
                        _ => return Err(SmilesError::UnknownElement(c.to_string(), i)),
                    };
                    (atom, 1)
                };
                let new_atom = graph.add_node(atom);
                bracketed.push(false);
                attach(&mut graph, current_atom, new_atom, &mut pending_bond);
                current_atom = Some(new_atom);
                i += width;
            }
            _ => return Err(SmilesError::UnexpectedCharacter(c, i)),
        }
    }

    if !branch_stack.is_empty() {
        return Err(SmilesError::UnclosedBranch);
    }
    if let Some(&ring_number) = ring_map.keys().next() {
        return Err(SmilesError::UnclosedRing(ring_number));
    }

    for atom in graph.node_indices() {
        if !bracketed[atom.index()] {
            graph[atom].hydrogens = implicit_hydrogens(&graph, atom);
        }
    }

    Ok(graph)
}

/// Unmarked bonds are aromatic between two aromatic atoms and single otherwise.
fn default_bond(graph: &MoleculeGraph, a: NodeIndex, b: NodeIndex) -> Bond {
    if graph[a].aromatic && graph[b].aromatic {
        Bond::Aromatic
    } else {
        Bond::Single
    }
}

fn implicit_hydrogens(graph: &MoleculeGraph, atom: NodeIndex) -> u8 {
    let element = graph[atom].element;
    let mut bond_sum: u32 = graph
        .edges(atom)
        .map(|edge| match edge.weight() {
            Bond::Aromatic => 1,
            bond => bond.doubled_order() / 2,
        })
        .sum();

    if graph[atom].aromatic {
        match element {
            Element::C | Element::N | Element::B | Element::P => bond_sum += 1,
            _ => return 0,
        }
    }

    element
        .default_valences()
        .iter()
        .map(|&valence| valence as u32)
        .find(|&valence| valence >= bond_sum)
        .map(|valence| (valence - bond_sum) as u8)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_and_branches() -> Result<()> {
        let graph = parse_smiles("CC(=O)O")?;
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        let carbonyl = graph.find_edge(NodeIndex::new(1), NodeIndex::new(2)).unwrap();
        assert_eq!(graph[carbonyl], Bond::Double);
        assert_eq!(graph[NodeIndex::new(0)].hydrogens, 3);
        assert_eq!(graph[NodeIndex::new(1)].hydrogens, 0);
        assert_eq!(graph[NodeIndex::new(3)].hydrogens, 1);
        Ok(())
    }

    #[test]
    fn test_aromatic_ring() -> Result<()> {
        let graph = parse_smiles("c1ccncc1")?;
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 6);
        assert!(graph.edge_weights().all(|&bond| bond == Bond::Aromatic));
        assert_eq!(graph[NodeIndex::new(0)].hydrogens, 1);
        assert_eq!(graph[NodeIndex::new(3)].hydrogens, 0);
        assert!(graph[NodeIndex::new(3)].aromatic);
        Ok(())
    }

    #[test]
    fn test_bracket_atoms() -> Result<()> {
        let graph = parse_smiles("[NH4+].[Cl-]")?;
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph[NodeIndex::new(0)].hydrogens, 4);
        assert_eq!(graph[NodeIndex::new(0)].charge, 1);
        assert_eq!(graph[NodeIndex::new(1)].element, Element::Cl);
        assert_eq!(graph[NodeIndex::new(1)].charge, -1);

        let pyrrole = parse_smiles("c1cc[nH]c1")?;
        assert_eq!(pyrrole[NodeIndex::new(3)].hydrogens, 1);
        assert!(pyrrole[NodeIndex::new(3)].aromatic);
        Ok(())
    }

    #[test]
    fn test_two_letter_halogens() -> Result<()> {
        let graph = parse_smiles("ClCBr")?;
        assert_eq!(graph[NodeIndex::new(0)].element, Element::Cl);
        assert_eq!(graph[NodeIndex::new(2)].element, Element::Br);
        assert_eq!(graph[NodeIndex::new(1)].hydrogens, 2);
        Ok(())
    }

    #[test]
    fn test_malformed_smiles() {
        assert!(parse_smiles("C)C").is_err());
        assert!(parse_smiles("C1CC").is_err());
        assert!(parse_smiles("C[N").is_err());
        assert!(parse_smiles("CXC").is_err());
        assert!(parse_smiles("(C)").is_err());
    }
}
