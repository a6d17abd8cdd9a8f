use std::{fmt::Write as FmtWrite, fs, path::Path};

use anyhow::{bail, Context, Result};
use petgraph::prelude::EdgeRef;
use tracing::*;

use crate::{Atom, Bond, Element, Label, Molecule};

/// Write a typed molecule as a DOT file and, if `output_image` is given,
/// render it to PNG with Graphviz.
///
/// # Arguments
///
/// * `molecule` - The molecule to draw.
/// * `labels` - Optional atom types, one per atom, shown under each symbol.
/// * `output_dot` - The path to save the DOT file.
/// * `output_image` - Optional path for the rendered image. Needs `dot` on the PATH.
pub fn visualize_molecule(
    molecule: &Molecule,
    labels: Option<&[Label]>,
    output_dot: impl AsRef<Path>,
    output_image: Option<&Path>,
) -> Result<()> {
    let output_dot = output_dot.as_ref();
    fs::write(output_dot, generate_dot(molecule, labels))
        .with_context(|| format!("Failed to write DOT file {}", output_dot.display()))?;
    debug!("DOT file saved to {}", output_dot.display());

    if let Some(image_path) = output_image {
        let status = std::process::Command::new("dot")
            .arg("-Tpng")
            .arg(output_dot)
            .arg("-o")
            .arg(image_path)
            .status()
            .context("Failed to execute Graphviz 'dot' command")?;
        if !status.success() {
            bail!("Graphviz 'dot' command failed with status: {}", status);
        }
        debug!("Image rendered to {}", image_path.display());
    }
    Ok(())
}

/// The DOT text for a molecule. Nodes show the element and, when given, the
/// atom type.
pub fn generate_dot(molecule: &Molecule, labels: Option<&[Label]>) -> String {
    let graph = molecule.graph();
    let mut dot_output = String::new();
    let _ = writeln!(dot_output, "graph \"{}\" {{", escape(molecule.title()));
    let _ = writeln!(dot_output, "    layout=neato; overlap=false;");
    // Allow multiple edges between the same nodes.
    let _ = writeln!(dot_output, "    multiedge=true;");

    for node in graph.node_indices() {
        let atom = &graph[node];
        let text = match labels.and_then(|labels| labels.get(node.index())) {
            Some(label) => format!("{}\\n{}", atom_to_string(atom), escape(label.as_str())),
            None => atom_to_string(atom),
        };
        let _ = writeln!(
            dot_output,
            "    {} [label=\"{}\", fontcolor=white, shape=circle, style=filled, fillcolor={}];",
            node.index(),
            text,
            element_to_color(atom.element)
        );
    }

    // Double and triple bonds are drawn as parallel edges.
    for edge in graph.edge_references() {
        let (style, extra) = bond_to_style(edge.weight());
        let count = match edge.weight() {
            Bond::Double => 2,
            Bond::Triple => 3,
            _ => 1,
        };
        for _ in 0..count {
            let _ = writeln!(
                dot_output,
                "    {} -- {} [style={}, penwidth=2.0{}];",
                edge.source().index(),
                edge.target().index(),
                style,
                extra
            );
        }
    }

    let _ = writeln!(dot_output, "}}");
    dot_output
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn atom_to_string(atom: &Atom) -> String {
    let mut text = atom.to_string();
    match atom.charge {
        0 => {}
        1 => text.push('+'),
        -1 => text.push('-'),
        charge => {
            let _ = write!(text, "{charge:+}");
        }
    }
    text
}

fn element_to_color(element: Element) -> &'static str {
    match element {
        Element::C => "black",
        Element::H => "gray",
        Element::O => "red",
        Element::N => "blue",
        Element::Cl => "darkgreen",
        Element::Br => "brown",
        Element::F => "pink",
        Element::S => "yellow",
        Element::P => "orange",
        Element::I => "purple",
        _ => "darkslategray",
    }
}

fn bond_to_style(bond: &Bond) -> (&'static str, &'static str) {
    match bond {
        Bond::Aromatic => ("dashed", ", color=purple"),
        _ => ("solid", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_for_typed_molecule() -> Result<()> {
        let molecule = Molecule::from_smiles("methyl ethanoate", "COC(C)=O")?;
        let labels: Vec<Label> = ["c", "o", "c2", "c", "o2"].iter().map(|&l| Label::new(l)).collect();
        let dot = generate_dot(&molecule, Some(&labels));
        assert!(dot.starts_with("graph \"methyl ethanoate\" {"));
        assert!(dot.contains("4 [label=\"O\\no2\""));
        // One double bond drawn twice, three single bonds once each.
        assert_eq!(dot.matches(" -- ").count(), 5);
        Ok(())
    }

    #[test]
    fn test_aromatic_and_charged_atoms() -> Result<()> {
        let molecule = Molecule::from_smiles("pyridinium", "c1cc[nH+]cc1")?;
        let dot = generate_dot(&molecule, None);
        assert!(dot.contains("label=\"n+\""));
        assert_eq!(dot.matches("style=dashed").count(), 6);
        Ok(())
    }

    #[test]
    fn test_write_dot_file() -> Result<()> {
        let molecule = Molecule::from_smiles("ethanol", "CCO")?;
        let path = std::env::temp_dir().join("smarty-ethanol.dot");
        visualize_molecule(&molecule, None, &path, None)?;
        assert!(fs::read_to_string(&path)?.contains("2 [label=\"O\""));
        fs::remove_file(path)?;
        Ok(())
    }
}
