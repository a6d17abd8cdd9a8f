use std::fmt::{Display, Formatter, Result as FmtResult};

mod intern;
pub use intern::*;

mod molecule;
pub use molecule::*;

mod parse;
pub use parse::*;

mod rules;
pub use rules::*;

mod matcher;
pub use matcher::*;

mod typing;
pub use typing::*;

mod scoring;
pub use scoring::*;

mod report;
pub use report::*;

mod reference;
pub use reference::*;

mod sampler;
pub use sampler::*;

mod visualize;
pub use visualize::*;

/// Install a `tracing` subscriber that prints to stderr at the given level.
///
/// Unknown levels fall back to `info`. Calling this more than once is harmless.
pub fn init_logging(level: &str) {
    let level = level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

macro_rules! periodic_table {
    ( $(($element:ident, $symbol:literal, $number:literal),)* ) => {
        /// A chemical element, identified by its atomic number.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Element {
            $( $element, )*
        }

        impl Element {
            pub fn atomic_number(&self) -> u8 {
                match self {
                    $( Element::$element => $number, )*
                }
            }

            pub fn symbol(&self) -> &'static str {
                match self {
                    $( Element::$element => $symbol, )*
                }
            }

            pub fn from_symbol(symbol: &str) -> Option<Self> {
                match symbol {
                    $( $symbol => Some(Element::$element), )*
                    _ => None,
                }
            }

            pub fn from_atomic_number(number: u8) -> Option<Self> {
                match number {
                    $( $number => Some(Element::$element), )*
                    _ => None,
                }
            }
        }
    };
}

periodic_table!(
    (H, "H", 1),
    (He, "He", 2),
    (Li, "Li", 3),
    (Be, "Be", 4),
    (B, "B", 5),
    (C, "C", 6),
    (N, "N", 7),
    (O, "O", 8),
    (F, "F", 9),
    (Ne, "Ne", 10),
    (Na, "Na", 11),
    (Mg, "Mg", 12),
    (Al, "Al", 13),
    (Si, "Si", 14),
    (P, "P", 15),
    (S, "S", 16),
    (Cl, "Cl", 17),
    (Ar, "Ar", 18),
    (K, "K", 19),
    (Ca, "Ca", 20),
    (Fe, "Fe", 26),
    (Cu, "Cu", 29),
    (Zn, "Zn", 30),
    (As, "As", 33),
    (Se, "Se", 34),
    (Br, "Br", 35),
    (I, "I", 53),
);

impl Element {
    /// Valences an uncharged atom of this element may adopt, lowest first.
    /// Empty for elements that never get implicit hydrogens.
    pub fn default_valences(&self) -> &'static [u8] {
        match self {
            Element::H => &[1],
            Element::B => &[3],
            Element::C => &[4],
            Element::N => &[3, 5],
            Element::O => &[2],
            Element::P => &[3, 5],
            Element::S => &[2, 4, 6],
            Element::F | Element::Cl | Element::Br | Element::I => &[1],
            _ => &[],
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    /// Bond order doubled, so that aromatic bonds stay integral.
    pub fn doubled_order(&self) -> u32 {
        match self {
            Bond::Single => 2,
            Bond::Double => 4,
            Bond::Triple => 6,
            Bond::Aromatic => 3,
        }
    }
}

/// An atom of a molecular graph.
///
/// `hydrogens` counts implicit hydrogens only; explicit hydrogens are
/// ordinary neighbor nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub hydrogens: u8,
    pub charge: i8,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            hydrogens: 0,
            charge: 0,
        }
    }

    pub fn aromatic(element: Element) -> Self {
        Self {
            aromatic: true,
            ..Self::new(element)
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if self.aromatic {
            write!(f, "{}", self.element.symbol().to_ascii_lowercase())
        } else {
            write!(f, "{}", self.element)
        }
    }
}

pub type MoleculeGraph = petgraph::graph::UnGraph<Atom, Bond>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_lookup() {
        assert_eq!(Element::from_symbol("Cl"), Some(Element::Cl));
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::C.atomic_number(), 6);
        assert_eq!(Element::from_atomic_number(8), Some(Element::O));
        assert_eq!(Element::Br.to_string(), "Br");
    }

    #[test]
    fn test_atom_display() {
        assert_eq!(Atom::new(Element::N).to_string(), "N");
        assert_eq!(Atom::aromatic(Element::C).to_string(), "c");
    }
}
