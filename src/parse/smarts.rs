//! A parser for the subset of SMARTS used by atom type rules.
//!
//! Atom expressions support `* a A #n D H h X v R r + -`, element symbols,
//! recursive `$(...)` environments and the logical operators `! & , ;` with
//! the usual SMARTS precedence. Bonds support `- = # : ~ @` with the same
//! operators. Branches, ring closures and `.` work as in SMILES.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    error::{context, convert_error, ErrorKind, ParseError, VerboseError},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use thiserror::Error;

use crate::Element;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Invalid SMARTS '{pattern}':\n{message}")]
    Syntax { pattern: String, message: String },
    #[error("Invalid SMARTS '{pattern}': {message}")]
    Structure { pattern: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomPrimitive {
    Wildcard,
    AtomicNumber(u8),
    Aromatic,
    Aliphatic,
    /// `D<n>`: explicit connections.
    Degree(u8),
    /// `H<n>`: implicit plus explicit hydrogens.
    TotalHydrogens(u8),
    /// `h<n>`: implicit hydrogens.
    ImplicitHydrogens(u8),
    /// `X<n>`: explicit connections plus implicit hydrogens.
    Connectivity(u8),
    /// `v<n>`: bond order sum.
    Valence(u8),
    /// `R`, `R0`, `r`: whether the atom sits in any ring.
    InRing(bool),
    /// `r<n>`: size of the smallest ring through the atom.
    SmallestRing(u8),
    Charge(i8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    Primitive(AtomPrimitive),
    Not(Box<AtomExpr>),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    /// The atom must be the first atom of an embedding of this pattern.
    Recursive(Box<SmartsPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondPrimitive {
    Single,
    Double,
    Triple,
    Aromatic,
    Ring,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// No bond symbol written: single or aromatic.
    Implicit,
    Primitive(BondPrimitive),
    Not(Box<BondExpr>),
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryAtom {
    pub expr: AtomExpr,
    pub map_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBond {
    pub from: usize,
    pub to: usize,
    pub expr: BondExpr,
}

/// A parsed pattern: a small query graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsPattern {
    atoms: Vec<QueryAtom>,
    bonds: Vec<QueryBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SmartsPattern {
    fn new(atoms: Vec<QueryAtom>, bonds: Vec<QueryBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (index, bond) in bonds.iter().enumerate() {
            adjacency[bond.from].push((bond.to, index));
            adjacency[bond.to].push((bond.from, index));
        }
        Self {
            atoms,
            bonds,
            adjacency,
        }
    }

    pub fn atoms(&self) -> &[QueryAtom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[QueryBond] {
        &self.bonds
    }

    /// `(neighbor, bond index)` pairs of a query atom.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }
}

impl std::str::FromStr for SmartsPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_smarts(s)
    }
}

/// Parse a SMARTS string.
pub fn parse_smarts(smarts: &str) -> Result<SmartsPattern, PatternError> {
    let tokens = match all_consuming(chain)(smarts) {
        Ok((_, tokens)) => tokens,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(PatternError::Syntax {
                pattern: smarts.to_string(),
                message: convert_error(smarts, e),
            })
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(PatternError::Syntax {
                pattern: smarts.to_string(),
                message: "incomplete".to_string(),
            })
        }
    };
    build(tokens).map_err(|message| PatternError::Structure {
        pattern: smarts.to_string(),
        message,
    })
}

/// Whether `fragment` is a bare atom expression that may sit inside `[...]`.
pub fn is_atom_expression(fragment: &str) -> bool {
    all_consuming(atom_low)(fragment).is_ok()
}

/// The leading atom of a pattern split into its expression text, atom-map
/// number and the remainder of the pattern. `[#6X4:1]-C` gives
/// `("#6X4", Some(1), "-C")`; `CO` gives `("C", None, "O")`.
pub fn split_leading_atom(pattern: &str) -> Option<(&str, Option<u32>, &str)> {
    if let Ok((rest, bracket)) = recognize(bracket_atom)(pattern) {
        let inner = &bracket[1..bracket.len() - 1];
        let (_, (expr, map_index)) = pair(recognize(atom_low), opt(atom_map))(inner).ok()?;
        return Some((expr, map_index, rest));
    }
    let (rest, atom) = recognize(organic_atom)(pattern).ok()?;
    Some((atom, None, rest))
}

// ---------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Atom(QueryAtom),
    Bond(BondExpr),
    RingClosure(u32),
    BranchOpen,
    BranchClose,
    Dot,
}

fn fail<T>(input: &str, kind: ErrorKind) -> Res<T> {
    Err(nom::Err::Error(VerboseError::from_error_kind(input, kind)))
}

fn number(input: &str) -> Res<u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn small_number(input: &str) -> Res<u8> {
    map_res(digit1, str::parse::<u8>)(input)
}

/// A chain of tokens up to an unbalanced `)` or the end of input.
fn chain(mut input: &str) -> Res<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    loop {
        if input.starts_with(')') {
            if depth == 0 {
                break;
            }
            depth -= 1;
            tokens.push(Token::BranchClose);
            input = &input[1..];
            continue;
        }
        if input.starts_with('(') {
            depth += 1;
            tokens.push(Token::BranchOpen);
            input = &input[1..];
            continue;
        }
        match alt((
            value(Token::Dot, char('.')),
            map(ring_closure, Token::RingClosure),
            map(bond_low, Token::Bond),
            map(atom_token, Token::Atom),
        ))(input)
        {
            Ok((rest, token)) => {
                tokens.push(token);
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, tokens))
}

fn ring_closure(input: &str) -> Res<u32> {
    alt((
        preceded(
            char('%'),
            map_res(recognize(pair(one_of("0123456789"), one_of("0123456789"))), str::parse::<u32>),
        ),
        map(one_of("0123456789"), |c: char| c as u32 - '0' as u32),
    ))(input)
}

fn build(tokens: Vec<Token>) -> Result<SmartsPattern, String> {
    let mut atoms: Vec<QueryAtom> = Vec::new();
    let mut bonds: Vec<QueryBond> = Vec::new();
    let mut previous: Option<usize> = None;
    let mut pending_bond: Option<BondExpr> = None;
    let mut branches: Vec<usize> = Vec::new();
    let mut rings: std::collections::BTreeMap<u32, (usize, Option<BondExpr>)> = Default::default();

    for token in tokens {
        match token {
            Token::Atom(atom) => {
                let index = atoms.len();
                atoms.push(atom);
                if let Some(from) = previous {
                    let expr = pending_bond.take().unwrap_or(BondExpr::Implicit);
                    bonds.push(QueryBond { from, to: index, expr });
                } else if pending_bond.is_some() {
                    return Err("bond without a preceding atom".to_string());
                }
                previous = Some(index);
            }
            Token::Bond(expr) => {
                if previous.is_none() || pending_bond.is_some() {
                    return Err("misplaced bond".to_string());
                }
                pending_bond = Some(expr);
            }
            Token::RingClosure(number) => {
                let current = previous.ok_or("ring closure without a preceding atom")?;
                if let Some((open, open_bond)) = rings.remove(&number) {
                    if open == current {
                        return Err(format!("ring closure {number} bonds an atom to itself"));
                    }
                    let expr = pending_bond
                        .take()
                        .or(open_bond)
                        .unwrap_or(BondExpr::Implicit);
                    bonds.push(QueryBond { from: open, to: current, expr });
                } else {
                    rings.insert(number, (current, pending_bond.take()));
                }
            }
            Token::BranchOpen => {
                branches.push(previous.ok_or("branch without a preceding atom")?);
            }
            Token::BranchClose => {
                if pending_bond.is_some() {
                    return Err("dangling bond at end of branch".to_string());
                }
                previous = Some(branches.pop().ok_or("unmatched ')'")?);
            }
            Token::Dot => {
                if pending_bond.is_some() {
                    return Err("dangling bond before '.'".to_string());
                }
                previous = None;
            }
        }
    }

    if atoms.is_empty() {
        return Err("pattern has no atoms".to_string());
    }
    if pending_bond.is_some() {
        return Err("dangling bond at end of pattern".to_string());
    }
    if !branches.is_empty() {
        return Err("unclosed branch".to_string());
    }
    if let Some(number) = rings.keys().next() {
        return Err(format!("ring closure {number} is never closed"));
    }
    Ok(SmartsPattern::new(atoms, bonds))
}

// ---------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------

fn atom_token(input: &str) -> Res<QueryAtom> {
    alt((
        bracket_atom,
        map(organic_atom, |expr| QueryAtom {
            expr,
            map_index: None,
        }),
    ))(input)
}

fn atom_map(input: &str) -> Res<u32> {
    preceded(char(':'), number)(input)
}

fn bracket_atom(input: &str) -> Res<QueryAtom> {
    context(
        "bracket atom",
        alt((
            // A lone H, charged or not, is the hydrogen atom, not a hydrogen count.
            map(
                delimited(
                    char('['),
                    tuple((tag("H"), opt(charge), opt(atom_map))),
                    char(']'),
                ),
                |(_, charge, map_index)| {
                    let hydrogen = AtomExpr::Primitive(AtomPrimitive::AtomicNumber(1));
                    let expr = match charge {
                        Some(charge) => AtomExpr::And(vec![
                            hydrogen,
                            AtomExpr::Primitive(AtomPrimitive::Charge(charge)),
                        ]),
                        None => hydrogen,
                    };
                    QueryAtom { expr, map_index }
                },
            ),
            map(
                delimited(char('['), pair(atom_low, opt(atom_map)), char(']')),
                |(expr, map_index)| QueryAtom { expr, map_index },
            ),
        )),
    )(input)
}

fn element_expr(element: Element, aromatic: bool) -> AtomExpr {
    AtomExpr::And(vec![
        AtomExpr::Primitive(AtomPrimitive::AtomicNumber(element.atomic_number())),
        AtomExpr::Primitive(if aromatic {
            AtomPrimitive::Aromatic
        } else {
            AtomPrimitive::Aliphatic
        }),
    ])
}

/// Unbracketed atoms: the organic subset plus `*`, `a` and `A`.
fn organic_atom(input: &str) -> Res<AtomExpr> {
    alt((
        value(AtomExpr::Primitive(AtomPrimitive::Wildcard), char('*')),
        map(alt((tag("Cl"), tag("Br"))), |symbol: &str| {
            element_expr(Element::from_symbol(symbol).unwrap_or(Element::C), false)
        }),
        map(one_of("BCNOSPFI"), |c: char| {
            element_expr(Element::from_symbol(&c.to_string()).unwrap_or(Element::C), false)
        }),
        map(one_of("bcnosp"), |c: char| {
            element_expr(
                Element::from_symbol(&c.to_ascii_uppercase().to_string()).unwrap_or(Element::C),
                true,
            )
        }),
        value(AtomExpr::Primitive(AtomPrimitive::Aromatic), char('a')),
        value(AtomExpr::Primitive(AtomPrimitive::Aliphatic), char('A')),
    ))(input)
}

// Precedence, loosest first: `;`, `,`, `&` or juxtaposition, `!`.

fn atom_low(input: &str) -> Res<AtomExpr> {
    map(separated_list1(char(';'), atom_or), flatten_and)(input)
}

fn atom_or(input: &str) -> Res<AtomExpr> {
    map(separated_list1(char(','), atom_and), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            AtomExpr::Or(terms)
        }
    })(input)
}

fn atom_and(input: &str) -> Res<AtomExpr> {
    map(many1(preceded(opt(char('&')), atom_not)), flatten_and)(input)
}

fn flatten_and(mut terms: Vec<AtomExpr>) -> AtomExpr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        AtomExpr::And(terms)
    }
}

fn atom_not(input: &str) -> Res<AtomExpr> {
    map(pair(many0(char('!')), atom_primitive), |(bangs, expr)| {
        if bangs.len() % 2 == 1 {
            AtomExpr::Not(Box::new(expr))
        } else {
            expr
        }
    })(input)
}

fn atom_primitive(input: &str) -> Res<AtomExpr> {
    alt((
        recursive,
        value(AtomExpr::Primitive(AtomPrimitive::Wildcard), char('*')),
        map(preceded(char('#'), small_number), |n| {
            AtomExpr::Primitive(AtomPrimitive::AtomicNumber(n))
        }),
        map(charge, |c| AtomExpr::Primitive(AtomPrimitive::Charge(c))),
        map(aliphatic_symbol, |element| element_expr(element, false)),
        map(aromatic_symbol, |element| element_expr(element, true)),
        map(counted_primitive, AtomExpr::Primitive),
    ))(input)
}

fn recursive(input: &str) -> Res<AtomExpr> {
    context(
        "recursive SMARTS",
        map(
            delimited(tag("$("), map_res(chain, build), char(')')),
            |pattern| AtomExpr::Recursive(Box::new(pattern)),
        ),
    )(input)
}

fn charge(input: &str) -> Res<i8> {
    let (rest, sign) = one_of("+-")(input)?;
    let sign: i8 = if sign == '+' { 1 } else { -1 };
    if let Ok((rest, magnitude)) = small_number(rest) {
        return Ok((rest, sign * magnitude.min(i8::MAX as u8) as i8));
    }
    let repeated = rest.chars().take_while(|&c| c == if sign > 0 { '+' } else { '-' }).count();
    match i8::try_from(repeated + 1) {
        Ok(magnitude) => Ok((&rest[repeated..], sign * magnitude)),
        Err(_) => fail(input, ErrorKind::TooLarge),
    }
}

/// An uppercase element symbol. A single `H` is a hydrogen count instead.
fn aliphatic_symbol(input: &str) -> Res<Element> {
    let bytes = input.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_uppercase() && bytes[1].is_ascii_lowercase() {
        if let Some(element) = Element::from_symbol(&input[..2]) {
            return Ok((&input[2..], element));
        }
    }
    match bytes.first() {
        Some(b'H') => fail(input, ErrorKind::Alpha),
        Some(c) if c.is_ascii_uppercase() => match Element::from_symbol(&input[..1]) {
            Some(element) => Ok((&input[1..], element)),
            None => fail(input, ErrorKind::Alpha),
        },
        _ => fail(input, ErrorKind::Alpha),
    }
}

fn aromatic_symbol(input: &str) -> Res<Element> {
    alt((
        value(Element::Se, tag("se")),
        value(Element::As, tag("as")),
        value(Element::C, char('c')),
        value(Element::N, char('n')),
        value(Element::O, char('o')),
        value(Element::S, char('s')),
        value(Element::P, char('p')),
        value(Element::B, char('b')),
    ))(input)
}

fn counted_primitive(input: &str) -> Res<AtomPrimitive> {
    let (rest, letter) = one_of("aADHhXvRr")(input)?;
    let (rest, count) = opt(small_number)(rest)?;
    let primitive = match (letter, count) {
        ('a', None) => AtomPrimitive::Aromatic,
        ('A', None) => AtomPrimitive::Aliphatic,
        ('a' | 'A', Some(_)) => return fail(input, ErrorKind::Char),
        ('D', n) => AtomPrimitive::Degree(n.unwrap_or(1)),
        ('H', n) => AtomPrimitive::TotalHydrogens(n.unwrap_or(1)),
        ('h', n) => AtomPrimitive::ImplicitHydrogens(n.unwrap_or(1)),
        ('X', n) => AtomPrimitive::Connectivity(n.unwrap_or(1)),
        ('v', n) => AtomPrimitive::Valence(n.unwrap_or(1)),
        ('R', n) => AtomPrimitive::InRing(n != Some(0)),
        ('r', None) => AtomPrimitive::InRing(true),
        ('r', Some(0)) => AtomPrimitive::InRing(false),
        ('r', Some(n)) => AtomPrimitive::SmallestRing(n),
        _ => return fail(input, ErrorKind::Char),
    };
    Ok((rest, primitive))
}

// ---------------------------------------------------------------------
// Bonds
// ---------------------------------------------------------------------

fn bond_low(input: &str) -> Res<BondExpr> {
    map(separated_list1(char(';'), bond_or), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            BondExpr::And(terms)
        }
    })(input)
}

fn bond_or(input: &str) -> Res<BondExpr> {
    map(separated_list1(char(','), bond_and), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            BondExpr::Or(terms)
        }
    })(input)
}

fn bond_and(input: &str) -> Res<BondExpr> {
    map(many1(preceded(opt(char('&')), bond_not)), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            BondExpr::And(terms)
        }
    })(input)
}

fn bond_not(input: &str) -> Res<BondExpr> {
    map(pair(many0(char('!')), bond_primitive), |(bangs, expr)| {
        if bangs.len() % 2 == 1 {
            BondExpr::Not(Box::new(expr))
        } else {
            expr
        }
    })(input)
}

fn bond_primitive(input: &str) -> Res<BondExpr> {
    map(
        alt((
            value(BondPrimitive::Single, char('-')),
            value(BondPrimitive::Double, char('=')),
            value(BondPrimitive::Triple, char('#')),
            value(BondPrimitive::Aromatic, char(':')),
            value(BondPrimitive::Any, char('~')),
            value(BondPrimitive::Ring, char('@')),
        )),
        BondExpr::Primitive,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim(p: AtomPrimitive) -> AtomExpr {
        AtomExpr::Primitive(p)
    }

    #[test]
    fn test_wildcard_with_map() {
        let pattern = parse_smarts("[*:1]").unwrap();
        assert_eq!(pattern.atoms().len(), 1);
        assert_eq!(pattern.atoms()[0].expr, prim(AtomPrimitive::Wildcard));
        assert_eq!(pattern.atoms()[0].map_index, Some(1));
        assert!(pattern.bonds().is_empty());
    }

    #[test]
    fn test_operator_precedence() {
        let pattern = parse_smarts("[#6,#7;X3]").unwrap();
        assert_eq!(
            pattern.atoms()[0].expr,
            AtomExpr::And(vec![
                AtomExpr::Or(vec![
                    prim(AtomPrimitive::AtomicNumber(6)),
                    prim(AtomPrimitive::AtomicNumber(7)),
                ]),
                prim(AtomPrimitive::Connectivity(3)),
            ])
        );

        let pattern = parse_smarts("[CH3]").unwrap();
        assert_eq!(
            pattern.atoms()[0].expr,
            AtomExpr::And(vec![
                element_expr(Element::C, false),
                prim(AtomPrimitive::TotalHydrogens(3)),
            ])
        );

        let pattern = parse_smarts("[!#1&!R]").unwrap();
        assert_eq!(
            pattern.atoms()[0].expr,
            AtomExpr::And(vec![
                AtomExpr::Not(Box::new(prim(AtomPrimitive::AtomicNumber(1)))),
                AtomExpr::Not(Box::new(prim(AtomPrimitive::InRing(true)))),
            ])
        );
    }

    #[test]
    fn test_chain_branches_and_rings() {
        let pattern = parse_smarts("[#6:1](=O)-[OX2H1]").unwrap();
        assert_eq!(pattern.atoms().len(), 3);
        assert_eq!(pattern.bonds().len(), 2);
        assert_eq!(pattern.bonds()[0].expr, BondExpr::Primitive(BondPrimitive::Double));
        assert_eq!((pattern.bonds()[1].from, pattern.bonds()[1].to), (0, 2));

        let ring = parse_smarts("c1ccccc1").unwrap();
        assert_eq!(ring.atoms().len(), 6);
        assert_eq!(ring.bonds().len(), 6);
        assert_eq!(ring.neighbors(0).len(), 2);
    }

    #[test]
    fn test_recursive_environment() {
        let pattern = parse_smarts("[*;$(*~[#6]):1]").unwrap();
        let AtomExpr::And(terms) = &pattern.atoms()[0].expr else {
            panic!("expected a conjunction");
        };
        let AtomExpr::Recursive(inner) = &terms[1] else {
            panic!("expected a recursive environment");
        };
        assert_eq!(inner.atoms().len(), 2);
        assert_eq!(inner.bonds()[0].expr, BondExpr::Primitive(BondPrimitive::Any));
        assert_eq!(pattern.atoms()[0].map_index, Some(1));

        // Branches inside a recursive pattern close before its own ')'.
        assert!(parse_smarts("[$(C(=O)O)]").is_ok());
    }

    #[test]
    fn test_charges_and_hydrogen() {
        let pattern = parse_smarts("[N+;H4]").unwrap();
        assert_eq!(
            pattern.atoms()[0].expr,
            AtomExpr::And(vec![
                AtomExpr::And(vec![
                    element_expr(Element::N, false),
                    prim(AtomPrimitive::Charge(1)),
                ]),
                prim(AtomPrimitive::TotalHydrogens(4)),
            ])
        );
        let hydrogen = parse_smarts("[H]").unwrap();
        assert_eq!(hydrogen.atoms()[0].expr, prim(AtomPrimitive::AtomicNumber(1)));

        let proton = parse_smarts("[H+:2]").unwrap();
        assert_eq!(
            proton.atoms()[0].expr,
            AtomExpr::And(vec![
                prim(AtomPrimitive::AtomicNumber(1)),
                prim(AtomPrimitive::Charge(1)),
            ])
        );
        assert_eq!(proton.atoms()[0].map_index, Some(2));
        let hydride = parse_smarts("[H-]").unwrap();
        assert_eq!(
            hydride.atoms()[0].expr,
            AtomExpr::And(vec![
                prim(AtomPrimitive::AtomicNumber(1)),
                prim(AtomPrimitive::Charge(-1)),
            ])
        );
        // A hydrogen count on its own is still a count.
        assert_eq!(
            parse_smarts("[H2]").unwrap().atoms()[0].expr,
            prim(AtomPrimitive::TotalHydrogens(2))
        );
    }

    #[test]
    fn test_repeated_charge_signs() {
        assert_eq!(
            parse_smarts("[O--]").unwrap().atoms()[0].expr,
            AtomExpr::And(vec![
                element_expr(Element::O, false),
                prim(AtomPrimitive::Charge(-2)),
            ])
        );
        let too_many = format!("[C{}]", "+".repeat(128));
        assert!(parse_smarts(&too_many).is_err());
        let most = format!("[C{}]", "+".repeat(127));
        assert!(parse_smarts(&most).is_ok());
    }

    #[test]
    fn test_malformed_patterns() {
        assert!(parse_smarts("").is_err());
        assert!(parse_smarts("[#6").is_err());
        assert!(parse_smarts("C1CC").is_err());
        assert!(parse_smarts("C-").is_err());
        assert!(parse_smarts("C)").is_err());
        assert!(parse_smarts("[Q]").is_err());
    }

    #[test]
    fn test_atom_expression_detection() {
        assert!(is_atom_expression("X4"));
        assert!(is_atom_expression("$(*~[#6])"));
        assert!(is_atom_expression("#6,#7"));
        assert!(!is_atom_expression("~[#6]"));
        assert!(!is_atom_expression(""));
    }

    #[test]
    fn test_split_leading_atom() {
        assert_eq!(split_leading_atom("[*:1]"), Some(("*", Some(1), "")));
        assert_eq!(split_leading_atom("[#6X4]-[#8]"), Some(("#6X4", None, "-[#8]")));
        assert_eq!(split_leading_atom("ClC"), Some(("Cl", None, "C")));
        assert_eq!(split_leading_atom("~C"), None);
    }
}
