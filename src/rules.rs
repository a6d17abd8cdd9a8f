//! Ordered type rules, decorators and replacement bindings.

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::Path,
};

use tracing::*;

use crate::{
    format_typelist, is_atom_expression, parse_typelist, read_typelist, split_leading_atom, Label,
    PatternError, RuleFileError, TypeListEntry,
};

/// A pattern and the type it assigns. Refined rules remember the rule they
/// were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub pattern: String,
    pub label: Label,
    pub parent: Option<Label>,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, label: impl Into<Label>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
            parent: None,
        }
    }

    /// The pattern with every `$name` binding substituted.
    pub fn expanded_pattern(&self, bindings: &[ReplacementBinding]) -> String {
        expand_replacements(&self.pattern, bindings)
    }

    /// Conjoin a decorator with the leading atom of this rule.
    ///
    /// `[*:1]` refined by `X4` gives `[*;X4:1]`. Decorators that are not a
    /// bare atom expression become a recursive environment, so `~[#6]` gives
    /// `[*;$(*~[#6]):1]`. Both sides are expanded first, so the new pattern
    /// never depends on `bindings` again.
    pub fn refine(
        &self,
        decorator: &Decorator,
        bindings: &[ReplacementBinding],
    ) -> Result<Rule, PatternError> {
        let pattern = self.expanded_pattern(bindings);
        let fragment = expand_replacements(decorator.fragment.trim(), bindings);

        let (expr, map_index, rest) =
            split_leading_atom(&pattern).ok_or_else(|| PatternError::Structure {
                pattern: pattern.clone(),
                message: "pattern does not start with an atom".to_string(),
            })?;
        if fragment.is_empty() {
            return Err(PatternError::Structure {
                pattern: decorator.fragment.clone(),
                message: "empty decorator".to_string(),
            });
        }
        let decoration = if is_atom_expression(&fragment) {
            fragment
        } else {
            format!("$(*{fragment})")
        };
        let map = map_index.map(|n| format!(":{n}")).unwrap_or_default();

        Ok(Rule {
            pattern: format!("[{expr};{decoration}{map}]{rest}"),
            label: self.label.refined(&decorator.name),
            parent: Some(self.label.clone()),
        })
    }
}

/// A sub-pattern that can be conjoined with a rule to make it more specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    pub fragment: String,
    pub name: String,
}

impl Decorator {
    pub fn new(fragment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            name: name.into(),
        }
    }

    pub fn read_list(path: impl AsRef<Path>) -> Result<Vec<Self>, RuleFileError> {
        Ok(read_typelist(path)?.into_iter().map(Self::from).collect())
    }

    pub fn parse_list(text: &str, source_name: &str) -> Result<Vec<Self>, RuleFileError> {
        Ok(parse_typelist(text, source_name)?
            .into_iter()
            .map(Self::from)
            .collect())
    }
}

impl From<TypeListEntry> for Decorator {
    fn from(entry: TypeListEntry) -> Self {
        Self::new(entry.pattern, entry.name)
    }
}

/// A `$shortname` macro. Files list the fragment first, then the short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementBinding {
    pub shortname: String,
    pub fragment: String,
}

impl ReplacementBinding {
    pub fn new(shortname: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            shortname: shortname.into(),
            fragment: fragment.into(),
        }
    }

    pub fn read_list(path: impl AsRef<Path>) -> Result<Vec<Self>, RuleFileError> {
        Ok(read_typelist(path)?.into_iter().map(Self::from).collect())
    }

    pub fn parse_list(text: &str, source_name: &str) -> Result<Vec<Self>, RuleFileError> {
        Ok(parse_typelist(text, source_name)?
            .into_iter()
            .map(Self::from)
            .collect())
    }
}

impl From<TypeListEntry> for ReplacementBinding {
    fn from(entry: TypeListEntry) -> Self {
        Self::new(entry.name, entry.pattern)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace each `$name` with the recursive environment `$(fragment)`.
///
/// Names are whole identifiers; `$(` is left alone, as are names with no
/// binding. Fragments are not expanded again.
pub fn expand_replacements(pattern: &str, bindings: &[ReplacementBinding]) -> String {
    if bindings.is_empty() || !pattern.contains('$') {
        return pattern.to_string();
    }

    let mut expanded = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find('$') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let length = after
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(after.len());
        let name = &after[..length];
        match bindings.iter().find(|b| !name.is_empty() && b.shortname == name) {
            Some(binding) => {
                expanded.push_str("$(");
                expanded.push_str(&binding.fragment);
                expanded.push(')');
            }
            None => {
                expanded.push('$');
                expanded.push_str(name);
            }
        }
        rest = &after[length..];
    }
    expanded.push_str(rest);
    expanded
}

/// Rules in priority order: a later rule overrides an earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Build a rule list from file entries, rejecting repeated type names.
    pub fn from_entries(
        entries: Vec<TypeListEntry>,
        source_name: &str,
    ) -> Result<Self, RuleFileError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.name.clone()) {
                return Err(RuleFileError::DuplicateLabel {
                    source_name: source_name.to_string(),
                    line: entry.line,
                    label: entry.name,
                });
            }
            rules.push(Rule::new(entry.pattern, entry.name));
        }
        Ok(Self { rules })
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self, RuleFileError> {
        Self::from_entries(parse_typelist(text, source_name)?, source_name)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, RuleFileError> {
        let path = path.as_ref();
        let rules = Self::from_entries(read_typelist(path)?, &path.display().to_string())?;
        info!("Read {} rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), RuleFileError> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(|source| RuleFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.rules.iter().map(|rule| &rule.label)
    }

    pub fn position(&self, label: &Label) -> Option<usize> {
        self.rules.iter().position(|rule| &rule.label == label)
    }

    pub fn contains_label(&self, label: &Label) -> bool {
        self.position(label).is_some()
    }

    /// Whether some rule has `pattern` once bindings are expanded.
    pub fn contains_pattern(&self, pattern: &str, bindings: &[ReplacementBinding]) -> bool {
        let pattern = expand_replacements(pattern, bindings);
        self.rules
            .iter()
            .any(|rule| rule.expanded_pattern(bindings) == pattern)
    }

    pub fn remove(&mut self, index: usize) -> Rule {
        self.rules.remove(index)
    }

    pub fn insert(&mut self, index: usize, rule: Rule) {
        self.rules.insert(index, rule);
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }
}

impl Display for RuleList {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let text = format_typelist(self.rules.iter().map(|rule| {
            (
                rule.pattern.as_str(),
                rule.label.as_str(),
                rule.parent.as_ref().map(|parent| format!("child of {parent}")),
            )
        }));
        write!(f, "{text}")
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_atom_decorator() {
        let rule = Rule::new("[*:1]", "generic");
        let refined = rule.refine(&Decorator::new("X4", "tetravalent"), &[]).unwrap();
        assert_eq!(refined.pattern, "[*;X4:1]");
        assert_eq!(refined.label.as_str(), "generic tetravalent");
        assert_eq!(refined.parent, Some(Label::new("generic")));
    }

    #[test]
    fn test_refine_environment_decorator() {
        let rule = Rule::new("[#8:1]-[#1]", "hydroxyl oxygen");
        let refined = rule
            .refine(&Decorator::new("~[#6]", "bonded-to-carbon"), &[])
            .unwrap();
        assert_eq!(refined.pattern, "[#8;$(*~[#6]):1]-[#1]");
        assert!(crate::parse_smarts(&refined.pattern).is_ok());

        let organic = Rule::new("C", "carbon").refine(&Decorator::new("R", "ring"), &[]).unwrap();
        assert_eq!(organic.pattern, "[C;R]");
    }

    #[test]
    fn test_refine_rejects_unrefinable_pattern() {
        let rule = Rule::new("~C", "broken");
        assert!(rule.refine(&Decorator::new("X4", "x"), &[]).is_err());
    }

    #[test]
    fn test_expand_replacements() {
        let bindings = vec![
            ReplacementBinding::new("ewg", "[N+](=O)[O-]"),
            ReplacementBinding::new("ewg2", "C#N"),
        ];
        assert_eq!(
            expand_replacements("[#6;$ewg2]", &bindings),
            "[#6;$(C#N)]"
        );
        assert_eq!(
            expand_replacements("[$ewg,$(*=O)]", &bindings),
            "[$([N+](=O)[O-]),$(*=O)]"
        );
        assert_eq!(expand_replacements("[$unknown]", &bindings), "[$unknown]");
    }

    #[test]
    fn test_parse_and_serialize() {
        let mut rules = RuleList::parse("[*:1] generic\n[#6:1] carbon % comment\n", "base").unwrap();
        assert_eq!(rules.len(), 2);
        let refined = rules
            .get(0)
            .unwrap()
            .refine(&Decorator::new("X4", "X4"), &[])
            .unwrap();
        rules.insert(1, refined);

        let text = rules.to_string();
        assert!(text.contains("generic X4  % child of generic"));
        let reread = RuleList::parse(&text, "output").unwrap();
        assert_eq!(reread.len(), 3);
        assert_eq!(reread.position(&Label::new("generic X4")), Some(1));
    }

    #[test]
    fn test_duplicate_label_in_file() {
        let error = RuleList::parse("[#6] carbon\n[#7] carbon\n", "base").unwrap_err();
        assert!(matches!(error, RuleFileError::DuplicateLabel { line: 2, .. }));
    }

    #[test]
    fn test_contains_pattern_after_expansion() {
        let bindings = vec![ReplacementBinding::new("sp3", "[#6X4]")];
        let rules = RuleList::new(vec![Rule::new("[$sp3:1]", "sp3 carbon")]);
        assert!(rules.contains_pattern("[$([#6X4]):1]", &bindings));
        assert!(!rules.contains_pattern("[$([#6X3]):1]", &bindings));
    }
}
