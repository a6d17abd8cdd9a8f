use std::{
    collections::HashMap,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::{Arc, RwLock},
};

use lazy_static::lazy_static;

lazy_static! {
    static ref INTERNED_LABELS: RwLock<HashMap<String, Label>> = RwLock::new(HashMap::new());
}

/// An atom type name. Labels are interned, so cloning is a pointer copy and
/// equal labels usually compare by pointer.
#[allow(clippy::derived_hash_with_manual_eq, clippy::derive_ord_xor_partial_ord)]
#[derive(Clone, Hash, Eq, Ord)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(name: &str) -> Self {
        if let Some(label) = Label::lookup(name) {
            return label;
        }

        let mut labels = match INTERNED_LABELS.write() {
            Ok(labels) => labels,
            // A poisoned table is still a valid table.
            Err(poisoned) => poisoned.into_inner(),
        };
        labels
            .entry(name.to_string())
            .or_insert_with(|| Label(Arc::from(name)))
            .clone()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The interned label with this name, if there is one.
    pub fn lookup(name: &str) -> Option<Label> {
        INTERNED_LABELS
            .read()
            .ok()
            .and_then(|labels| labels.get(name).cloned())
    }

    /// The label of a rule refined from `self` by a decorator named `suffix`.
    ///
    /// Most refinements are proposals that get thrown away, so a new name is
    /// not added to the table. It still compares and hashes by its text.
    pub fn refined(&self, suffix: &str) -> Label {
        let name = format!("{} {}", self.0, suffix);
        Label::lookup(&name).unwrap_or_else(|| Label(Arc::from(name)))
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::new(s)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::new(&s)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

#[allow(clippy::non_canonical_partial_ord_impl)]
impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Some(std::cmp::Ordering::Equal);
        }
        self.0.partial_cmp(&other.0)
    }
}

impl Debug for Label {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:?}", &*self.0)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_storage() {
        let a = Label::new("c_aromatic");
        let b = Label::from("c_aromatic".to_string());
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_refined_label() {
        let parent = Label::new("generic");
        assert_eq!(parent.refined("bonded-to-carbon").as_str(), "generic bonded-to-carbon");
    }

    #[test]
    fn test_refined_labels_are_not_interned() {
        let parent = Label::new("refinement-parent");
        let child = parent.refined("never-kept");
        assert_eq!(Label::lookup("refinement-parent never-kept"), None);
        assert_eq!(child, Label::new("refinement-parent never-kept"));

        // Once the name is interned, refinement reuses it.
        let again = parent.refined("never-kept");
        let interned = Label::lookup("refinement-parent never-kept").unwrap();
        assert!(Arc::ptr_eq(&again.0, &interned.0));
    }
}
