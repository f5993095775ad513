//! Action values emitted when a leaf program wins a traversal.
//!
//! The action alphabet is user-supplied at graph construction. Integer and
//! string alphabets are the typical choices, so [`Action`] covers both while
//! staying equatable and hashable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single value from the graph's action alphabet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Numeric action, e.g. a class index.
    Int(i64),
    /// Named action, e.g. a command label.
    Label(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Int(v) => write!(f, "{}", v),
            Action::Label(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Action {
    fn from(v: i64) -> Self {
        Action::Int(v)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::Label(s.to_string())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::Label(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", Action::Int(3)), "3");
        assert_eq!(format!("{}", Action::from("left")), "left");
    }

    #[test]
    fn conversions() {
        assert_eq!(Action::from(5), Action::Int(5));
        assert_eq!(Action::from("go".to_string()), Action::Label("go".into()));
    }
}
