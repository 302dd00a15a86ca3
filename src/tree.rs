//! Parse trees (C6/C7 output shape): the value recorded alongside a
//! [`crate::memo::MemoEntry::Match`] and returned to callers of
//! [`crate::pika::PikaParser::parse`] / [`crate::grow::GrowParser::parse`].

use std::fmt;

/// A parsed value. Four shapes suffice for every clause variant in the
/// clause model (C1): terminals produce strings, `Seq`/`Mult` produce
/// lists, `Alt`/`Rule`/present-`Opt`/`Look` wrap a single child, and
/// zero-length lookaheads/absent-`Opt` produce nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree {
  /// The text a `Str` or `Rgx` terminal matched.
  Leaf(String),
  /// The ordered results of a `Seq` or the accumulated matches of a `Mult`.
  List(Vec<ParseTree>),
  /// The single child result of an `Alt` branch, a `Rule`, a present `Opt`,
  /// or a successful `Look`.
  Node(Box<ParseTree>),
  /// An absent `Opt`, or the zero-length result of `Look`/`NLook`.
  Empty,
}

impl ParseTree {
  pub fn leaf(s: impl Into<String>) -> Self {
    ParseTree::Leaf(s.into())
  }

  pub fn node(child: ParseTree) -> Self {
    ParseTree::Node(Box::new(child))
  }

  pub fn as_leaf(&self) -> Option<&str> {
    match self {
      ParseTree::Leaf(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[ParseTree]> {
    match self {
      ParseTree::List(items) => Some(items),
      _ => None,
    }
  }
}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParseTree::Leaf(s) => write!(f, "{s:?}"),
      ParseTree::List(items) => {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{item}")?;
        }
        write!(f, "]")
      }
      ParseTree::Node(child) => write!(f, "{child}"),
      ParseTree::Empty => write!(f, "None"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_matches_nested_shape() {
    let tree = ParseTree::List(vec![
      ParseTree::node(ParseTree::leaf("1")),
      ParseTree::leaf("+"),
      ParseTree::leaf("2"),
    ]);
    assert_eq!(tree.to_string(), "[\"1\", \"+\", \"2\"]");
  }

  #[test]
  fn test_empty_display() {
    assert_eq!(ParseTree::Empty.to_string(), "None");
  }
}
