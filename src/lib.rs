//! A left-recursive, fully memoizing PEG parser engine in the style of the
//! Pika parser: clauses are scheduled bottom-up by a priority queue derived
//! from the grammar's topological order, seeded by terminal matches, and
//! grown to a fixed point at each input position. A top-down "grow the
//! seed" driver sharing the same grammar and memo-table model is also
//! provided.

#[macro_use]
extern crate lazy_static;

pub mod clause;
pub mod grammar;
pub mod grow;
pub mod memo;
pub mod pika;
pub mod queue;
pub mod syntax;
pub mod tree;

pub use clause::{ClauseArena, ClauseId, ClauseKind};
pub use grammar::{Grammar, GrammarError};
pub use grow::GrowParser;
pub use memo::{MemoEntry, MemoKey, MemoTable};
pub use pika::PikaParser;
pub use queue::ClauseQueue;
pub use syntax::{GrammarParseError, SyntaxError};
pub use tree::ParseTree;

/// A boxed, dynamically-typed error, for callers (chiefly the CLI) that
/// want to absorb either a [`GrammarError`], a [`SyntaxError`], or a
/// [`GrammarParseError`] behind one type.
pub type Err = Box<dyn std::error::Error + 'static>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_left_recursive_expression_grammar_end_to_end() {
    let grammar: Grammar = r#"
      expr <- expr "+" num | num ;
      num  <- /[0-9]+/ ;
    "#
    .parse()
    .unwrap();

    let tree = PikaParser::new(&grammar, "1+2+3").parse().unwrap();
    assert_eq!(tree.to_string(), "[[\"1\", \"+\", \"2\"], \"+\", \"3\"]");

    let tree = GrowParser::new(&grammar, "1+2+3").parse().unwrap();
    assert_eq!(tree.to_string(), "[[\"1\", \"+\", \"2\"], \"+\", \"3\"]");
  }

  #[test]
  fn test_mutual_left_recursion_is_supported() {
    let grammar: Grammar = r#"
      a <- b "x" | "a" ;
      b <- a "y" | "b" ;
    "#
    .parse()
    .unwrap();

    assert!(PikaParser::new(&grammar, "a").parse().is_some());
    assert!(PikaParser::new(&grammar, "ayx").parse().is_some());
    assert!(PikaParser::new(&grammar, "axy").parse().is_none());
  }

  #[test]
  fn test_no_parse_on_mismatched_input() {
    let grammar: Grammar = r#"
      expr <- expr "+" num | num ;
      num  <- /[0-9]+/ ;
    "#
    .parse()
    .unwrap();

    assert!(PikaParser::new(&grammar, "1+").parse().is_none());
    assert!(PikaParser::new(&grammar, "").parse().is_none());
  }
}
