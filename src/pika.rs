//! The bottom-up Pika matcher (C6): drives the scheduling queue forward
//! through input positions, growing the memo table to a fixed point at each
//! position before moving to the next.

use tracing::trace;

use crate::clause::{ClauseId, ClauseKind};
use crate::grammar::Grammar;
use crate::memo::{MemoEntry, MemoKey, MemoTable};
use crate::queue::ClauseQueue;
use crate::tree::ParseTree;

/// Runs the bottom-up Pika algorithm over a single input string against a
/// [`Grammar`]. Consumed by [`PikaParser::parse`]; the memo table remains
/// inspectable afterwards via [`PikaParser::memo_table`] for diagnostics
/// (e.g. the CLI's `--chart` flag).
pub struct PikaParser<'g> {
  grammar: &'g Grammar,
  input: String,
  memo: MemoTable,
}

impl<'g> PikaParser<'g> {
  pub fn new(grammar: &'g Grammar, input: impl Into<String>) -> Self {
    Self { grammar, input: input.into(), memo: MemoTable::new() }
  }

  pub fn memo_table(&self) -> &MemoTable {
    &self.memo
  }

  /// Runs the algorithm to completion and returns the start rule's parse
  /// tree, if and only if it matched the entire input.
  ///
  /// Positions are swept **descending**, from `len` down to `0`: a clause
  /// starting at `pos` that consumes forward (`Seq`/`Mult`) needs its later
  /// children's matches at positions `> pos`, which is only guaranteed
  /// available if those positions were already driven to their fixed point
  /// first.
  #[tracing::instrument(skip(self), fields(input_len = self.input.len()))]
  pub fn parse(mut self) -> Option<ParseTree> {
    let len = self.input.len();
    for pos in (0..=len).rev() {
      self.run_position(pos);
    }

    let key = MemoKey { position: 0, clause: self.grammar.start() };
    match self.memo.get(key) {
      Some(MemoEntry::Match { len: matched, content, .. }) if *matched == len => Some(content.clone()),
      _ => None,
    }
  }

  fn run_position(&mut self, pos: usize) {
    let arena = self.grammar.arena();
    let mut queue = ClauseQueue::new();
    for id in arena.ids() {
      if arena.get(id).kind.is_terminal() {
        queue.push(id, arena.get(id).priority);
      }
    }

    while let Some(clause) = queue.pop() {
      let node = arena.get(clause);
      let outcome = match_clause(self, clause, pos);
      let key = MemoKey { position: pos, clause };

      match outcome {
        Some(entry) => {
          let stored = self.memo.insert_or_replace(key, entry);
          trace!(pos, clause = %clause, stored, "matched");
          if stored {
            for &sapling in &node.saplings {
              queue.push(sapling, arena.get(sapling).priority);
            }
          } else {
            for &sapling in &node.saplings {
              if arena.get(sapling).matches_empty {
                queue.push(sapling, arena.get(sapling).priority);
              }
            }
          }
        }
        None => {
          for &sapling in &node.saplings {
            if arena.get(sapling).matches_empty {
              queue.push(sapling, arena.get(sapling).priority);
            }
          }
        }
      }
    }
  }
}

/// Computes `clause`'s match at `pos`, consulting `parser.memo` for its
/// children. Returns `None` on failure (not stored by the caller unless it
/// would overwrite an existing success, per the monotonic rule enforced in
/// [`MemoTable::insert_or_replace`]).
fn match_clause(parser: &PikaParser, clause: ClauseId, pos: usize) -> Option<MemoEntry> {
  let arena = parser.grammar.arena();
  let node = arena.get(clause);
  let remainder = &parser.input[pos.min(parser.input.len())..];

  match &node.kind {
    ClauseKind::Str(s) => {
      if remainder.starts_with(s.as_str()) {
        Some(MemoEntry::matched(s.len(), ParseTree::leaf(s.clone())))
      } else {
        None
      }
    }
    ClauseKind::Rgx(_) => {
      let re = arena.regex(clause)?;
      let m = re.find(remainder)?;
      if m.start() != 0 {
        return None;
      }
      Some(MemoEntry::matched(m.len(), ParseTree::leaf(m.as_str())))
    }
    ClauseKind::Seq(children) => {
      let mut total = 0;
      let mut parts = Vec::with_capacity(children.len());
      for &child in children {
        let entry = lookup_match(parser, child, pos + total)?;
        total += entry.len()?;
        parts.push(entry.content()?.clone());
      }
      Some(MemoEntry::matched(total, ParseTree::List(parts)))
    }
    ClauseKind::Alt(children) => {
      let mut best: Option<(usize, ParseTree, usize)> = None;
      for (i, &child) in children.iter().enumerate() {
        if let Some(entry) = lookup_match(parser, child, pos) {
          let len = entry.len()?;
          let alt_prec = i + 1;
          let better = match &best {
            None => true,
            Some((blen, _, bprec)) => len > *blen || (len == *blen && alt_prec < *bprec),
          };
          if better {
            best = Some((len, entry.content()?.clone(), alt_prec));
          }
        }
      }
      best.map(|(len, content, alt_prec)| MemoEntry::matched_alt(len, content, alt_prec))
    }
    ClauseKind::Mult(min, child) => {
      let mut total = 0;
      let mut parts = Vec::new();
      loop {
        match lookup_match(parser, *child, pos + total) {
          Some(entry) if entry.len() == Some(0) && !parts.is_empty() => break,
          Some(entry) => {
            let len = entry.len()?;
            parts.push(entry.content()?.clone());
            total += len;
          }
          None => break,
        }
      }
      if parts.len() >= *min {
        Some(MemoEntry::matched(total, ParseTree::List(parts)))
      } else {
        None
      }
    }
    ClauseKind::Opt(child) => match lookup_match(parser, *child, pos) {
      Some(entry) => Some(MemoEntry::matched(entry.len()?, ParseTree::node(entry.content()?.clone()))),
      None => Some(MemoEntry::matched(0, ParseTree::Empty)),
    },
    ClauseKind::Look(child) => match lookup_match(parser, *child, pos) {
      Some(entry) => Some(MemoEntry::matched(0, ParseTree::node(entry.content()?.clone()))),
      None => None,
    },
    ClauseKind::NLook(child) => match lookup_match(parser, *child, pos) {
      Some(_) => None,
      None => Some(MemoEntry::matched(0, ParseTree::Empty)),
    },
    ClauseKind::Rule(_, Some(body)) => {
      let entry = lookup_match(parser, *body, pos)?;
      Some(MemoEntry::matched(entry.len()?, ParseTree::node(entry.content()?.clone())))
    }
    ClauseKind::Rule(_, None) => None,
  }
}

/// Reads a child's memoized outcome at `pos`. Children that `matches_empty`
/// but have no stored entry yet are treated as an implicit zero-length
/// match so that a not-yet-scheduled empty-matching child doesn't block its
/// parent on the first queue pass.
fn lookup_match(parser: &PikaParser, clause: ClauseId, pos: usize) -> Option<MemoEntry> {
  let key = MemoKey { position: pos, clause };
  match parser.memo.get(key) {
    Some(entry @ MemoEntry::Match { .. }) => Some(entry.clone()),
    Some(MemoEntry::Fail) => None,
    None => {
      if parser.grammar.arena().get(clause).matches_empty {
        Some(MemoEntry::matched(0, ParseTree::Empty))
      } else {
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clause::ClauseArena;

  fn left_recursive_expr_grammar() -> Grammar {
    let mut arena = ClauseArena::new();
    let expr = arena.rule_ref("expr");
    let num = arena.rule_ref("num");
    let plus = arena.str("+");
    let seq = arena.seq(vec![expr, plus, num]);
    let body = arena.alt(vec![seq, num]);
    arena.define_rule("expr", body);

    let digit = arena.rgx(r"[0-9]+").unwrap();
    arena.define_rule("num", digit);

    Grammar::new(arena, vec!["expr".to_string(), "num".to_string()]).unwrap()
  }

  #[test]
  fn test_single_number_matches() {
    let grammar = left_recursive_expr_grammar();
    let tree = PikaParser::new(&grammar, "1").parse().unwrap();
    assert_eq!(tree.to_string(), "\"1\"");
  }

  #[test]
  fn test_left_recursive_addition_chain() {
    let grammar = left_recursive_expr_grammar();
    let tree = PikaParser::new(&grammar, "1+2+3").parse().unwrap();
    assert_eq!(tree.to_string(), "[[\"1\", \"+\", \"2\"], \"+\", \"3\"]");
  }

  #[test]
  fn test_non_matching_input_returns_none() {
    let grammar = left_recursive_expr_grammar();
    assert!(PikaParser::new(&grammar, "1+").parse().is_none());
  }

  #[test]
  fn test_negative_lookahead_blocks_keyword_prefix() {
    let mut arena = ClauseArena::new();
    let kw = arena.str("end");
    let nl = arena.nlook(kw);
    let word = arena.rgx("[a-z]+").unwrap();
    let seq = arena.seq(vec![nl, word]);
    arena.define_rule("ident", seq);
    let grammar = Grammar::new(arena, vec!["ident".to_string()]).unwrap();

    assert!(PikaParser::new(&grammar, "endless").parse().is_none());
    assert!(PikaParser::new(&grammar, "foo").parse().is_some());
  }

  #[test]
  fn test_greedy_repetition_consumes_maximally() {
    let mut arena = ClauseArena::new();
    let digit = arena.rgx("[0-9]").unwrap();
    let digits = arena.mult(1, digit);
    arena.define_rule("digits", digits);
    let grammar = Grammar::new(arena, vec!["digits".to_string()]).unwrap();

    let tree = PikaParser::new(&grammar, "123").parse().unwrap();
    assert_eq!(tree.as_list().unwrap().len(), 3);
  }
}
