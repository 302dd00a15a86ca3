//! The top-down "grow-the-seed" matcher (C7): an alternative driver that
//! grows a single target clause from its seeds via a LIFO stack, rather
//! than sweeping every clause at every position like [`crate::pika`] does.
//!
//! Shares the clause model, grammar, memo table and monotonic replacement
//! rule with the bottom-up driver -- only the scheduling discipline differs.

use tracing::trace;

use crate::clause::{ClauseId, ClauseKind};
use crate::grammar::Grammar;
use crate::memo::{MemoEntry, MemoKey, MemoTable};
use crate::tree::ParseTree;

pub struct GrowParser<'g> {
  grammar: &'g Grammar,
  input: String,
  memo: MemoTable,
}

impl<'g> GrowParser<'g> {
  pub fn new(grammar: &'g Grammar, input: impl Into<String>) -> Self {
    Self { grammar, input: input.into(), memo: MemoTable::new() }
  }

  pub fn memo_table(&self) -> &MemoTable {
    &self.memo
  }

  #[tracing::instrument(skip(self), fields(input_len = self.input.len()))]
  pub fn parse(mut self) -> Option<ParseTree> {
    let len = self.input.len();
    let start = self.grammar.start();
    let entry = self.match_at(0, start)?;
    match entry {
      MemoEntry::Match { len: matched, content, .. } if matched == len => Some(content),
      _ => None,
    }
  }

  /// Returns `clause`'s match at `pos`, memoizing on demand.
  fn match_at(&mut self, pos: usize, clause: ClauseId) -> Option<MemoEntry> {
    let key = MemoKey { position: pos, clause };
    if let Some(entry) = self.memo.get(key) {
      return Some(entry.clone());
    }
    self.grow(pos, clause);
    self.memo.get(key).cloned()
  }

  /// Grows `target`'s memo entry at `pos` from its seeds, per §4.7: push
  /// every seed onto a LIFO stack (reversed so the first-declared seed pops
  /// first), then repeatedly recompute and propagate to saplings whose
  /// priority does not exceed the target's, until the stack empties or
  /// `target` itself is stored.
  fn grow(&mut self, pos: usize, target: ClauseId) {
    let arena = self.grammar.arena();
    let target_priority = arena.get(target).priority;
    let seeds = arena.get(target).seeds.clone();
    debug_assert!(!seeds.is_empty(), "validate_seeds guarantees every clause has seeds");

    let mut stack: Vec<ClauseId> = seeds;
    stack.reverse();

    while let Some(clause) = stack.pop() {
      let outcome = match_clause(self, clause, pos);
      let key = MemoKey { position: pos, clause };

      match outcome {
        Some(entry) => {
          let stored = self.memo.insert_or_replace(key, entry);
          let arena = self.grammar.arena();
          trace!(pos, clause = %clause, stored, "matched");
          if clause == target && stored {
            // Reaching the target doesn't mean it's done growing: a
            // left-recursive rule's first stored match is only the seed
            // length. Discard pending lower-priority work and keep
            // pushing the target's own saplings so it can re-match longer.
            stack.clear();
          }
          if stored {
            for &sapling in &arena.get(clause).saplings {
              if arena.get(sapling).priority <= target_priority {
                stack.push(sapling);
              }
            }
          } else {
            for &sapling in &arena.get(clause).saplings {
              if arena.get(sapling).priority <= target_priority && arena.get(sapling).matches_empty {
                stack.push(sapling);
              }
            }
          }
        }
        None => {
          let arena = self.grammar.arena();
          for &sapling in &arena.get(clause).saplings {
            if arena.get(sapling).priority <= target_priority && arena.get(sapling).matches_empty {
              stack.push(sapling);
            }
          }
        }
      }
    }
  }
}

fn match_clause(parser: &mut GrowParser, clause: ClauseId, pos: usize) -> Option<MemoEntry> {
  let arena = parser.grammar.arena();
  let node = arena.get(clause);
  let remainder = &parser.input[pos.min(parser.input.len())..];

  match node.kind.clone() {
    ClauseKind::Str(s) => {
      if remainder.starts_with(s.as_str()) {
        Some(MemoEntry::matched(s.len(), ParseTree::leaf(s)))
      } else {
        None
      }
    }
    ClauseKind::Rgx(_) => {
      let re = parser.grammar.arena().regex(clause)?.clone();
      let m = re.find(remainder)?;
      if m.start() != 0 {
        return None;
      }
      Some(MemoEntry::matched(m.len(), ParseTree::leaf(m.as_str())))
    }
    ClauseKind::Seq(children) => {
      let mut total = 0;
      let mut parts = Vec::with_capacity(children.len());
      for child in children {
        let entry = parser.match_at(pos + total, child)?;
        total += entry.len()?;
        parts.push(entry.content()?.clone());
      }
      Some(MemoEntry::matched(total, ParseTree::List(parts)))
    }
    ClauseKind::Alt(children) => {
      let mut best: Option<(usize, ParseTree, usize)> = None;
      for (i, child) in children.into_iter().enumerate() {
        if let Some(entry) = parser.match_at(pos, child) {
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
      // Returns the consumed length, not the absolute scan position --
      // correcting the reference top-down grower's `curr_index` bug.
      let mut total = 0;
      let mut parts = Vec::new();
      loop {
        match parser.match_at(pos + total, child) {
          Some(entry) if entry.len() == Some(0) && !parts.is_empty() => break,
          Some(entry) => {
            let len = entry.len()?;
            parts.push(entry.content()?.clone());
            total += len;
          }
          None => break,
        }
      }
      if parts.len() >= min {
        Some(MemoEntry::matched(total, ParseTree::List(parts)))
      } else {
        None
      }
    }
    ClauseKind::Opt(child) => match parser.match_at(pos, child) {
      Some(entry) => Some(MemoEntry::matched(entry.len()?, ParseTree::node(entry.content()?.clone()))),
      None => Some(MemoEntry::matched(0, ParseTree::Empty)),
    },
    ClauseKind::Look(child) => match parser.match_at(pos, child) {
      Some(entry) => Some(MemoEntry::matched(0, ParseTree::node(entry.content()?.clone()))),
      None => None,
    },
    ClauseKind::NLook(child) => match parser.match_at(pos, child) {
      Some(_) => None,
      None => Some(MemoEntry::matched(0, ParseTree::Empty)),
    },
    ClauseKind::Rule(_, Some(body)) => {
      let entry = parser.match_at(pos, body)?;
      Some(MemoEntry::matched(entry.len()?, ParseTree::node(entry.content()?.clone())))
    }
    ClauseKind::Rule(_, None) => None,
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
    let tree = GrowParser::new(&grammar, "1").parse().unwrap();
    assert_eq!(tree.to_string(), "\"1\"");
  }

  #[test]
  fn test_left_recursive_addition_chain_matches_bottom_up() {
    let grammar = left_recursive_expr_grammar();
    let tree = GrowParser::new(&grammar, "1+2+3").parse().unwrap();
    assert_eq!(tree.to_string(), "[[\"1\", \"+\", \"2\"], \"+\", \"3\"]");
  }

  #[test]
  fn test_non_matching_input_returns_none() {
    let grammar = left_recursive_expr_grammar();
    assert!(GrowParser::new(&grammar, "1+").parse().is_none());
  }
}
