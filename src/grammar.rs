//! The rule resolver (C2) and grammar compiler (C3): turns a [`ClauseArena`]
//! of possibly-unresolved, unprioritized clauses into a [`Grammar`] whose
//! clauses all carry final `priority`, `matches_empty`, `seeds` and
//! `saplings`.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;

use tracing::debug;

use crate::clause::{ClauseArena, ClauseId, ClauseKind};

/// Compile-time failures from [`Grammar::new`]. All are fatal: a grammar
/// that doesn't compile cannot be parsed with.
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
  /// `Grammar::new` was called with an empty rule list.
  EmptyRuleset,
  /// A `Rule` clause was referenced (via `rule_ref`) but never defined.
  UnresolvedRule(String),
  /// `Mult(1, c)` where `c` can match empty: the loop would never terminate.
  LeftRecursiveEmptyLoop(String),
  /// `Look`/`NLook` whose child can match empty: the lookahead would be
  /// trivially, uselessly true (or false) at every position.
  EmptyLookahead(String),
  /// A clause reachable in the grammar has no terminal seeds to start it
  /// from (e.g. an `Alt` none of whose branches bottom out in a terminal).
  NoSeeds(String),
  /// A `Rgx` clause's pattern failed to compile. Surfaced here (rather than
  /// only at `ClauseArena::rgx` call sites) so that grammars built through
  /// the surface syntax front-end (C8) report it as a single error kind.
  InvalidRegex(String, String),
}

impl fmt::Display for GrammarError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GrammarError::EmptyRuleset => write!(f, "grammar has no rules"),
      GrammarError::UnresolvedRule(name) => write!(f, "unresolved rule reference: {name}"),
      GrammarError::LeftRecursiveEmptyLoop(clause) => {
        write!(f, "clause `{clause}` is a one-or-more repetition of an empty-matching clause")
      }
      GrammarError::EmptyLookahead(clause) => {
        write!(f, "clause `{clause}` is a lookahead over an empty-matching clause")
      }
      GrammarError::NoSeeds(clause) => {
        write!(f, "clause `{clause}` has no terminal seeds to start a match from")
      }
      GrammarError::InvalidRegex(pattern, reason) => {
        write!(f, "invalid regex `{pattern}`: {reason}")
      }
    }
  }
}

impl Error for GrammarError {}

/// A compiled grammar: an arena whose clauses all carry final derived
/// attributes, plus the name of the start rule.
///
/// Immutable after construction. `&Grammar` may be shared across any number
/// of concurrent [`crate::pika::PikaParser`]/[`crate::grow::GrowParser`]
/// instances, each of which owns its own memo table.
#[derive(Debug)]
pub struct Grammar {
  pub(crate) arena: ClauseArena,
  pub(crate) start: ClauseId,
  pub(crate) rule_ids: HashMap<String, ClauseId>,
}

impl Grammar {
  /// Compiles `arena` into a `Grammar`. `rule_names` lists the grammar's
  /// declared rules in order; the first is the start rule. Every name must
  /// already have a canonical `Rule` clause in `arena` (via `rule_ref`/
  /// `define_rule`).
  #[tracing::instrument(skip(arena), fields(rules = rule_names.len()))]
  pub fn new(mut arena: ClauseArena, rule_names: Vec<String>) -> Result<Self, GrammarError> {
    if rule_names.is_empty() {
      return Err(GrammarError::EmptyRuleset);
    }

    let rule_ids: HashMap<String, ClauseId> = rule_names
      .iter()
      .map(|name| (name.clone(), arena.rule_ref(name)))
      .collect();
    let start = rule_ids[&rule_names[0]];

    link_rules(&arena, &rule_ids)?;

    let order = topo_sort(&arena, &rule_ids);
    debug!(pass = "topo_sort", clauses = order.len(), "assigned priorities");
    for (priority, &id) in order.iter().enumerate() {
      arena.get_mut(id).priority = priority;
    }

    compute_matches_empty(&mut arena, &order)?;
    debug!(pass = "matches_empty", "fixed point reached");

    compute_saplings(&mut arena, &order);
    debug!(pass = "saplings", "reverse adjacency built");

    compute_seeds(&mut arena, &order);
    debug!(pass = "seeds", "fixed point reached");

    validate_seeds(&arena, &order)?;

    Ok(Grammar { arena, start, rule_ids })
  }

  pub fn start(&self) -> ClauseId {
    self.start
  }

  pub fn arena(&self) -> &ClauseArena {
    &self.arena
  }

  pub fn clause_count(&self) -> usize {
    self.arena.len()
  }

  pub fn rule(&self, name: &str) -> Option<ClauseId> {
    self.rule_ids.get(name).copied()
  }
}

/// C2: checks that every `Rule` clause reachable from `rule_ids` has a body.
/// There is nothing to "replace" at the arena level -- `rule_ref` already
/// hands out the canonical id for a name -- so linking here is purely a
/// validation pass over the clauses already in place.
fn link_rules(arena: &ClauseArena, rule_ids: &HashMap<String, ClauseId>) -> Result<(), GrammarError> {
  let mut visited = HashSet::new();
  let mut stack: Vec<ClauseId> = rule_ids.values().copied().collect();
  while let Some(id) = stack.pop() {
    if !visited.insert(id) {
      continue;
    }
    let node = arena.get(id);
    if let ClauseKind::Rule(name, body) = &node.kind {
      if body.is_none() {
        return Err(GrammarError::UnresolvedRule(name.clone()));
      }
    }
    stack.extend(node.kind.children());
  }
  Ok(())
}

fn reachable_from(arena: &ClauseArena, roots: &[ClauseId]) -> Vec<ClauseId> {
  fn visit(arena: &ClauseArena, id: ClauseId, visited: &mut HashSet<ClauseId>, out: &mut Vec<ClauseId>) {
    if !visited.insert(id) {
      return;
    }
    for child in arena.get(id).kind.children() {
      visit(arena, child, visited, out);
    }
    out.push(id);
  }

  let mut visited = HashSet::new();
  let mut out = Vec::new();
  for &root in roots {
    visit(arena, root, &mut visited, &mut out);
  }
  out
}

fn cycle_heads_in(arena: &ClauseArena, roots: &[ClauseId]) -> HashSet<ClauseId> {
  fn visit(
    arena: &ClauseArena,
    id: ClauseId,
    discovered: &mut HashSet<ClauseId>,
    finished: &mut HashSet<ClauseId>,
    heads: &mut HashSet<ClauseId>,
  ) {
    discovered.insert(id);
    for child in arena.get(id).kind.children() {
      if discovered.contains(&child) {
        heads.insert(child);
      } else if !finished.contains(&child) {
        visit(arena, child, discovered, finished, heads);
      }
    }
    discovered.remove(&id);
    finished.insert(id);
  }

  let mut discovered = HashSet::new();
  let mut finished = HashSet::new();
  let mut heads = HashSet::new();
  for &root in roots {
    if !finished.contains(&root) {
      visit(arena, root, &mut discovered, &mut finished, &mut heads);
    }
  }
  heads
}

/// Reachability + top-clause detection + cycle-head detection + topological
/// numbering (C3 steps 2-5), collapsed into one ordered list whose index is
/// the clause's final `priority`.
fn topo_sort(arena: &ClauseArena, rule_ids: &HashMap<String, ClauseId>) -> Vec<ClauseId> {
  let all_rules: Vec<ClauseId> = rule_ids.values().copied().collect();
  let all_clauses = reachable_from(arena, &all_rules);

  let mut top_clauses: HashSet<ClauseId> = all_clauses.iter().copied().collect();
  for &id in &all_clauses {
    for child in arena.get(id).kind.children() {
      top_clauses.remove(&child);
    }
  }

  let top_vec: Vec<ClauseId> = top_clauses.into_iter().collect();
  let mut cycle_head_roots = top_vec.clone();
  cycle_head_roots.extend(all_rules.iter().copied());
  let cycle_heads = cycle_heads_in(arena, &cycle_head_roots);

  let mut roots = top_vec;
  roots.extend(cycle_heads);

  reachable_from(arena, &roots)
}

/// C3 step 6: fixed-point propagation of `matches_empty`, in priority order
/// (children have lower priority than parents on non-cycle edges, so one
/// pass suffices outside of cycles; repeat until stable to cover cycles).
fn compute_matches_empty(arena: &mut ClauseArena, order: &[ClauseId]) -> Result<(), GrammarError> {
  let mut changed = true;
  while changed {
    changed = false;
    for &id in order {
      let new_value = matches_empty_for(arena, id)?;
      let node = arena.get_mut(id);
      if node.matches_empty != new_value {
        node.matches_empty = new_value;
        changed = true;
      }
    }
  }
  Ok(())
}

fn matches_empty_for(arena: &ClauseArena, id: ClauseId) -> Result<bool, GrammarError> {
  let node = arena.get(id);
  Ok(match &node.kind {
    ClauseKind::Rule(_, Some(body)) => arena.get(*body).matches_empty,
    ClauseKind::Rule(_, None) => false,
    ClauseKind::Seq(cs) => cs.iter().all(|c| arena.get(*c).matches_empty),
    ClauseKind::Alt(cs) => cs.iter().any(|c| arena.get(*c).matches_empty),
    ClauseKind::Mult(min, c) => {
      let child_empty = arena.get(*c).matches_empty;
      if *min == 0 {
        true
      } else if child_empty {
        return Err(GrammarError::LeftRecursiveEmptyLoop(node.kind.to_string()));
      } else {
        false
      }
    }
    ClauseKind::Opt(_) => true,
    ClauseKind::Look(c) => {
      if arena.get(*c).matches_empty {
        return Err(GrammarError::EmptyLookahead(node.kind.to_string()));
      }
      false
    }
    ClauseKind::NLook(c) => {
      if arena.get(*c).matches_empty {
        return Err(GrammarError::EmptyLookahead(node.kind.to_string()));
      }
      true
    }
    ClauseKind::Str(s) => s.is_empty(),
    ClauseKind::Rgx(_) => false,
  })
}

/// C3 step 7: each clause registers itself on the saplings list of the
/// children whose match would advance it (the "prefix rule" from the data
/// model: for `Seq`, every child up to and including the first
/// non-empty-matching one).
fn compute_saplings(arena: &mut ClauseArena, order: &[ClauseId]) {
  for &id in order {
    let parents_of = {
      let node = arena.get(id);
      match &node.kind {
        ClauseKind::Seq(cs) => {
          let mut targets = Vec::new();
          for &c in cs {
            targets.push(c);
            if !arena.get(c).matches_empty {
              break;
            }
          }
          targets
        }
        other => other.children(),
      }
    };
    for child in parents_of {
      if !arena.get(child).saplings.contains(&id) {
        arena.get_mut(child).saplings.push(id);
      }
    }
  }
}

/// C3 step 8: seeds fixed point. Terminals seed themselves; everyone else
/// inherits along the same prefix rule used for saplings, re-propagating
/// along `saplings` edges until no clause's seed set grows any further.
fn compute_seeds(arena: &mut ClauseArena, order: &[ClauseId]) {
  let mut queue: Vec<ClauseId> = Vec::new();
  for &id in order {
    if arena.get(id).kind.is_terminal() {
      arena.get_mut(id).seeds = vec![id];
      queue.push(id);
    }
  }

  let mut queued: HashSet<ClauseId> = queue.iter().copied().collect();
  while let Some(id) = queue.pop() {
    queued.remove(&id);
    for parent in arena.get(id).saplings.clone() {
      let new_seeds = seeds_for(arena, parent);
      let changed = arena.get(parent).seeds != new_seeds;
      if changed {
        arena.get_mut(parent).seeds = new_seeds;
        if queued.insert(parent) {
          queue.push(parent);
        }
      }
    }
  }
}

fn seeds_for(arena: &ClauseArena, id: ClauseId) -> Vec<ClauseId> {
  let node = arena.get(id);
  match &node.kind {
    ClauseKind::Rule(_, Some(body)) => arena.get(*body).seeds.clone(),
    ClauseKind::Rule(_, None) => Vec::new(),
    ClauseKind::Mult(_, c) | ClauseKind::Opt(c) | ClauseKind::Look(c) | ClauseKind::NLook(c) => {
      arena.get(*c).seeds.clone()
    }
    ClauseKind::Alt(cs) => {
      let mut seeds = Vec::new();
      for &c in cs {
        for &s in &arena.get(c).seeds {
          if !seeds.contains(&s) {
            seeds.push(s);
          }
        }
      }
      seeds
    }
    ClauseKind::Seq(cs) => {
      let mut seeds = Vec::new();
      for &c in cs {
        for &s in &arena.get(c).seeds {
          if !seeds.contains(&s) {
            seeds.push(s);
          }
        }
        if !arena.get(c).matches_empty {
          break;
        }
      }
      seeds
    }
    ClauseKind::Str(_) | ClauseKind::Rgx(_) => vec![id],
  }
}

fn validate_seeds(arena: &ClauseArena, order: &[ClauseId]) -> Result<(), GrammarError> {
  for &id in order {
    if arena.get(id).seeds.is_empty() {
      return Err(GrammarError::NoSeeds(arena.get(id).kind.to_string()));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn build_left_recursive_expr() -> (ClauseArena, Vec<String>) {
    let mut arena = ClauseArena::new();
    let expr = arena.rule_ref("expr");
    let num = arena.rule_ref("num");
    let plus = arena.str("+");
    let seq = arena.seq(vec![expr, plus, num]);
    let body = arena.alt(vec![seq, num]);
    arena.define_rule("expr", body);

    let digit = arena.rgx("[0-9]").unwrap();
    arena.define_rule("num", digit);

    (arena, vec!["expr".to_string(), "num".to_string()])
  }

  #[test]
  fn test_compiles_direct_left_recursive_grammar() {
    let (arena, names) = build_left_recursive_expr();
    let grammar = Grammar::new(arena, names).unwrap();
    assert_eq!(grammar.clause_count(), 6);
  }

  #[test]
  fn test_priorities_respect_non_cycle_edges() {
    let (arena, names) = build_left_recursive_expr();
    let grammar = Grammar::new(arena, names).unwrap();
    let num = grammar.rule("num").unwrap();
    let num_body = match &grammar.arena.get(num).kind {
      ClauseKind::Rule(_, Some(b)) => *b,
      _ => panic!(),
    };
    assert!(grammar.arena.get(num_body).priority < grammar.arena.get(num).priority);
  }

  #[test]
  fn test_matches_empty_propagates_through_alt_and_seq() {
    let mut arena = ClauseArena::new();
    let a = arena.str("a");
    let empty = arena.str("");
    let alt = arena.alt(vec![a, empty]);
    arena.define_rule("start", alt);
    let grammar = Grammar::new(arena, vec!["start".to_string()]).unwrap();
    assert!(grammar.arena.get(grammar.start()).matches_empty);
  }

  #[test]
  fn test_unresolved_rule_is_an_error() {
    let mut arena = ClauseArena::new();
    let missing = arena.rule_ref("missing");
    arena.define_rule("start", missing);
    let err = Grammar::new(arena, vec!["start".to_string()]).unwrap_err();
    assert_eq!(err, GrammarError::UnresolvedRule("missing".to_string()));
  }

  #[test]
  fn test_left_recursive_empty_loop_is_rejected() {
    let mut arena = ClauseArena::new();
    let empty = arena.str("");
    let plus = arena.mult(1, empty);
    arena.define_rule("start", plus);
    let err = Grammar::new(arena, vec!["start".to_string()]).unwrap_err();
    assert!(matches!(err, GrammarError::LeftRecursiveEmptyLoop(_)));
  }

  #[test]
  fn test_empty_lookahead_is_rejected() {
    let mut arena = ClauseArena::new();
    let empty = arena.str("");
    let look = arena.look(empty);
    arena.define_rule("start", look);
    let err = Grammar::new(arena, vec!["start".to_string()]).unwrap_err();
    assert!(matches!(err, GrammarError::EmptyLookahead(_)));
  }

  #[test]
  fn test_empty_ruleset_is_rejected() {
    let arena = ClauseArena::new();
    let err = Grammar::new(arena, vec![]).unwrap_err();
    assert_eq!(err, GrammarError::EmptyRuleset);
  }
}
