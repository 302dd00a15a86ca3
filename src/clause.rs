//! The clause model (C1): arena-indexed nodes of the grammar graph.
//!
//! Clauses are built through [`ClauseArena`], which hash-conses structurally
//! identical sub-expressions onto the same [`ClauseId`] so that `saplings`
//! and `seeds` propagation (computed later, by the grammar compiler) only
//! ever has to walk one copy of a shared sub-expression.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

/// Index into a [`ClauseArena`]. Stable for the lifetime of the arena/grammar
/// that produced it; arenas are never merged, so ids are not portable across
/// arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClauseId(pub(crate) usize);

impl fmt::Display for ClauseId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The shape of a clause, independent of its derived attributes.
///
/// `Rule`'s body starts as `None` (a placeholder created by `rule_ref`) and
/// is filled in once by `define_rule`; [`super::grammar::Grammar::new`]
/// rejects any grammar where a placeholder survives compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseKind {
  Rule(String, Option<ClauseId>),
  Seq(Vec<ClauseId>),
  Alt(Vec<ClauseId>),
  Mult(usize, ClauseId),
  Opt(ClauseId),
  Look(ClauseId),
  NLook(ClauseId),
  Str(String),
  Rgx(String),
}

impl ClauseKind {
  /// Children in declaration order, matching the iteration order used for
  /// `saplings`/`seeds` propagation and for matching itself.
  pub fn children(&self) -> Vec<ClauseId> {
    match self {
      ClauseKind::Rule(_, Some(body)) => vec![*body],
      ClauseKind::Rule(_, None) => vec![],
      ClauseKind::Seq(cs) | ClauseKind::Alt(cs) => cs.clone(),
      ClauseKind::Mult(_, c) | ClauseKind::Opt(c) | ClauseKind::Look(c) | ClauseKind::NLook(c) => {
        vec![*c]
      }
      ClauseKind::Str(_) | ClauseKind::Rgx(_) => vec![],
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, ClauseKind::Str(_) | ClauseKind::Rgx(_))
  }

  /// A canonical textual key used for hash-consing: two clauses with the
  /// same key are structurally identical (children already being ids makes
  /// this cheap -- no recursive descent needed).
  fn dedup_key(&self) -> String {
    match self {
      ClauseKind::Rule(name, _) => format!("Rule({name})"),
      ClauseKind::Seq(cs) => format!("Seq{cs:?}"),
      ClauseKind::Alt(cs) => format!("Alt{cs:?}"),
      ClauseKind::Mult(min, c) => format!("Mult({min},{c})"),
      ClauseKind::Opt(c) => format!("Opt({c})"),
      ClauseKind::Look(c) => format!("Look({c})"),
      ClauseKind::NLook(c) => format!("NLook({c})"),
      ClauseKind::Str(s) => format!("Str({s:?})"),
      ClauseKind::Rgx(p) => format!("Rgx({p:?})"),
    }
  }
}

impl fmt::Display for ClauseKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClauseKind::Rule(name, _) => write!(f, "{name}"),
      ClauseKind::Seq(cs) => {
        write!(f, "(")?;
        for (i, c) in cs.iter().enumerate() {
          if i > 0 {
            write!(f, " ")?;
          }
          write!(f, "{c}")?;
        }
        write!(f, ")")
      }
      ClauseKind::Alt(cs) => {
        for (i, c) in cs.iter().enumerate() {
          if i > 0 {
            write!(f, " | ")?;
          }
          write!(f, "{c}")?;
        }
        Ok(())
      }
      ClauseKind::Mult(min, c) => write!(f, "{c}{}", if *min == 0 { "*" } else { "+" }),
      ClauseKind::Opt(c) => write!(f, "{c}?"),
      ClauseKind::Look(c) => write!(f, "&{c}"),
      ClauseKind::NLook(c) => write!(f, "!{c}"),
      ClauseKind::Str(s) => write!(f, "{s:?}"),
      ClauseKind::Rgx(p) => write!(f, "/{p}/"),
    }
  }
}

/// A clause plus the attributes the grammar compiler (C3) derives for it.
/// Populated with defaults at construction time; only `Grammar::new` fills
/// in real values, at which point the node is considered final.
#[derive(Debug, Clone)]
pub struct ClauseNode {
  pub kind: ClauseKind,
  pub priority: usize,
  pub matches_empty: bool,
  pub seeds: Vec<ClauseId>,
  pub saplings: Vec<ClauseId>,
}

impl ClauseNode {
  fn new(kind: ClauseKind) -> Self {
    Self {
      kind,
      priority: 0,
      matches_empty: false,
      seeds: Vec::new(),
      saplings: Vec::new(),
    }
  }
}

/// Builder and storage for a grammar's clause graph. Performs hash-consing:
/// calling e.g. `seq(&[a, b])` twice with the same children returns the same
/// [`ClauseId`] both times.
#[derive(Debug, Default)]
pub struct ClauseArena {
  nodes: Vec<ClauseNode>,
  dedup: HashMap<String, ClauseId>,
  regexes: Vec<Option<Regex>>,
}

impl ClauseArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn get(&self, id: ClauseId) -> &ClauseNode {
    &self.nodes[id.0]
  }

  pub(crate) fn get_mut(&mut self, id: ClauseId) -> &mut ClauseNode {
    &mut self.nodes[id.0]
  }

  pub fn ids(&self) -> impl Iterator<Item = ClauseId> {
    (0..self.nodes.len()).map(ClauseId)
  }

  pub fn regex(&self, id: ClauseId) -> Option<&Regex> {
    self.regexes.get(id.0).and_then(|r| r.as_ref())
  }

  fn intern(&mut self, kind: ClauseKind) -> ClauseId {
    let key = kind.dedup_key();
    if let Some(&id) = self.dedup.get(&key) {
      return id;
    }
    let id = ClauseId(self.nodes.len());
    self.nodes.push(ClauseNode::new(kind));
    self.regexes.push(None);
    self.dedup.insert(key, id);
    id
  }

  pub fn str(&mut self, s: impl Into<String>) -> ClauseId {
    self.intern(ClauseKind::Str(s.into()))
  }

  pub fn rgx(&mut self, pattern: impl Into<String>) -> Result<ClauseId, regex::Error> {
    let pattern = pattern.into();
    let compiled = Regex::new(&pattern)?;
    let id = self.intern(ClauseKind::Rgx(pattern));
    self.regexes[id.0] = Some(compiled);
    Ok(id)
  }

  pub fn seq(&mut self, children: Vec<ClauseId>) -> ClauseId {
    if children.len() == 1 {
      return children[0];
    }
    self.intern(ClauseKind::Seq(children))
  }

  pub fn alt(&mut self, children: Vec<ClauseId>) -> ClauseId {
    if children.len() == 1 {
      return children[0];
    }
    self.intern(ClauseKind::Alt(children))
  }

  pub fn mult(&mut self, min: usize, child: ClauseId) -> ClauseId {
    self.intern(ClauseKind::Mult(min, child))
  }

  pub fn opt(&mut self, child: ClauseId) -> ClauseId {
    self.intern(ClauseKind::Opt(child))
  }

  pub fn look(&mut self, child: ClauseId) -> ClauseId {
    self.intern(ClauseKind::Look(child))
  }

  pub fn nlook(&mut self, child: ClauseId) -> ClauseId {
    self.intern(ClauseKind::NLook(child))
  }

  /// Gets or creates the canonical `Rule` clause for `name`. The returned
  /// clause's body is `None` until [`ClauseArena::define_rule`] is called
  /// for the same name.
  pub fn rule_ref(&mut self, name: impl Into<String>) -> ClauseId {
    let name = name.into();
    let key = format!("Rule({name})");
    if let Some(&id) = self.dedup.get(&key) {
      return id;
    }
    let id = ClauseId(self.nodes.len());
    self.nodes.push(ClauseNode::new(ClauseKind::Rule(name, None)));
    self.regexes.push(None);
    self.dedup.insert(key, id);
    id
  }

  /// Sets the body of the named rule, creating its placeholder first if
  /// this is the first mention of `name`.
  pub fn define_rule(&mut self, name: impl Into<String>, body: ClauseId) -> ClauseId {
    let id = self.rule_ref(name);
    match &mut self.get_mut(id).kind {
      ClauseKind::Rule(_, slot) => *slot = Some(body),
      _ => unreachable!("rule_ref always returns a Rule clause"),
    }
    id
  }
}

impl fmt::Display for ClauseArena {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, node) in self.nodes.iter().enumerate() {
      writeln!(f, "{:>4}  {}", i, node.kind)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_consing_shares_identical_subexpressions() {
    let mut arena = ClauseArena::new();
    let a1 = arena.str("a");
    let a2 = arena.str("a");
    assert_eq!(a1, a2);
    assert_eq!(arena.len(), 1);

    let seq1 = arena.seq(vec![a1, a1]);
    let seq2 = arena.seq(vec![a1, a1]);
    assert_eq!(seq1, seq2);
  }

  #[test]
  fn test_distinct_literals_get_distinct_ids() {
    let mut arena = ClauseArena::new();
    let a = arena.str("a");
    let b = arena.str("b");
    assert_ne!(a, b);
  }

  #[test]
  fn test_single_child_seq_and_alt_collapse() {
    let mut arena = ClauseArena::new();
    let a = arena.str("a");
    assert_eq!(arena.seq(vec![a]), a);
    assert_eq!(arena.alt(vec![a]), a);
  }

  #[test]
  fn test_rule_ref_is_a_placeholder_until_defined() {
    let mut arena = ClauseArena::new();
    let r = arena.rule_ref("expr");
    match &arena.get(r).kind {
      ClauseKind::Rule(name, body) => {
        assert_eq!(name, "expr");
        assert!(body.is_none());
      }
      _ => panic!("expected Rule"),
    }

    let body = arena.str("x");
    arena.define_rule("expr", body);
    match &arena.get(r).kind {
      ClauseKind::Rule(_, Some(b)) => assert_eq!(*b, body),
      _ => panic!("expected resolved Rule"),
    }
  }

  #[test]
  fn test_rule_equality_is_by_name_only() {
    let mut arena = ClauseArena::new();
    let r1 = arena.rule_ref("expr");
    let r2 = arena.rule_ref("expr");
    assert_eq!(r1, r2);
  }
}
