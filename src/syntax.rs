//! The surface PEG syntax front-end (C8): a small recursive-descent parser
//! over `&str`, built the same way the reference grammar parser is -- tiny
//! `fn(&str) -> Result<(T, &str), SyntaxError>` combinators, lexical classes
//! matched with `lazy_static`-cached `Regex`es.
//!
//! ```text
//! name <- expr ;
//! expr := alt
//! alt  := seq ("|" seq)*
//! seq  := prefixed+
//! prefixed := ("&" | "!")? suffixed
//! suffixed := atom ("*" | "+" | "?")?
//! atom := "\"" ... "\"" | "/" ... "/" | name | "(" expr ")"
//! ```

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::clause::{ClauseArena, ClauseId};
use crate::grammar::{Grammar, GrammarError};

/// A failure while parsing the surface textual notation, distinct from
/// [`GrammarError`] (which covers only post-parse compiler failures): this
/// is the text-to-clause-tree phase, that is clause-tree-to-compiled-grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
  pub message: String,
  pub at: usize,
}

impl fmt::Display for SyntaxError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "syntax error at byte {}: {}", self.at, self.message)
  }
}

impl std::error::Error for SyntaxError {}

fn err(message: impl Into<String>, offset: usize, rest: &str, original: &str) -> SyntaxError {
  SyntaxError { message: message.into(), at: original.len() - rest.len() + offset }
}

type ParseResult<'a, T> = Result<(T, &'a str), SyntaxError>;

/// helper macro for initializing a regex with lazy_static!, per the
/// reference grammar parser's own `regex_static!` convention.
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Consumes a regex anchored at the start of `s`, returning `None` without
/// consuming anything if it doesn't match there.
fn optional_re<'a>(re: &Regex, s: &'a str) -> (Option<&'a str>, &'a str) {
  match re.find(s) {
    Some(m) if m.start() == 0 => (Some(m.as_str()), &s[m.end()..]),
    _ => (None, s),
  }
}

fn optional_char(c: char, s: &str) -> (bool, &str) {
  if s.starts_with(c) {
    (true, &s[c.len_utf8()..])
  } else {
    (false, s)
  }
}

fn needed_char<'a>(c: char, s: &'a str, original: &str) -> ParseResult<'a, ()> {
  let (found, rest) = optional_char(c, s);
  if found {
    Ok(((), rest))
  } else {
    Err(err(format!("expected '{c}'"), 0, s, original))
  }
}

fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"(\s|//[^\n]*)+");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

fn parse_name<'a>(s: &'a str, original: &str) -> ParseResult<'a, &'a str> {
  regex_static!(NAME, r"[a-zA-Z_][a-zA-Z0-9_-]*");
  match optional_re(&NAME, s) {
    (Some(name), rest) => Ok((name, rest)),
    (None, _) => Err(err("expected a rule name", 0, s, original)),
  }
}

fn parse_string_literal<'a>(s: &'a str, original: &str) -> ParseResult<'a, String> {
  regex_static!(STRING, r#""(\\.|[^"\\])*""#);
  match optional_re(&STRING, s) {
    (Some(lit), rest) => {
      let inner = &lit[1..lit.len() - 1];
      Ok((unescape(inner), rest))
    }
    (None, _) => Err(err("expected a string literal", 0, s, original)),
  }
}

fn parse_regex_literal<'a>(s: &'a str, original: &str) -> ParseResult<'a, String> {
  regex_static!(REGEX_LIT, r"/(\\.|[^/\\])*/");
  match optional_re(&REGEX_LIT, s) {
    (Some(lit), rest) => {
      let inner = &lit[1..lit.len() - 1];
      Ok((unescape(inner), rest))
    }
    (None, _) => Err(err("expected a regex literal", 0, s, original)),
  }
}

fn unescape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      if let Some(next) = chars.next() {
        out.push(next);
      }
    } else {
      out.push(c);
    }
  }
  out
}

/// `atom := "\"" ... "\"" | "/" ... "/" | name | "(" expr ")"`
fn parse_atom<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  let s = skip_whitespace(s);
  if s.starts_with('"') {
    let (lit, rest) = parse_string_literal(s, original)?;
    return Ok((arena.str(lit), rest));
  }
  if s.starts_with('/') {
    let (pattern, rest) = parse_regex_literal(s, original)?;
    let clause = arena
      .rgx(pattern)
      .map_err(|e| err(format!("invalid regex: {e}"), 0, s, original))?;
    return Ok((clause, rest));
  }
  if let (true, rest) = optional_char('(', s) {
    let rest = skip_whitespace(rest);
    let (inner, rest) = parse_expr(arena, rest, original)?;
    let rest = skip_whitespace(rest);
    let (_, rest) = needed_char(')', rest, original)?;
    return Ok((inner, rest));
  }
  let (name, rest) = parse_name(s, original)?;
  Ok((arena.rule_ref(name), rest))
}

/// `suffixed := atom ("*" | "+" | "?")?`
fn parse_suffixed<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  let (atom, rest) = parse_atom(arena, s, original)?;
  match rest.chars().next() {
    Some('*') => Ok((arena.mult(0, atom), &rest[1..])),
    Some('+') => Ok((arena.mult(1, atom), &rest[1..])),
    Some('?') => Ok((arena.opt(atom), &rest[1..])),
    _ => Ok((atom, rest)),
  }
}

/// `prefixed := ("&" | "!")? suffixed`
fn parse_prefixed<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  match s.chars().next() {
    Some('&') => {
      let (child, rest) = parse_suffixed(arena, &s[1..], original)?;
      Ok((arena.look(child), rest))
    }
    Some('!') => {
      let (child, rest) = parse_suffixed(arena, &s[1..], original)?;
      Ok((arena.nlook(child), rest))
    }
    _ => parse_suffixed(arena, s, original),
  }
}

/// `seq := prefixed+`
fn parse_seq<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  let mut children = Vec::new();
  let (first, mut rest) = parse_prefixed(arena, s, original)?;
  children.push(first);
  loop {
    let after_ws = skip_whitespace(rest);
    if after_ws.is_empty() || after_ws.starts_with('|') || after_ws.starts_with(')') || after_ws.starts_with(';') {
      break;
    }
    match parse_prefixed(arena, after_ws, original) {
      Ok((child, next_rest)) => {
        children.push(child);
        rest = next_rest;
      }
      Err(_) => break,
    }
  }
  Ok((arena.seq(children), rest))
}

/// `alt := seq ("|" seq)*`
fn parse_alt<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  let mut children = Vec::new();
  let (first, mut rest) = parse_seq(arena, s, original)?;
  children.push(first);
  loop {
    let after_ws = skip_whitespace(rest);
    if let (true, after_pipe) = optional_char('|', after_ws) {
      let after_pipe = skip_whitespace(after_pipe);
      let (child, next_rest) = parse_seq(arena, after_pipe, original)?;
      children.push(child);
      rest = next_rest;
    } else {
      rest = after_ws;
      break;
    }
  }
  Ok((arena.alt(children), rest))
}

fn parse_expr<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, ClauseId> {
  parse_alt(arena, s, original)
}

/// `name <- expr ;`
fn parse_rule<'a>(arena: &mut ClauseArena, s: &'a str, original: &str) -> ParseResult<'a, String> {
  let s = skip_whitespace(s);
  let (name, rest) = parse_name(s, original)?;
  let rest = skip_whitespace(rest);
  regex_static!(ARROW, "<-");
  let (_, rest) = match optional_re(&ARROW, rest) {
    (Some(_), rest) => ((), rest),
    (None, _) => return Err(err("expected '<-'", 0, rest, original)),
  };
  let rest = skip_whitespace(rest);
  let (body, rest) = parse_expr(arena, rest, original)?;
  let rest = skip_whitespace(rest);
  let (_, rest) = needed_char(';', rest, original)?;
  arena.define_rule(name, body);
  Ok((name.to_string(), rest))
}

fn parse_rules(s: &str) -> Result<(ClauseArena, Vec<String>), SyntaxError> {
  let mut arena = ClauseArena::new();
  let mut names = Vec::new();
  let mut rest = s;
  loop {
    rest = skip_whitespace(rest);
    if rest.is_empty() {
      break;
    }
    let (name, next_rest) = parse_rule(&mut arena, rest, s)?;
    names.push(name);
    rest = next_rest;
  }
  Ok((arena, names))
}

/// Failure building a [`Grammar`] from surface syntax: either the text
/// didn't parse, or it parsed but failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarParseError {
  Syntax(SyntaxError),
  Compile(GrammarError),
}

impl fmt::Display for GrammarParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GrammarParseError::Syntax(e) => write!(f, "{e}"),
      GrammarParseError::Compile(e) => write!(f, "{e}"),
    }
  }
}

impl std::error::Error for GrammarParseError {}

impl From<SyntaxError> for GrammarParseError {
  fn from(e: SyntaxError) -> Self {
    GrammarParseError::Syntax(e)
  }
}

impl From<GrammarError> for GrammarParseError {
  fn from(e: GrammarError) -> Self {
    GrammarParseError::Compile(e)
  }
}

impl FromStr for Grammar {
  type Err = GrammarParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arena, names) = parse_rules(s)?;
    if names.is_empty() {
      return Err(GrammarParseError::Compile(GrammarError::EmptyRuleset));
    }
    Ok(Grammar::new(arena, names)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parses_direct_left_recursive_grammar() {
    let grammar: Grammar = "expr <- expr \"+\" num | num ;\nnum <- /[0-9]+/ ;\n".parse().unwrap();
    assert!(grammar.rule("expr").is_some());
    assert!(grammar.rule("num").is_some());
  }

  #[test]
  fn test_suffix_binds_tighter_than_prefix() {
    // !"a"+ should parse as !("a"+), not (!"a")+ -- "a"* would make the
    // lookahead's child empty-matching, which is itself a compile error
    // (EmptyLookahead) and unrelated to the precedence this test checks.
    let grammar: Grammar = "start <- !\"a\"+ \"b\" ;\n".parse().unwrap();
    assert!(grammar.rule("start").is_some());
  }

  #[test]
  fn test_sequence_binds_tighter_than_alternation() {
    let grammar: Grammar = "start <- \"a\" \"b\" | \"c\" ;\n".parse().unwrap();
    assert!(grammar.rule("start").is_some());
  }

  #[test]
  fn test_one_item_sequences_are_not_wrapped() {
    let mut arena = ClauseArena::new();
    let a = arena.str("a");
    let wrapped = arena.seq(vec![a]);
    assert_eq!(wrapped, a);
  }

  #[test]
  fn test_unresolved_rule_reference_fails_to_compile() {
    let err = "start <- missing ;\n".parse::<Grammar>().unwrap_err();
    assert!(matches!(err, GrammarParseError::Compile(GrammarError::UnresolvedRule(_))));
  }

  #[test]
  fn test_unterminated_rule_is_a_syntax_error() {
    let err = "start <- \"a\"\n".parse::<Grammar>().unwrap_err();
    assert!(matches!(err, GrammarParseError::Syntax(_)));
  }
}
