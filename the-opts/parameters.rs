//! Classifying tokens into positional values, flags and named values.
//!
//! A [`Parameters`] is produced by reading tokens from a [`Tokenizer`] and
//! pushing them into a [`ParametersBuilder`]. Which markers exist and how
//! many values they take is answered by a [`Declare`] implementation,
//! normally an [`crate::Expect`].
//!
//! ```
//! use the_opts::{Expect, Parameters};
//!
//! let expect: Expect = Expect::builder()
//!   .named("name")
//!   .any(["name1", "name2"])
//!   .flag("flag", ["f"])
//!   .build()
//!   .unwrap();
//!
//! let args = Parameters::parse("Server --name name1 -f", &expect).unwrap();
//! assert_eq!(&args[0], "Server");
//! assert_eq!(args.get("name").raw(), Some("name1"));
//! assert!(args.has("flag"));
//! ```

use std::{
  collections::{
    BTreeMap,
    BTreeSet,
    HashMap,
    HashSet,
  },
  fmt,
  ops,
  slice,
};

use serde::{
  Serialize,
  Serializer,
  ser::SerializeStruct,
};
use thiserror::Error;

use crate::{
  parameter::Parameter,
  tokenizer::{
    Token,
    TokenKind,
    Tokenizer,
  },
};

pub const LONG_PREFIX: &str = "--";
pub const SHORT_PREFIX: &str = "-";

/// Renders the marker for a parameter name: `-x` for single characters,
/// `--name` otherwise.
pub fn marker(name: &str) -> String {
  if name.chars().count() == 1 {
    format!("{SHORT_PREFIX}{name}")
  } else {
    format!("{LONG_PREFIX}{name}")
  }
}

/// Whether `text` is a cluster of short markers such as `-f` or `-nfoo`.
///
/// A lone `-` and negative numbers like `-5` or `-.5` are values.
pub fn is_short_marker(text: &str) -> bool {
  let Some(rest) = text.strip_prefix(SHORT_PREFIX) else {
    return false;
  };
  if rest.is_empty() || rest.starts_with(SHORT_PREFIX) {
    return false;
  }
  !(rest.starts_with(|ch: char| ch.is_ascii_digit() || ch == '.') && text.parse::<f64>().is_ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("unknown parameter '{token}'")]
  UnknownParameter { token: String },
  #[error("too many arguments for '{}'", marker(name))]
  TooManyArguments { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
  /// Presence only. The marker never consumes a value.
  Flag,
  /// The marker consumes the following value. `max` bounds how many values
  /// all occurrences together may supply.
  Values { max: Option<usize> },
}

/// What a [`Declare`] knows about one marker name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declared<'d> {
  /// The root name values are stored under. Aliases resolve to it.
  pub name:  &'d str,
  pub arity: Arity,
}

/// Answers which markers exist while tokens are being classified.
pub trait Declare {
  /// Looks up a name or alias without its marker prefix.
  fn declared(&self, name: &str) -> Option<Declared<'_>>;

  /// Number of positional values after which interpretation stops.
  fn stop_after(&self) -> Option<usize> {
    None
  }
}

impl<F> Declare for F
where
  F: Fn(&str) -> Option<Declared<'static>>,
{
  fn declared(&self, name: &str) -> Option<Declared<'_>> {
    self(name)
  }
}

/// Selects a parameter: an index into the positional values or a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'k> {
  Index(usize),
  Name(&'k str),
}

impl From<usize> for Key<'_> {
  fn from(index: usize) -> Self {
    Key::Index(index)
  }
}

impl<'k> From<&'k str> for Key<'k> {
  fn from(name: &'k str) -> Self {
    Key::Name(name)
  }
}

/// The parsed form of a command line.
///
/// Positional values are accessible like a slice: `len`, `iter`, `args[0]`
/// and `for arg in &args` only see positionals. Named values and flags are
/// reached through [`Parameters::get`] and [`Parameters::has`] using either
/// the declared name or any alias.
pub struct Parameters<'a> {
  declare:     &'a dyn Declare,
  positionals: Vec<&'a str>,
  named:       HashMap<&'a str, Vec<&'a str>>,
  flags:       HashSet<&'a str>,
  last:        &'a str,
}

impl<'a> Parameters<'a> {
  fn new(declare: &'a dyn Declare) -> Self {
    Self {
      declare,
      positionals: Vec::new(),
      named: HashMap::new(),
      flags: HashSet::new(),
      last: "",
    }
  }

  /// Parses `line`, rejecting unknown markers and surplus values.
  ///
  /// Missing values and unterminated quotes are accepted; callers ask for
  /// what they need through [`Parameter::require`].
  pub fn parse<D: Declare>(line: &'a str, declare: &'a D) -> Result<Self, ParseError> {
    let mut tokenizer = Tokenizer::new(line);
    let mut builder = ParametersBuilder::new(declare, true);
    while let Some(token) = builder.read_token(&mut tokenizer) {
      builder.push(token)?;
    }
    Ok(builder.finish())
  }

  /// Parses `line` without validation. Unknown markers are recorded as flags
  /// and surplus values are kept.
  pub fn parse_lenient<D: Declare>(line: &'a str, declare: &'a D) -> Self {
    let mut tokenizer = Tokenizer::new(line);
    let mut builder = ParametersBuilder::new(declare, false);
    while let Some(token) = builder.read_token(&mut tokenizer) {
      builder.push_lenient(token);
    }
    builder.finish()
  }

  /// Returns the number of positionals.
  pub fn len(&self) -> usize {
    self.positionals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positionals.is_empty()
  }

  pub fn first(&self) -> Option<&'a str> {
    self.positionals.first().copied()
  }

  pub fn iter(&self) -> slice::Iter<'_, &'a str> {
    self.positionals.iter()
  }

  pub fn positionals(&self) -> &[&'a str] {
    &self.positionals
  }

  /// The content of the last token read, empty if there was none.
  pub fn last(&self) -> &'a str {
    self.last
  }

  /// Resolves an alias to its declared name. Unknown names map to themselves.
  pub fn root<'n>(&'n self, name: &'n str) -> &'n str {
    self.declare.declared(name).map_or(name, |declared| declared.name)
  }

  /// Values supplied to a named parameter across all its occurrences.
  pub fn values(&self, name: &str) -> &[&'a str] {
    self
      .named
      .get(self.root(name))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Flags present on the line, including unknown markers seen by a lenient
  /// parse.
  pub fn flags(&self) -> impl Iterator<Item = &'a str> + '_ {
    self.flags.iter().copied()
  }

  /// Whether a positional index exists or a name appeared on the line.
  pub fn has<'k>(&self, key: impl Into<Key<'k>>) -> bool {
    match key.into() {
      Key::Index(index) => index < self.positionals.len(),
      Key::Name(name) => {
        let root = self.root(name);
        self.named.contains_key(root) || self.flags.contains(root)
      },
    }
  }

  pub fn get<'p>(&'p self, key: impl Into<Key<'p>>) -> Parameter<'p> {
    match key.into() {
      Key::Index(index) => Parameter::positional(&self.positionals, index),
      Key::Name(name) => {
        let root = self.root(name);
        Parameter::named(root, self.values(root), self.has(root))
      },
    }
  }
}

impl fmt::Debug for Parameters<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Parameters")
      .field("positionals", &self.positionals)
      .field("named", &self.named)
      .field("flags", &self.flags)
      .finish_non_exhaustive()
  }
}

impl Serialize for Parameters<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let named: BTreeMap<_, _> = self.named.iter().collect();
    let flags: BTreeSet<_> = self.flags.iter().collect();

    let mut state = serializer.serialize_struct("Parameters", 3)?;
    state.serialize_field("positional", &self.positionals)?;
    state.serialize_field("named", &named)?;
    state.serialize_field("flags", &flags)?;
    state.end()
  }
}

impl ops::Index<usize> for Parameters<'_> {
  type Output = str;

  fn index(&self, index: usize) -> &Self::Output {
    self.positionals[index]
  }
}

impl<'i, 'a> IntoIterator for &'i Parameters<'a> {
  type Item = &'i &'a str;
  type IntoIter = slice::Iter<'i, &'a str>;

  fn into_iter(self) -> Self::IntoIter {
    self.positionals.iter()
  }
}

/// Incremental construction of [`Parameters`], one token at a time.
///
/// Completion drives the builder directly so it can inspect the state just
/// before the token under the cursor.
pub struct ParametersBuilder<'a> {
  params:   Parameters<'a>,
  /// Whether to return errors for unknown markers and surplus values.
  validate: bool,
  /// Root name of a value parameter whose marker was just read.
  awaiting: Option<&'a str>,
}

impl<'a> ParametersBuilder<'a> {
  pub fn new(declare: &'a dyn Declare, validate: bool) -> Self {
    Self {
      params: Parameters::new(declare),
      validate,
      awaiting: None,
    }
  }

  /// Whether markers and quotes are still being interpreted.
  pub fn is_interpreting(&self) -> bool {
    self
      .params
      .declare
      .stop_after()
      .is_none_or(|count| self.params.positionals.len() < count)
  }

  /// The value parameter waiting for its next value and how many values it
  /// holds so far.
  pub fn awaiting(&self) -> Option<(&'a str, usize)> {
    self
      .awaiting
      .map(|name| (name, self.params.named.get(name).map_or(0, Vec::len)))
  }

  pub fn positional_count(&self) -> usize {
    self.params.positionals.len()
  }

  pub fn parameters(&self) -> &Parameters<'a> {
    &self.params
  }

  /// Reads the next token, switching the tokenizer to raw mode once the
  /// declared number of interpreted positionals has been read.
  pub fn read_token(&self, tokenizer: &mut Tokenizer<'a>) -> Option<Token<'a>> {
    if !self.is_interpreting() {
      tokenizer.stop_interpreting();
    }
    tokenizer.next()
  }

  pub fn push(&mut self, token: Token<'a>) -> Result<(), ParseError> {
    let text = token.content;
    self.params.last = text;

    if self.is_interpreting() && token.kind == TokenKind::Unquoted {
      if let Some(name) = text.strip_prefix(LONG_PREFIX) {
        tracing::trace!(token = text, "long marker");
        self.awaiting = None;
        return self.push_marker(name, text);
      }
      if is_short_marker(text) {
        tracing::trace!(token = text, "short markers");
        self.awaiting = None;
        return self.push_cluster(&text[SHORT_PREFIX.len()..], text);
      }
    }

    match self.awaiting.take() {
      Some(name) => self.params.named.entry(name).or_default().push(text),
      None => self.params.positionals.push(text),
    }
    Ok(())
  }

  /// Pushes `token` without validating it, even on a validating builder.
  /// Unknown markers become flags and surplus values are kept.
  pub fn push_lenient(&mut self, token: Token<'a>) {
    let validate = std::mem::replace(&mut self.validate, false);
    let pushed = self.push(token);
    self.validate = validate;
    debug_assert!(pushed.is_ok(), "unvalidated push failed: {pushed:?}");
  }

  pub fn finish(self) -> Parameters<'a> {
    self.params
  }

  fn push_marker(&mut self, name: &'a str, token: &'a str) -> Result<(), ParseError> {
    let declare = self.params.declare;
    match declare.declared(name) {
      Some(declared) => self.mark(declared),
      None if self.validate => {
        Err(ParseError::UnknownParameter {
          token: token.to_string(),
        })
      },
      None => {
        self.params.flags.insert(name);
        Ok(())
      },
    }
  }

  /// Handles `-abc`. Each character is a short marker; the first one taking
  /// a value consumes the remainder of the cluster as that value.
  fn push_cluster(&mut self, cluster: &'a str, token: &'a str) -> Result<(), ParseError> {
    let declare = self.params.declare;
    for (idx, ch) in cluster.char_indices() {
      let end = idx + ch.len_utf8();
      let alias = &cluster[idx..end];

      let Some(declared) = declare.declared(alias) else {
        if self.validate {
          return Err(ParseError::UnknownParameter {
            token: token.to_string(),
          });
        }
        self.params.flags.insert(alias);
        continue;
      };
      self.mark(declared)?;

      let rest = &cluster[end..];
      if rest.is_empty() {
        break;
      }
      if let Some(name) = self.awaiting.take() {
        self.params.named.entry(name).or_default().push(rest);
        break;
      }
    }
    Ok(())
  }

  fn mark(&mut self, declared: Declared<'a>) -> Result<(), ParseError> {
    match declared.arity {
      Arity::Flag => {
        self.params.flags.insert(declared.name);
      },
      Arity::Values { max } => {
        let values = self.params.named.entry(declared.name).or_default();
        if self.validate && max.is_some_and(|max| values.len() >= max) {
          return Err(ParseError::TooManyArguments {
            name: declared.name.to_string(),
          });
        }
        self.awaiting = Some(declared.name);
      },
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn declare(name: &str) -> Option<Declared<'static>> {
    match name {
      "name" | "n" => {
        Some(Declared {
          name:  "name",
          arity: Arity::Values { max: Some(1) },
        })
      },
      "rep" => {
        Some(Declared {
          name:  "rep",
          arity: Arity::Values { max: None },
        })
      },
      "flag" | "f" => {
        Some(Declared {
          name:  "flag",
          arity: Arity::Flag,
        })
      },
      _ => None,
    }
  }

  struct StopAfterOne;

  impl Declare for StopAfterOne {
    fn declared(&self, name: &str) -> Option<Declared<'_>> {
      declare(name)
    }

    fn stop_after(&self) -> Option<usize> {
      Some(1)
    }
  }

  #[test]
  fn positionals() {
    let args = Parameters::parse("foo bar baz", &declare).unwrap();
    assert_eq!(args.len(), 3);
    assert_eq!(&args[0], "foo");
    assert_eq!(args.iter().copied().collect::<Vec<_>>(), ["foo", "bar", "baz"]);
    assert_eq!(args.last(), "baz");
    assert!(args.has(2));
    assert!(!args.has(3));
  }

  #[test]
  fn named_values() {
    let args = Parameters::parse("a --name x b --rep 1 --rep 2", &declare).unwrap();
    assert_eq!(args.positionals(), ["a", "b"]);
    assert_eq!(args.values("name"), ["x"]);
    assert_eq!(args.values("n"), ["x"]);
    assert_eq!(args.values("rep"), ["1", "2"]);
    assert!(args.has("rep"));
    assert!(!args.has("flag"));
  }

  #[test]
  fn flags_and_aliases() {
    for line in ["--flag", "-f", "--f", "Test --flag", "--flag Test"] {
      let args = Parameters::parse(line, &declare).unwrap();
      assert!(args.has("flag"), "{line}");
      assert!(args.has("f"), "{line}");
    }
    let args = Parameters::parse("--flag Test", &declare).unwrap();
    assert_eq!(args.positionals(), ["Test"]);
  }

  #[test]
  fn short_clusters() {
    let args = Parameters::parse("-nfoo", &declare).unwrap();
    assert_eq!(args.values("name"), ["foo"]);

    let args = Parameters::parse("-fnbar", &declare).unwrap();
    assert!(args.has("flag"));
    assert_eq!(args.values("name"), ["bar"]);

    let args = Parameters::parse("-n value", &declare).unwrap();
    assert_eq!(args.values("name"), ["value"]);
  }

  #[test]
  fn numbers_are_values() {
    let args = Parameters::parse("-5 -.5 -1e3 - --name -3", &declare).unwrap();
    assert_eq!(args.positionals(), ["-5", "-.5", "-1e3", "-"]);
    assert_eq!(args.values("name"), ["-3"]);
    assert!(is_short_marker("-inf"));
    assert!(!is_short_marker("--"));
  }

  #[test]
  fn quoted_markers_are_values() {
    let args = Parameters::parse(r#""--name" "-f""#, &declare).unwrap();
    assert_eq!(args.positionals(), ["--name", "-f"]);
    assert!(!args.has("flag"));
  }

  #[test]
  fn validation() {
    assert_eq!(
      Parameters::parse("--asjdkla", &declare).unwrap_err(),
      ParseError::UnknownParameter {
        token: "--asjdkla".to_string(),
      }
    );
    assert_eq!(
      Parameters::parse("-fs", &declare).unwrap_err(),
      ParseError::UnknownParameter {
        token: "-fs".to_string(),
      }
    );
    assert_eq!(
      Parameters::parse("--name a --name b", &declare).unwrap_err(),
      ParseError::TooManyArguments {
        name: "name".to_string(),
      }
    );
    assert!(Parameters::parse("--rep a --rep b --rep c", &declare).is_ok());
    // Missing values are not an error.
    assert!(Parameters::parse("--name", &declare).is_ok());
    assert!(Parameters::parse(r#""unterminated"#, &declare).is_ok());
  }

  #[test]
  fn error_messages() {
    let err = Parameters::parse("--name a --name b", &declare).unwrap_err();
    assert_eq!(err.to_string(), "too many arguments for '--name'");
    let err = Parameters::parse("--nope", &declare).unwrap_err();
    assert_eq!(err.to_string(), "unknown parameter '--nope'");
  }

  #[test]
  fn lenient() {
    let args = Parameters::parse_lenient("--nope x --name a --name b", &declare);
    assert!(args.has("nope"));
    assert_eq!(args.positionals(), ["x"]);
    assert_eq!(args.values("name"), ["a", "b"]);
  }

  #[test]
  fn stop_interpreting() {
    let args = Parameters::parse(r#"first "--flag" -f "quoted""#, &StopAfterOne).unwrap();
    assert_eq!(args.positionals(), ["first", r#""--flag""#, "-f", r#""quoted""#]);
    assert!(!args.has("flag"));

    // Markers before the limit are still interpreted.
    let args = Parameters::parse("-f first --name", &StopAfterOne).unwrap();
    assert!(args.has("flag"));
    assert_eq!(args.positionals(), ["first", "--name"]);
  }

  #[test]
  fn builder_state() {
    let mut tokenizer = Tokenizer::new("--rep a --rep");
    let mut builder = ParametersBuilder::new(&declare, true);
    while let Some(token) = builder.read_token(&mut tokenizer) {
      builder.push(token).unwrap();
    }
    assert_eq!(builder.awaiting(), Some(("rep", 1)));
    assert_eq!(builder.positional_count(), 0);
    assert!(builder.is_interpreting());
  }

  #[test]
  fn lenient_pushes_on_a_validating_builder() {
    let mut tokenizer = Tokenizer::new("--nope --name a --name b --name");
    let mut builder = ParametersBuilder::new(&declare, true);
    for _ in 0..5 {
      let token = builder.read_token(&mut tokenizer).unwrap();
      builder.push_lenient(token);
    }
    assert_eq!(builder.parameters().values("name"), ["a", "b"]);
    assert!(builder.parameters().has("nope"));
    assert_eq!(builder.awaiting(), None);

    // Ordinary pushes are still validated.
    let token = builder.read_token(&mut tokenizer).unwrap();
    assert_eq!(
      builder.push(token),
      Err(ParseError::TooManyArguments {
        name: "name".to_string(),
      })
    );
  }

  #[test]
  fn serialize() {
    let args = Parameters::parse("a --rep 1 -f", &declare).unwrap();
    let json = serde_json::to_value(&args).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "positional": ["a"],
        "named": { "rep": ["1"] },
        "flags": ["flag"],
      })
    );
  }
}
