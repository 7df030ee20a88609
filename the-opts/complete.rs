//! Completion of partially typed lines.
//!
//! The line is read with a lenient [`ParametersBuilder`] up to the token
//! under the cursor, which is the last token when it touches the end of the
//! line and an empty token otherwise. The builder state at that point decides
//! what is being completed:
//!
//! - a token that reads as a marker (not a negative number) completes
//!   markers that may still be given, plus the current positional slot,
//! - after a value parameter's marker, that parameter's slot for the
//!   occurrence being typed,
//! - otherwise the next positional slot, or markers once positionals run out.
//!
//! Every result replaces the text after the last whitespace of the line, so
//! a caller can always splice it in the same way. Results are neither
//! deduplicated nor sorted.

use crate::{
  expect::{
    Expect,
    NamedParameter,
    Provider,
    ProviderError,
    Slot,
  },
  parameters::{
    LONG_PREFIX,
    Parameters,
    ParametersBuilder,
    SHORT_PREFIX,
    is_short_marker,
    marker,
  },
  tokenizer::{
    Token,
    TokenKind,
    Tokenizer,
    escape,
  },
};

impl<C> Expect<C> {
  /// Completes the last word of `line`.
  ///
  /// Failing providers are logged and contribute no candidates.
  pub fn complete(&self, cx: &C, line: &str) -> Vec<String> {
    match complete_line(self, cx, line, false) {
      Ok(candidates) => candidates,
      Err(err) => {
        tracing::warn!(%err, line, "completion failed");
        Vec::new()
      },
    }
  }

  /// Like [`Expect::complete`] but stops at the first failing provider.
  pub fn try_complete(&self, cx: &C, line: &str) -> Result<Vec<String>, ProviderError> {
    complete_line(self, cx, line, true)
  }
}

enum Candidate {
  /// A logical value, still to be rendered for the current token.
  Value(String),
  /// Text that already replaces the last word.
  Replacement(String),
}

fn complete_line<C>(
  expect: &Expect<C>,
  cx: &C,
  line: &str,
  strict: bool,
) -> Result<Vec<String>, ProviderError> {
  let mut builder = ParametersBuilder::new(expect, false);
  let mut tokenizer = Tokenizer::new(line);
  let mut current = None;

  while let Some(token) = builder.read_token(&mut tokenizer) {
    if token.end() == line.len() {
      current = Some(token);
      break;
    }
    builder.push_lenient(token);
  }

  let current = current.unwrap_or_else(|| Token::empty_at(line.len()));
  tracing::trace!(token = current.raw, kind = ?current.kind, "completing");

  let interpreting = builder.is_interpreting();
  let positional = builder.positional_count();
  let awaiting = builder.awaiting();
  let markers = if interpreting {
    open_markers(expect, builder.parameters())
  } else {
    Vec::new()
  };

  builder.push_lenient(current.clone());
  let args = builder.finish();
  let query = Query {
    cx,
    args: &args,
    current: &current,
    interpreting,
    strict,
  };

  let mut found = Vec::new();

  if current.is_quoted() && current.is_terminated {
    // The value is closed; nothing left to complete.
  } else if interpreting && current.kind == TokenKind::Unquoted && is_marker(current.content) {
    found.extend(
      markers
        .iter()
        .filter(|name| starts_with_ignore_case(name, current.content))
        .cloned(),
    );
    if let Some(slot) = expect.positional(positional) {
      found.extend(query.resolve(slot)?);
    }
  } else if let Some((name, occurrence)) = awaiting {
    if let Some(slot) = expect.named(name).and_then(|param| param.slot(occurrence)) {
      found.extend(query.resolve(slot)?);
    }
  } else if let Some(slot) = expect.positional(positional) {
    found.extend(query.resolve(slot)?);
  } else {
    found.extend(
      markers
        .iter()
        .filter(|name| starts_with_ignore_case(name, current.content))
        .cloned(),
    );
  }

  tracing::debug!(line, candidates = found.len(), "completed line");
  Ok(found)
}

/// Markers that may still appear: flags not yet given and value parameters
/// with room for more values. Long markers come before short ones.
fn open_markers<C>(expect: &Expect<C>, args: &Parameters<'_>) -> Vec<String> {
  let open: Vec<&NamedParameter<C>> = expect
    .named_parameters()
    .iter()
    .filter(|param| is_open(param, args))
    .collect();

  let long = open
    .iter()
    .copied()
    .flat_map(|param| param.names())
    .filter(|name| name.chars().count() > 1);
  let short = open
    .iter()
    .copied()
    .flat_map(|param| param.names())
    .filter(|name| name.chars().count() == 1);

  long.chain(short).map(marker).collect()
}

fn is_open<C>(param: &NamedParameter<C>, args: &Parameters<'_>) -> bool {
  if param.is_flag() {
    return !args.has(param.name());
  }
  param
    .capacity()
    .is_none_or(|max| args.values(param.name()).len() < max)
}

/// Whether the typed text is a marker in the making. A lone `-` counts, a
/// negative number does not.
fn is_marker(text: &str) -> bool {
  text == SHORT_PREFIX || text.starts_with(LONG_PREFIX) || is_short_marker(text)
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
  value.to_lowercase().starts_with(&prefix.to_lowercase())
}

fn matching(values: impl IntoIterator<Item = String>, typed: &str) -> Vec<Candidate> {
  values
    .into_iter()
    .filter(|value| starts_with_ignore_case(value, typed))
    .map(Candidate::Value)
    .collect()
}

fn is_blank(ch: char) -> bool {
  ch.is_ascii_whitespace()
}

/// Opens a quote when an unquoted word would otherwise split or start one.
fn quote(value: &str) -> String {
  if value.contains(is_blank) || value.starts_with('"') {
    format!("\"{}", escape(value))
  } else {
    value.to_string()
  }
}

struct Query<'q, 'a, C> {
  cx:           &'q C,
  /// Lenient parse of the whole line, handed to providers.
  args:         &'q Parameters<'a>,
  current:      &'q Token<'a>,
  interpreting: bool,
  /// Whether provider errors abort completion.
  strict:       bool,
}

impl<C> Query<'_, '_, C> {
  fn resolve(&self, slot: &Slot<C>) -> Result<Vec<String>, ProviderError> {
    let typed = self.current.value();
    let candidates = self.candidates(slot, &typed)?;
    Ok(
      candidates
        .into_iter()
        .map(|candidate| {
          match candidate {
            Candidate::Value(value) => self.render(&value),
            Candidate::Replacement(text) => text,
          }
        })
        .collect(),
    )
  }

  fn candidates(&self, slot: &Slot<C>, typed: &str) -> Result<Vec<Candidate>, ProviderError> {
    Ok(match slot {
      Slot::Any(values) => matching(values.iter().cloned(), typed),
      Slot::Raw(provider) => {
        self
          .provide(provider.as_ref())?
          .into_iter()
          .map(Candidate::Value)
          .collect()
      },
      Slot::Suggest(provider) => matching(self.provide(provider.as_ref())?, typed),
      Slot::Words(inner) => self.words(inner, typed)?,
      Slot::Split(inner) => self.split(inner, typed)?,
      Slot::Alternative(branches) => {
        let mut candidates = Vec::new();
        for branch in branches {
          candidates.extend(self.candidates(branch, typed)?);
        }
        candidates
      },
    })
  }

  fn provide(&self, provider: &dyn Provider<C>) -> Result<Vec<String>, ProviderError> {
    match provider.suggest(self.cx, self.args) {
      Ok(values) => Ok(values),
      Err(err) if self.strict => Err(err),
      Err(err) => {
        tracing::warn!(%err, "completion provider failed");
        Ok(Vec::new())
      },
    }
  }

  /// Completes the last word of a multi-word value against the inner
  /// positional slots.
  fn words(&self, inner: &Expect<C>, typed: &str) -> Result<Vec<Candidate>, ProviderError> {
    let (head, last) = typed.split_at(typed.rfind(is_blank).map_or(0, |idx| idx + 1));
    let index = head.split_ascii_whitespace().count();
    let Some(slot) = inner.positional(index) else {
      return Ok(Vec::new());
    };

    Ok(
      self
        .candidates(slot, last)?
        .into_iter()
        .map(|candidate| {
          match candidate {
            Candidate::Value(word) | Candidate::Replacement(word) => {
              Candidate::Value(format!("{head}{word}"))
            },
          }
        })
        .collect(),
    )
  }

  /// Completes a value that is itself a line for `inner`. The inner results
  /// replace the inner last word, which is also the outer last word once
  /// escaped for the quote they end up in.
  fn split(&self, inner: &Expect<C>, typed: &str) -> Result<Vec<Candidate>, ProviderError> {
    let opens_quote = !typed.contains(is_blank);
    let replacements = complete_line(inner, self.cx, typed, self.strict)?;

    Ok(
      replacements
        .into_iter()
        .map(|text| {
          let text = if !self.interpreting {
            text
          } else if !self.current.is_quoted() {
            quote(&text)
          } else if opens_quote {
            format!("\"{}", escape(&text))
          } else {
            escape(&text).into_owned()
          };
          Candidate::Replacement(text)
        })
        .collect(),
    )
  }

  /// Writes a value so it replaces the last word of the line.
  ///
  /// Inside a quote the line's last word begins after the last blank typed,
  /// so only the part of the value past the matching blank is written.
  fn render(&self, value: &str) -> String {
    if !self.interpreting {
      return value.to_string();
    }
    if !self.current.is_quoted() {
      return quote(value);
    }

    let typed = self.current.value();
    if !typed.contains(is_blank) {
      return format!("\"{}", escape(value));
    }
    escape(after_typed_words(value, typed.chars().count())).into_owned()
  }
}

/// The part of `value` after its last blank within the first `typed` chars.
fn after_typed_words(value: &str, typed: usize) -> &str {
  let cut = value
    .char_indices()
    .take(typed)
    .filter(|&(_, ch)| is_blank(ch))
    .last()
    .map_or(0, |(idx, ch)| idx + ch.len_utf8());
  &value[cut..]
}
