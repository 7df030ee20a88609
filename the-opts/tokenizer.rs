//! Splitting a command line into tokens.
//!
//! The tokenizer is schema-agnostic: it only knows about whitespace and
//! double quotes. Deciding whether a token is a positional value, a marker
//! (`--name`, `-n`) or the value of a named parameter happens later in
//! [`crate::parameters`].
//!
//! # Quoting Rules
//!
//! | Syntax | Token |
//! |--------|-------|
//! | `foo` | `Unquoted`, runs up to the next whitespace |
//! | `"foo bar"` | `Quoted`, content `foo bar` |
//! | `"say \"hi\""` | `Quoted`, content `say \"hi\"` (escapes are kept) |
//! | `"foo bar` | `Quoted`, unterminated, runs to the end of the line |
//!
//! Quoted content keeps its backslash escapes. Use [`unescape`] to recover
//! the logical value and [`escape`] to produce text that survives being
//! placed between quotes.
//!
//! # Raw Mode
//!
//! Once [`Tokenizer::stop_interpreting`] is called quotes lose their meaning
//! and every whitespace separated word is returned as a `TokenKind::Raw`
//! token, quotes included.

use std::borrow::Cow;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
  /// A bare word.
  Unquoted,
  /// Text opened by a double quote.
  Quoted,
  /// A word read after interpretation stopped. Quotes are literal.
  Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
  pub kind:          TokenKind,
  /// Byte index of the token's first character. For quoted tokens this is
  /// the opening quote.
  pub start:         usize,
  /// The token exactly as it appears in the input.
  pub raw:           &'a str,
  /// The inner text of the token.
  ///
  /// For quoted tokens this is the text between the quotes with escapes left
  /// in place. For other kinds it is the same as `raw`.
  pub content:       &'a str,
  /// Whether the token is closed.
  ///
  /// A quoted token is terminated by its closing quote, any other token by
  /// the whitespace following it. A token running into the end of the line
  /// is never terminated.
  pub is_terminated: bool,
}

impl<'a> Token<'a> {
  pub fn empty_at(start: usize) -> Self {
    Self {
      kind: TokenKind::Unquoted,
      start,
      raw: "",
      content: "",
      is_terminated: false,
    }
  }

  /// Byte index one past the token's last character.
  pub fn end(&self) -> usize {
    self.start + self.raw.len()
  }

  pub fn is_quoted(&self) -> bool {
    self.kind == TokenKind::Quoted
  }

  /// The logical value of the token: unescaped content for quoted tokens,
  /// the text as typed otherwise.
  pub fn value(&self) -> Cow<'a, str> {
    match self.kind {
      TokenKind::Quoted => unescape(self.content),
      TokenKind::Unquoted | TokenKind::Raw => Cow::Borrowed(self.content),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
  input:        &'a str,
  /// The current byte index of the input being considered.
  pos:          usize,
  /// Cleared by `stop_interpreting`, after which every word is `Raw`.
  interpreting: bool,
}

impl<'a> Tokenizer<'a> {
  pub fn new(input: &'a str) -> Self {
    Self {
      input,
      pos: 0,
      interpreting: true,
    }
  }

  /// Returns the current byte index position of the tokenizer in the input.
  pub fn pos(&self) -> usize {
    self.pos
  }

  pub fn input(&self) -> &'a str {
    self.input
  }

  pub fn is_interpreting(&self) -> bool {
    self.interpreting
  }

  /// Treats the rest of the input as raw whitespace separated words.
  pub fn stop_interpreting(&mut self) {
    self.interpreting = false;
  }

  fn byte(&self) -> Option<u8> {
    self.input.as_bytes().get(self.pos).copied()
  }

  fn skip_blanks(&mut self) {
    while self.byte().is_some_and(|byte| byte.is_ascii_whitespace()) {
      self.pos += 1;
    }
  }

  fn parse_word(&mut self) -> (&'a str, bool) {
    let start = self.pos;
    while self.byte().is_some_and(|byte| !byte.is_ascii_whitespace()) {
      self.pos += 1;
    }
    (&self.input[start..self.pos], self.pos < self.input.len())
  }

  /// Parses the content of a quoted token. The tokenizer must sit on the
  /// opening quote.
  fn parse_quoted(&mut self) -> (&'a str, bool) {
    self.pos += 1;
    let start = self.pos;
    let mut escaped = false;

    for (offset, ch) in self.input[start..].char_indices() {
      if escaped {
        escaped = false;
        continue;
      }
      match ch {
        '\\' => escaped = true,
        '"' => {
          let end = start + offset;
          self.pos = end + 1;
          return (&self.input[start..end], true);
        },
        _ => {},
      }
    }

    self.pos = self.input.len();
    (&self.input[start..], false)
  }
}

impl<'a> Iterator for Tokenizer<'a> {
  type Item = Token<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    self.skip_blanks();

    let start = self.pos;
    let byte = self.byte()?;

    if self.interpreting && byte == b'"' {
      let (content, is_terminated) = self.parse_quoted();
      return Some(Token {
        kind: TokenKind::Quoted,
        start,
        raw: &self.input[start..self.pos],
        content,
        is_terminated,
      });
    }

    let (content, is_terminated) = self.parse_word();
    Some(Token {
      kind: if self.interpreting {
        TokenKind::Unquoted
      } else {
        TokenKind::Raw
      },
      start,
      raw: content,
      content,
      is_terminated,
    })
  }
}

pub fn tokenize(input: &str) -> Vec<Token<'_>> {
  Tokenizer::new(input).collect()
}

/// The token being typed at the end of `line`: the last token when it runs
/// into the end of the line, otherwise an empty token after the trailing
/// whitespace.
pub fn current_token<'a>(line: &'a str, tokens: &[Token<'a>]) -> Token<'a> {
  match tokens.last() {
    Some(last) if last.end() == line.len() => last.clone(),
    _ => Token::empty_at(line.len()),
  }
}

/// Escapes `"` and `\` so the text can be placed between quotes.
pub fn escape(text: &str) -> Cow<'_, str> {
  if !text.contains(['"', '\\']) {
    return Cow::Borrowed(text);
  }

  let mut escaped = String::with_capacity(text.len() + 2);
  for ch in text.chars() {
    if matches!(ch, '"' | '\\') {
      escaped.push('\\');
    }
    escaped.push(ch);
  }
  Cow::Owned(escaped)
}

/// Reverses [`escape`]. Backslashes before any other character are kept.
pub fn unescape(text: &str) -> Cow<'_, str> {
  if !text.contains('\\') {
    return Cow::Borrowed(text);
  }

  let mut unescaped = String::with_capacity(text.len());
  let mut chars = text.chars();
  while let Some(ch) = chars.next() {
    if ch != '\\' {
      unescaped.push(ch);
      continue;
    }
    match chars.next() {
      Some(next @ ('"' | '\\')) => unescaped.push(next),
      Some(next) => {
        unescaped.push('\\');
        unescaped.push(next);
      },
      None => unescaped.push('\\'),
    }
  }
  Cow::Owned(unescaped)
}
