//! Typed, shiftable views over the values of one parameter.

use std::{
  fmt,
  rc::Rc,
  str::FromStr,
};

use thiserror::Error;

use crate::parameters::marker;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
  #[error("missing value for {key}")]
  Missing { key: String },
  #[error("invalid value '{value}': {reason}")]
  Invalid { value: String, reason: String },
}

type Convert<'p, T> = Rc<dyn Fn(&'p str) -> Result<T, ParameterError> + 'p>;

fn verbatim(raw: &str) -> Result<&str, ParameterError> {
  Ok(raw)
}

/// A window onto the values of a positional index or a named parameter.
///
/// The window starts at an offset into the value list. [`Parameter::shift`]
/// moves it further, so `args.get(0).shift(1)` reads the same value as
/// `args.get(1)`. Conversions added with [`Parameter::map`] and
/// [`Parameter::parse`] run lazily when a value is read.
pub struct Parameter<'p, T = &'p str> {
  name:    Option<&'p str>,
  values:  &'p [&'p str],
  offset:  usize,
  present: bool,
  convert: Convert<'p, T>,
}

impl<'p> Parameter<'p> {
  pub(crate) fn positional(values: &'p [&'p str], offset: usize) -> Self {
    Self {
      name: None,
      values,
      offset,
      present: true,
      convert: Rc::new(verbatim),
    }
  }

  pub(crate) fn named(name: &'p str, values: &'p [&'p str], present: bool) -> Self {
    Self {
      name: Some(name),
      values,
      offset: 0,
      present,
      convert: Rc::new(verbatim),
    }
  }
}

impl<'p, T> Parameter<'p, T> {
  /// The declared name, `None` for positionals.
  pub fn name(&self) -> Option<&'p str> {
    self.name
  }

  /// For named parameters, whether the marker appeared at all. For
  /// positionals, whether a value exists at the current offset.
  pub fn is_set(&self) -> bool {
    match self.name {
      Some(_) => self.present,
      None => self.has(1),
    }
  }

  /// Whether at least `count` values exist from the current offset on.
  pub fn has(&self, count: usize) -> bool {
    self.offset + count <= self.values.len()
  }

  pub fn count(&self) -> usize {
    self.values.len().saturating_sub(self.offset)
  }

  pub fn shift(&self, by: usize) -> Self {
    Self {
      name:    self.name,
      values:  self.values,
      offset:  self.offset + by,
      present: self.present,
      convert: Rc::clone(&self.convert),
    }
  }

  /// The unconverted value at the current offset.
  pub fn raw(&self) -> Option<&'p str> {
    self.values.get(self.offset).copied()
  }

  pub fn raw_values(&self) -> &'p [&'p str] {
    self.values.get(self.offset..).unwrap_or_default()
  }

  pub fn optional(&self) -> Result<Option<T>, ParameterError> {
    self.raw().map(|raw| (self.convert)(raw)).transpose()
  }

  pub fn require(&self) -> Result<T, ParameterError> {
    self.optional()?.ok_or_else(|| {
      ParameterError::Missing {
        key: self.describe(),
      }
    })
  }

  /// Converts every value from the current offset on.
  pub fn varargs(&self) -> Result<Vec<T>, ParameterError> {
    self
      .raw_values()
      .iter()
      .map(|&raw| (self.convert)(raw))
      .collect()
  }

  pub fn map<U, E, F>(self, f: F) -> Parameter<'p, U>
  where
    T: 'p,
    E: fmt::Display,
    F: Fn(T) -> Result<U, E> + 'p,
  {
    let convert = self.convert;
    Parameter {
      name:    self.name,
      values:  self.values,
      offset:  self.offset,
      present: self.present,
      convert: Rc::new(move |raw: &'p str| {
        f(convert(raw)?).map_err(|err| {
          ParameterError::Invalid {
            value:  raw.to_string(),
            reason: err.to_string(),
          }
        })
      }),
    }
  }

  pub fn parse<U>(self) -> Parameter<'p, U>
  where
    T: AsRef<str> + 'p,
    U: FromStr,
    U::Err: fmt::Display,
  {
    self.map(|value| value.as_ref().parse::<U>())
  }

  fn describe(&self) -> String {
    match self.name {
      Some(name) => marker(name),
      None => format!("argument {}", self.offset + 1),
    }
  }
}

impl<T> Clone for Parameter<'_, T> {
  fn clone(&self) -> Self {
    self.shift(0)
  }
}

impl<T> fmt::Debug for Parameter<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Parameter")
      .field("name", &self.name)
      .field("values", &self.raw_values())
      .field("present", &self.present)
      .finish_non_exhaustive()
  }
}
