//! Declaring the shape of a command line.
//!
//! An [`Expect`] lists the positional slots, the named parameters and the
//! flags a command accepts, together with where completion candidates for
//! each value come from. It is assembled with the fluent [`ExpectBuilder`]:
//!
//! ```
//! use the_opts::Expect;
//!
//! let expect: Expect = Expect::builder()
//!   .any(["Server", "World"])
//!   .named("name")
//!   .any(["name1", "name2"])
//!   .flag("flag", ["f"])
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(expect.usage(), "[1] --name [1] --flag|-f");
//! assert_eq!(expect.complete(&(), "--name n"), ["name1", "name2"]);
//! ```
//!
//! Every slot-adding call appends to the current target: the positional list
//! until the first `named`/`flag`, that parameter afterwards. `or` merges the
//! previous and the next slot into an alternative, `repeat` makes the last
//! slot of the target repeat indefinitely.
//!
//! Slots are listed in [`Expect::usage`] by number and as optional unless
//! described otherwise. `describe`, `required`, `optional` and `naked` change
//! the last declared slot, or the last `n` after `at_once(n)`:
//!
//! ```
//! use the_opts::Expect;
//!
//! let expect: Expect = Expect::builder()
//!   .any(["Server", "World"])
//!   .describe(["world"])
//!   .required()
//!   .named("pos")
//!   .skip()
//!   .skip()
//!   .at_once(2)
//!   .describe(["x", "z"])
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(expect.usage(), "<world> --pos [x] [z]");
//! ```

use std::{
  collections::HashMap,
  fmt,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::parameters::{
  Arity,
  Declare,
  Declared,
  LONG_PREFIX,
  ParseError,
  Parameters,
  SHORT_PREFIX,
  marker,
};

/// Failure raised by a suggestion provider.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ProviderError(Box<dyn std::error::Error + Send + Sync>);

impl ProviderError {
  pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self(err.into())
  }
}

/// Produces completion candidates on demand.
///
/// Providers receive the caller's context and a lenient parse of the line so
/// far, so suggestions can depend on what was already typed.
pub trait Provider<C>: Send + Sync {
  fn suggest(&self, cx: &C, args: &Parameters<'_>) -> Result<Vec<String>, ProviderError>;
}

impl<C, F> Provider<C> for F
where
  F: Fn(&C, &Parameters<'_>) -> Result<Vec<String>, ProviderError> + Send + Sync,
{
  fn suggest(&self, cx: &C, args: &Parameters<'_>) -> Result<Vec<String>, ProviderError> {
    self(cx, args)
  }
}

/// A fixed candidate list handed out verbatim.
struct Fixed(Vec<String>);

impl<C> Provider<C> for Fixed {
  fn suggest(&self, _cx: &C, _args: &Parameters<'_>) -> Result<Vec<String>, ProviderError> {
    Ok(self.0.clone())
  }
}

/// The completion source for one value position.
pub enum Slot<C> {
  /// Fixed candidates, filtered by the typed prefix.
  Any(Vec<String>),
  /// Provider output offered as is, without prefix filtering.
  Raw(Arc<dyn Provider<C>>),
  /// Provider output, filtered by the typed prefix.
  Suggest(Arc<dyn Provider<C>>),
  /// A single value holding several words completed against the inner
  /// positional slots, the last one repeating.
  Words(Box<Expect<C>>),
  /// A single value that is itself a command line for the inner schema.
  Split(Box<Expect<C>>),
  /// The union of all branches.
  Alternative(Vec<Slot<C>>),
}

impl<C> Slot<C> {
  fn or(self, other: Slot<C>) -> Slot<C> {
    match self {
      Slot::Alternative(mut branches) => {
        branches.push(other);
        Slot::Alternative(branches)
      },
      slot => Slot::Alternative(vec![slot, other]),
    }
  }
}

impl<C> fmt::Debug for Slot<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Slot::Any(values) => f.debug_tuple("Any").field(values).finish(),
      Slot::Raw(_) => f.write_str("Raw(..)"),
      Slot::Suggest(_) => f.write_str("Suggest(..)"),
      Slot::Words(inner) => f.debug_tuple("Words").field(inner).finish(),
      Slot::Split(inner) => f.debug_tuple("Split").field(inner).finish(),
      Slot::Alternative(branches) => f.debug_tuple("Alternative").field(branches).finish(),
    }
  }
}

/// How a slot is bracketed in the usage line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
  /// `[label]`
  #[default]
  Optional,
  /// `<label>`
  Required,
  /// `label`
  Naked,
}

/// The usage line entry of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
  label:    String,
  presence: Presence,
  /// Set once the label was given explicitly rather than numbered.
  custom:   bool,
}

impl Description {
  fn numbered(index: usize) -> Self {
    Self {
      label:    (index + 1).to_string(),
      presence: Presence::default(),
      custom:   false,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn presence(&self) -> Presence {
    self.presence
  }

  fn render(&self) -> String {
    match self.presence {
      Presence::Optional => format!("[{}]", self.label),
      Presence::Required => format!("<{}>", self.label),
      Presence::Naked => self.label.clone(),
    }
  }
}

pub struct NamedParameter<C> {
  name:         String,
  aliases:      Vec<String>,
  slots:        Vec<Slot<C>>,
  descriptions: Vec<Description>,
  repeatable:   bool,
  flag:         bool,
}

impl<C> NamedParameter<C> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn aliases(&self) -> &[String] {
    &self.aliases
  }

  /// The declared name followed by its aliases.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
  }

  pub fn slots(&self) -> &[Slot<C>] {
    &self.slots
  }

  /// Usage entries, one per slot.
  pub fn descriptions(&self) -> &[Description] {
    &self.descriptions
  }

  pub fn is_flag(&self) -> bool {
    self.flag
  }

  pub fn is_repeatable(&self) -> bool {
    self.repeatable
  }

  /// The slot completing the value at `occurrence`, counted across all
  /// occurrences of the marker.
  pub fn slot(&self, occurrence: usize) -> Option<&Slot<C>> {
    if self.flag {
      return None;
    }
    self
      .slots
      .get(occurrence)
      .or_else(|| self.repeatable.then(|| self.slots.last()).flatten())
  }

  /// How many values the parameter takes in total, `None` when unbounded.
  pub fn capacity(&self) -> Option<usize> {
    (!self.repeatable).then(|| self.slots.len().max(1))
  }

  fn arity(&self) -> Arity {
    if self.flag {
      Arity::Flag
    } else {
      Arity::Values {
        max: self.capacity(),
      }
    }
  }
}

impl<C> fmt::Debug for NamedParameter<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NamedParameter")
      .field("name", &self.name)
      .field("aliases", &self.aliases)
      .field("slots", &self.slots)
      .field("descriptions", &self.descriptions)
      .field("repeatable", &self.repeatable)
      .field("flag", &self.flag)
      .finish()
  }
}

/// A command line schema. `C` is the context handed to providers.
pub struct Expect<C = ()> {
  positional:        Vec<Slot<C>>,
  descriptions:      Vec<Description>,
  repeat_positional: bool,
  stop_after:        Option<usize>,
  named:             Vec<NamedParameter<C>>,
  /// Names and aliases to their index in `named`.
  lookup:            HashMap<String, usize>,
}

impl<C> Expect<C> {
  pub fn builder() -> ExpectBuilder<C> {
    ExpectBuilder::new()
  }

  /// The slot completing positional `index`.
  pub fn positional(&self, index: usize) -> Option<&Slot<C>> {
    self
      .positional
      .get(index)
      .or_else(|| self.repeat_positional.then(|| self.positional.last()).flatten())
  }

  pub fn positionals(&self) -> &[Slot<C>] {
    &self.positional
  }

  /// Usage entries of the positional slots.
  pub fn descriptions(&self) -> &[Description] {
    &self.descriptions
  }

  /// Looks up a named parameter by name or alias.
  pub fn named(&self, name: &str) -> Option<&NamedParameter<C>> {
    self.lookup.get(name).map(|&idx| &self.named[idx])
  }

  pub fn named_parameters(&self) -> &[NamedParameter<C>] {
    &self.named
  }

  /// Validates `line` against the schema.
  pub fn parse<'a>(&'a self, line: &'a str) -> Result<Parameters<'a>, ParseError> {
    Parameters::parse(line, self)
  }

  /// A one-line synopsis such as `[1] [2]... --name <name> --flag|-f`.
  pub fn usage(&self) -> String {
    let mut parts = Vec::new();
    if !self.positional.is_empty() {
      parts.push(describe_slots(&self.descriptions, self.repeat_positional));
    }
    for param in &self.named {
      let markers: Vec<_> = param.names().map(marker).collect();
      let markers = markers.join("|");
      if param.flag {
        parts.push(markers);
      } else if param.descriptions.is_empty() {
        let slots = describe_slots(&[Description::numbered(0)], param.repeatable);
        parts.push(format!("{markers} {slots}"));
      } else {
        let slots = describe_slots(&param.descriptions, param.repeatable);
        parts.push(format!("{markers} {slots}"));
      }
    }
    parts.join(" ")
  }

  fn description_mut(&mut self, (target, idx): (Option<usize>, usize)) -> &mut Description {
    match target {
      Some(param) => &mut self.named[param].descriptions[idx],
      None => &mut self.descriptions[idx],
    }
  }
}

fn describe_slots(descriptions: &[Description], repeat: bool) -> String {
  let slots: Vec<_> = descriptions
    .iter()
    .enumerate()
    .map(|(idx, description)| {
      if repeat && idx + 1 == descriptions.len() {
        format!("{}...", description.render())
      } else {
        description.render()
      }
    })
    .collect();
  slots.join(" ")
}

impl<C> Declare for Expect<C> {
  fn declared(&self, name: &str) -> Option<Declared<'_>> {
    self.named(name).map(|param| {
      Declared {
        name:  &param.name,
        arity: param.arity(),
      }
    })
  }

  fn stop_after(&self) -> Option<usize> {
    self.stop_after
  }
}

impl<C> fmt::Debug for Expect<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Expect")
      .field("positional", &self.positional)
      .field("descriptions", &self.descriptions)
      .field("repeat_positional", &self.repeat_positional)
      .field("stop_after", &self.stop_after)
      .field("named", &self.named)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclareError {
  #[error("parameter '{name}' declared more than once")]
  DuplicateName { name: String },
  #[error("invalid parameter name '{name}'")]
  InvalidName { name: String },
  #[error("'or' must sit between two slots")]
  OrWithoutSlot,
  #[error("'or' used twice in a row")]
  DoubleOr,
  #[error("alias '{alias}' declared before any named parameter")]
  AliasWithoutName { alias: String },
  #[error("'repeat' used before any slot")]
  RepeatWithoutSlot,
  #[error("flag '{name}' cannot take values")]
  FlagWithSlot { name: String },
  #[error("cannot describe {count} slots, only {declared} declared")]
  NotEnoughSlots { count: usize, declared: usize },
  #[error("expected {expected} descriptions, got {found}")]
  DescriptionCount { expected: usize, found: usize },
}

enum Declaration<C> {
  Slot(Pending<C>),
  Named { name: String, flag: bool },
  Alias(String),
  Repeat,
  Or,
  StopInterpreting,
  AtOnce(usize),
  Describe(Vec<String>),
  Presence(Presence),
}

/// A slot whose nested schema is only validated by `build`.
enum Pending<C> {
  Ready(Slot<C>),
  Words(ExpectBuilder<C>),
  Split(ExpectBuilder<C>),
}

impl<C> Pending<C> {
  fn build(self) -> Result<Slot<C>, DeclareError> {
    Ok(match self {
      Pending::Ready(slot) => slot,
      Pending::Words(inner) => {
        let mut inner = inner.build()?;
        inner.repeat_positional = !inner.positional.is_empty();
        Slot::Words(Box::new(inner))
      },
      Pending::Split(inner) => Slot::Split(Box::new(inner.build()?)),
    })
  }
}

/// Records declarations in order. Nothing is validated until
/// [`ExpectBuilder::build`].
pub struct ExpectBuilder<C = ()> {
  declarations: Vec<Declaration<C>>,
}

impl<C> Default for ExpectBuilder<C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C> ExpectBuilder<C> {
  pub fn new() -> Self {
    Self {
      declarations: Vec::new(),
    }
  }

  fn declare(mut self, declaration: Declaration<C>) -> Self {
    self.declarations.push(declaration);
    self
  }

  pub fn slot(self, slot: Slot<C>) -> Self {
    self.declare(Declaration::Slot(Pending::Ready(slot)))
  }

  /// A slot completing from `values`, filtered by the typed prefix.
  pub fn any<I, S>(self, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.slot(Slot::Any(values.into_iter().map(Into::into).collect()))
  }

  /// A slot offering `values` regardless of what was typed.
  pub fn any_raw<I, S>(self, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let fixed = Fixed(values.into_iter().map(Into::into).collect());
    self.slot(Slot::Raw(Arc::new(fixed)))
  }

  /// A slot without candidates.
  pub fn skip(self) -> Self {
    self.slot(Slot::Any(Vec::new()))
  }

  pub fn next<F>(self, provider: F) -> Self
  where
    F: Fn(&C, &Parameters<'_>) -> Result<Vec<String>, ProviderError> + Send + Sync + 'static,
  {
    self.slot(Slot::Suggest(Arc::new(provider)))
  }

  pub fn next_raw<F>(self, provider: F) -> Self
  where
    F: Fn(&C, &Parameters<'_>) -> Result<Vec<String>, ProviderError> + Send + Sync + 'static,
  {
    self.slot(Slot::Raw(Arc::new(provider)))
  }

  pub fn words(self, declare: impl FnOnce(ExpectBuilder<C>) -> ExpectBuilder<C>) -> Self {
    let inner = declare(ExpectBuilder::new());
    self.declare(Declaration::Slot(Pending::Words(inner)))
  }

  pub fn split(self, declare: impl FnOnce(ExpectBuilder<C>) -> ExpectBuilder<C>) -> Self {
    let inner = declare(ExpectBuilder::new());
    self.declare(Declaration::Slot(Pending::Split(inner)))
  }

  /// Starts a named parameter. Following slots belong to it.
  pub fn named(self, name: impl Into<String>) -> Self {
    self.declare(Declaration::Named {
      name: name.into(),
      flag: false,
    })
  }

  /// Declares a flag with its aliases.
  pub fn flag<I, S>(self, name: impl Into<String>, aliases: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let builder = self.declare(Declaration::Named {
      name: name.into(),
      flag: true,
    });
    aliases
      .into_iter()
      .fold(builder, |builder, alias| builder.alias(alias))
  }

  /// Adds an alias to the current named parameter.
  pub fn alias(self, alias: impl Into<String>) -> Self {
    self.declare(Declaration::Alias(alias.into()))
  }

  pub fn or(self) -> Self {
    self.declare(Declaration::Or)
  }

  pub fn repeat(self) -> Self {
    self.declare(Declaration::Repeat)
  }

  /// Makes the following `describe`, `required`, `optional` and `naked` calls
  /// apply to the last `count` slots, across targets. Reset by the next slot.
  pub fn at_once(self, count: usize) -> Self {
    self.declare(Declaration::AtOnce(count))
  }

  /// Labels the selected slots in the usage line, keeping their presence.
  pub fn describe<I, S>(self, labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.declare(Declaration::Describe(labels.into_iter().map(Into::into).collect()))
  }

  pub fn required(self) -> Self {
    self.declare(Declaration::Presence(Presence::Required))
  }

  /// The default for every slot.
  pub fn optional(self) -> Self {
    self.declare(Declaration::Presence(Presence::Optional))
  }

  pub fn naked(self) -> Self {
    self.declare(Declaration::Presence(Presence::Naked))
  }

  /// Stops interpreting markers and quotes once the positionals declared so
  /// far have been read.
  pub fn stop_interpreting(self) -> Self {
    self.declare(Declaration::StopInterpreting)
  }

  pub fn build(self) -> Result<Expect<C>, DeclareError> {
    let mut expect = Expect {
      positional:        Vec::new(),
      descriptions:      Vec::new(),
      repeat_positional: false,
      stop_after:        None,
      named:             Vec::new(),
      lookup:            HashMap::new(),
    };
    // Index into `expect.named`, `None` while declaring positionals.
    let mut target: Option<usize> = None;
    let mut pending_or = false;
    // Every slot pushed so far as (target, index), and how many of the last
    // ones a description applies to.
    let mut order: Vec<(Option<usize>, usize)> = Vec::new();
    let mut at_once = 1;

    for declaration in self.declarations {
      match declaration {
        Declaration::Slot(pending) => {
          let slot = pending.build()?;
          let (slots, descriptions) = match target {
            Some(idx) => {
              let param = &mut expect.named[idx];
              if param.flag {
                return Err(DeclareError::FlagWithSlot {
                  name: param.name.clone(),
                });
              }
              (&mut param.slots, &mut param.descriptions)
            },
            None => (&mut expect.positional, &mut expect.descriptions),
          };
          if std::mem::take(&mut pending_or) {
            let previous = slots.pop().ok_or(DeclareError::OrWithoutSlot)?;
            slots.push(previous.or(slot));
            continue;
          }

          let mut description = Description::numbered(slots.len());
          // Words take over the label of the word they repeat.
          if let Slot::Words(inner) = &slot {
            if let Some(word) = inner.descriptions.last().filter(|word| word.custom) {
              description.label = word.label.clone();
              description.custom = true;
            }
          }
          order.push((target, slots.len()));
          slots.push(slot);
          descriptions.push(description);
          at_once = 1;
        },
        Declaration::Named { name, flag } => {
          if pending_or {
            return Err(DeclareError::OrWithoutSlot);
          }
          let name = normalize(&name)?;
          let idx = expect.named.len();
          expect.register(&name, idx)?;
          expect.named.push(NamedParameter {
            name,
            aliases: Vec::new(),
            slots: Vec::new(),
            descriptions: Vec::new(),
            repeatable: false,
            flag,
          });
          target = Some(idx);
        },
        Declaration::Alias(alias) => {
          let Some(idx) = target else {
            return Err(DeclareError::AliasWithoutName { alias });
          };
          let alias = normalize(&alias)?;
          expect.register(&alias, idx)?;
          expect.named[idx].aliases.push(alias);
        },
        Declaration::Repeat => {
          match target {
            Some(idx) => expect.named[idx].repeatable = true,
            None if expect.positional.is_empty() => return Err(DeclareError::RepeatWithoutSlot),
            None => expect.repeat_positional = true,
          }
        },
        Declaration::Or => {
          if pending_or {
            return Err(DeclareError::DoubleOr);
          }
          pending_or = true;
        },
        Declaration::StopInterpreting => expect.stop_after = Some(expect.positional.len()),
        Declaration::AtOnce(count) => at_once = count,
        Declaration::Describe(labels) => {
          if labels.len() != at_once {
            return Err(DeclareError::DescriptionCount {
              expected: at_once,
              found:    labels.len(),
            });
          }
          for (&slot, label) in selected(&order, at_once)?.iter().zip(labels) {
            let description = expect.description_mut(slot);
            description.label = label;
            description.custom = true;
          }
        },
        Declaration::Presence(presence) => {
          for &slot in selected(&order, at_once)? {
            expect.description_mut(slot).presence = presence;
          }
        },
      }
    }

    if pending_or {
      return Err(DeclareError::OrWithoutSlot);
    }
    Ok(expect)
  }
}

impl<C> Expect<C> {
  fn register(&mut self, name: &str, idx: usize) -> Result<(), DeclareError> {
    if self.lookup.insert(name.to_string(), idx).is_some() {
      return Err(DeclareError::DuplicateName {
        name: name.to_string(),
      });
    }
    Ok(())
  }
}

/// The last `count` slots pushed.
fn selected(
  order: &[(Option<usize>, usize)],
  count: usize,
) -> Result<&[(Option<usize>, usize)], DeclareError> {
  order
    .len()
    .checked_sub(count)
    .map(|start| &order[start..])
    .ok_or(DeclareError::NotEnoughSlots {
      count,
      declared: order.len(),
    })
}

/// Strips an optional marker prefix and checks what remains.
fn normalize(name: &str) -> Result<String, DeclareError> {
  let bare = if let Some(bare) = name.strip_prefix(LONG_PREFIX) {
    bare
  } else if let Some(bare) = name.strip_prefix(SHORT_PREFIX) {
    if bare.chars().count() != 1 {
      return Err(DeclareError::InvalidName {
        name: name.to_string(),
      });
    }
    bare
  } else {
    name
  };

  if bare.is_empty() || bare.starts_with(SHORT_PREFIX) || bare.contains(char::is_whitespace) {
    return Err(DeclareError::InvalidName {
      name: name.to_string(),
    });
  }
  Ok(bare.to_string())
}
