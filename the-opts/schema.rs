//! Loading an [`Expect`] from TOML.
//!
//! ```toml
//! positional = [
//!   { any = ["Server", "World"] },
//!   "stop_interpreting",
//!   { any_raw = ["rest"] },
//! ]
//!
//! [[named]]
//! name = "rep"
//! repeat = true
//! slots = [{ any = ["param1"] }, { any = ["param2"] }]
//! labels = ["first", "more"]
//! presence = ["required"]
//!
//! [[flags]]
//! name = "flag"
//! aliases = ["f"]
//! ```
//!
//! `labels` and `presence` name the slots of a list for the usage line, in
//! slot order; `stop_interpreting` entries do not count as slots.
//!
//! The configuration is replayed through [`ExpectBuilder`], so a schema is
//! rejected for exactly the reasons a builder chain would be. Providers
//! computing candidates at completion time can only be declared in code.

use std::{
  io,
  path::{
    Path,
    PathBuf,
  },
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::expect::{
  DeclareError,
  Expect,
  ExpectBuilder,
  Presence,
};

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("failed to read schema '{}': {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to parse schema: {0}")]
  Toml(#[from] toml::de::Error),
  #[error(transparent)]
  Declare(#[from] DeclareError),
  #[error("'stop_interpreting' is only allowed in the top-level positional list")]
  MisplacedStop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
  pub positional: Vec<SlotConfig>,
  /// Repeats the last positional slot.
  pub repeat:     bool,
  /// Usage labels of the positional slots.
  pub labels:     Vec<String>,
  pub presence:   Vec<Presence>,
  pub named:      Vec<NamedConfig>,
  pub flags:      Vec<FlagConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotConfig {
  Any(Vec<String>),
  AnyRaw(Vec<String>),
  Skip,
  StopInterpreting,
  Words(Box<SchemaConfig>),
  Split(Box<SchemaConfig>),
  Or(Vec<SlotConfig>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedConfig {
  pub name:     String,
  #[serde(default)]
  pub aliases:  Vec<String>,
  #[serde(default)]
  pub slots:    Vec<SlotConfig>,
  #[serde(default)]
  pub repeat:   bool,
  #[serde(default)]
  pub labels:   Vec<String>,
  #[serde(default)]
  pub presence: Vec<Presence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagConfig {
  pub name:    String,
  #[serde(default)]
  pub aliases: Vec<String>,
}

impl SchemaConfig {
  pub fn from_toml(source: &str) -> Result<Self, SchemaError> {
    Ok(toml::from_str(source)?)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| {
      SchemaError::Io {
        path: path.to_path_buf(),
        source,
      }
    })?;
    tracing::debug!(path = %path.display(), "loading schema");
    Self::from_toml(&source)
  }

  pub fn build<C>(&self) -> Result<Expect<C>, SchemaError> {
    Ok(self.declare(ExpectBuilder::new())?.build()?)
  }

  fn declare<C>(&self, mut builder: ExpectBuilder<C>) -> Result<ExpectBuilder<C>, SchemaError> {
    let mut index = 0;
    for slot in &self.positional {
      if *slot == SlotConfig::StopInterpreting {
        builder = builder.stop_interpreting();
        continue;
      }
      let adds_slot = slot.adds_slot();
      builder = slot.declare(builder)?;
      if adds_slot {
        builder = describe(builder, &self.labels, &self.presence, index);
        index += 1;
      }
    }
    if self.repeat {
      builder = builder.repeat();
    }

    for named in &self.named {
      builder = named
        .aliases
        .iter()
        .fold(builder.named(&named.name), |builder, alias| builder.alias(alias));
      let mut index = 0;
      for slot in &named.slots {
        let adds_slot = slot.adds_slot();
        builder = slot.declare(builder)?;
        if adds_slot {
          builder = describe(builder, &named.labels, &named.presence, index);
          index += 1;
        }
      }
      if named.repeat {
        builder = builder.repeat();
      }
    }

    for flag in &self.flags {
      builder = builder.flag(&flag.name, &flag.aliases);
    }
    Ok(builder)
  }
}

/// Applies the usage label and presence configured for slot `index`.
fn describe<C>(
  builder: ExpectBuilder<C>,
  labels: &[String],
  presence: &[Presence],
  index: usize,
) -> ExpectBuilder<C> {
  let builder = match labels.get(index) {
    Some(label) => builder.describe([label.as_str()]),
    None => builder,
  };
  match presence.get(index) {
    Some(Presence::Required) => builder.required(),
    Some(Presence::Naked) => builder.naked(),
    Some(Presence::Optional) | None => builder,
  }
}

impl SlotConfig {
  /// Whether declaring this entry pushes a slot. Empty alternatives are
  /// ignored.
  fn adds_slot(&self) -> bool {
    match self {
      SlotConfig::StopInterpreting => false,
      SlotConfig::Or(branches) => branches.iter().any(SlotConfig::adds_slot),
      _ => true,
    }
  }

  fn declare<C>(&self, builder: ExpectBuilder<C>) -> Result<ExpectBuilder<C>, SchemaError> {
    Ok(match self {
      SlotConfig::Any(values) => builder.any(values),
      SlotConfig::AnyRaw(values) => builder.any_raw(values),
      SlotConfig::Skip => builder.skip(),
      SlotConfig::StopInterpreting => return Err(SchemaError::MisplacedStop),
      SlotConfig::Words(inner) => {
        let inner = inner.declare(ExpectBuilder::new())?;
        builder.words(|_| inner)
      },
      SlotConfig::Split(inner) => {
        let inner = inner.declare(ExpectBuilder::new())?;
        builder.split(|_| inner)
      },
      SlotConfig::Or(branches) => {
        let mut branches = branches
          .iter()
          .filter(|branch| branch.adds_slot() || **branch == SlotConfig::StopInterpreting);
        let Some(first) = branches.next() else {
          return Ok(builder);
        };
        let mut builder = first.declare(builder)?;
        for branch in branches {
          builder = branch.declare(builder.or())?;
        }
        builder
      },
    })
  }
}

#[cfg(test)]
mod test {
  use std::io::Write;

  use super::*;
  use crate::parameters::Declare;

  const REFERENCE: &str = include_str!("tests/reference.toml");

  #[test]
  fn reference_schema() {
    let expect: Expect = SchemaConfig::from_toml(REFERENCE).unwrap().build().unwrap();
    assert_eq!(expect.stop_after(), Some(2));
    assert_eq!(
      expect.usage(),
      "[1] [2] [3] --name [1] --rep [1] [2]... --words [1] --spaces [1] --suggest [1] --or [1] \
       --split [1] --flag|-f"
    );
    assert_eq!(expect.complete(&(), "Server f"), ["foo", "fee"]);
    assert_eq!(expect.complete(&(), "--or f"), ["foo", "fee"]);
    assert_eq!(expect.complete(&(), "--words \"one w"), ["word1", "word2"]);
    assert_eq!(expect.complete(&(), "--split \"--name n"), ["name1", "name2"]);
  }

  #[test]
  fn load_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(REFERENCE.as_bytes()).unwrap();

    let config = SchemaConfig::load(file.path()).unwrap();
    assert_eq!(config, SchemaConfig::from_toml(REFERENCE).unwrap());
    assert_eq!(config.flags[0].aliases, ["f"]);
  }

  #[test]
  fn missing_file() {
    let err = SchemaConfig::load("/nonexistent/schema.toml").unwrap_err();
    assert!(matches!(err, SchemaError::Io { .. }));
  }

  #[test]
  fn rejected_schemas() {
    let err = SchemaConfig::from_toml("unknown = 1").unwrap_err();
    assert!(matches!(err, SchemaError::Toml(_)));

    let config = SchemaConfig::from_toml(
      r#"
      [[named]]
      name = "x"
      slots = ["stop_interpreting"]
      "#,
    )
    .unwrap();
    assert!(matches!(config.build::<()>(), Err(SchemaError::MisplacedStop)));

    let config = SchemaConfig::from_toml(
      r#"
      [[named]]
      name = "x"

      [[flags]]
      name = "x"
      "#,
    )
    .unwrap();
    assert!(matches!(
      config.build::<()>(),
      Err(SchemaError::Declare(DeclareError::DuplicateName { .. }))
    ));
  }

  #[test]
  fn described_schema() {
    let config = SchemaConfig::from_toml(
      r#"
      positional = [{ any = ["a"] }, "stop_interpreting", { or = [] }, "skip", "skip"]
      labels = ["first", "second"]
      presence = ["required", "naked"]
      repeat = true

      [[named]]
      name = "words"
      slots = [{ words = { positional = ["skip"], labels = ["word"] } }]
      presence = ["required"]

      [[named]]
      name = "plain"
      slots = ["skip", "skip"]
      labels = ["x"]
      "#,
    )
    .unwrap();
    let expect: Expect = config.build().unwrap();
    assert_eq!(expect.usage(), "<first> second [3]... --words <word> --plain [x] [2]");
  }

  #[test]
  fn empty_or_is_ignored() {
    let config = SchemaConfig::from_toml(r#"positional = [{ or = [] }, { any = ["a"] }]"#).unwrap();
    let expect: Expect = config.build().unwrap();
    assert_eq!(expect.complete(&(), ""), ["a"]);

    let config = SchemaConfig::from_toml(
      r#"positional = [{ any = ["a"] }, { or = [{ or = [] }, { any = ["b"] }] }]"#,
    )
    .unwrap();
    let expect: Expect = config.build().unwrap();
    assert_eq!(expect.positionals().len(), 2);
    assert_eq!(expect.complete(&(), "a "), ["b"]);
  }
}
