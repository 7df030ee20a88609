//! Schema-driven command line parsing and completion.
//!
//! A command declares its shape once as an [`Expect`]. The same declaration
//! then validates finished lines into [`Parameters`] and completes partially
//! typed ones:
//!
//! ```
//! use the_opts::Expect;
//!
//! let expect: Expect = Expect::builder()
//!   .any(["Server", "World"])
//!   .named("name")
//!   .any(["name1", "name2"])
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(expect.complete(&(), "Serv"), ["Server"]);
//!
//! let args = expect.parse("World --name Test").unwrap();
//! assert_eq!(args.get(0).require().unwrap(), "World");
//! assert_eq!(args.get("name").optional().unwrap(), Some("Test"));
//! ```

mod complete;
pub mod expect;
pub mod parameter;
pub mod parameters;
pub mod schema;
pub mod tokenizer;

pub use expect::{
  DeclareError,
  Description,
  Expect,
  ExpectBuilder,
  NamedParameter,
  Presence,
  Provider,
  ProviderError,
  Slot,
};
pub use parameter::{
  Parameter,
  ParameterError,
};
pub use parameters::{
  Declare,
  Key,
  ParseError,
  Parameters,
  ParametersBuilder,
};
pub use schema::{
  SchemaConfig,
  SchemaError,
};
pub use tokenizer::{
  Token,
  TokenKind,
  Tokenizer,
  current_token,
  escape,
  tokenize,
  unescape,
};
