//! Command line front end for the-opts.
//!
//! Loads a TOML schema and completes or validates lines against it, which is
//! handy for shell completion hooks and for checking a schema by hand:
//!
//! ```text
//! opts --schema reference.toml complete "--name n"
//! opts --schema reference.toml parse "Server --flag"
//! opts tokens "say \"hi there\""
//! ```

use std::{
  collections::HashSet,
  path::PathBuf,
};

use clap::{
  Parser,
  Subcommand,
};
use eyre::{
  Result,
  WrapErr,
  eyre,
};
use the_opts::{
  Expect,
  SchemaConfig,
  current_token,
  tokenize,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "opts")]
#[command(about = "Complete and validate command lines against a schema")]
struct Cli {
  /// Path to the TOML schema describing the command
  #[arg(long, short)]
  schema: Option<PathBuf>,

  /// Log filter used when RUST_LOG is not set
  #[arg(long, default_value = "warn")]
  log_level: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Print the completions for the last word of LINE, one per line
  Complete { line: String },
  /// Validate LINE and print the parsed parameters as JSON
  Parse { line: String },
  /// Print the tokens of LINE and the token being typed as JSON
  Tokens { line: String },
  /// Print a one-line synopsis of the schema
  Usage,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(&cli.log_level);
  tracing::debug!(command = ?cli.command, schema = ?cli.schema, "running");

  match &cli.command {
    Command::Complete { line } => {
      let expect = load(cli.schema.as_ref())?;
      let mut seen = HashSet::new();
      for completion in expect.complete(&(), line) {
        if seen.insert(completion.clone()) {
          println!("{completion}");
        }
      }
    },
    Command::Parse { line } => {
      let expect = load(cli.schema.as_ref())?;
      let args = expect
        .parse(line)
        .wrap_err_with(|| format!("invalid command line: {line}"))?;
      println!("{}", serde_json::to_string_pretty(&args)?);
    },
    Command::Tokens { line } => {
      let tokens = tokenize(line);
      let current = current_token(line, &tokens);
      let output = serde_json::json!({ "tokens": tokens, "current": current });
      println!("{}", serde_json::to_string_pretty(&output)?);
    },
    Command::Usage => {
      let expect = load(cli.schema.as_ref())?;
      println!("{}", expect.usage());
    },
  }

  Ok(())
}

fn load(path: Option<&PathBuf>) -> Result<Expect> {
  let path = path.ok_or_else(|| eyre!("--schema is required for this command"))?;
  let config = SchemaConfig::load(path)
    .wrap_err_with(|| format!("failed to load schema {}", path.display()))?;
  let expect = config.build().wrap_err("invalid schema")?;
  Ok(expect)
}

fn init_logging(level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}
