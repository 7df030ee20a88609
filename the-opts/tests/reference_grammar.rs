//! End-to-end behaviour of one representative grammar, both on its own and
//! nested inside a `split` value.

use the_opts::{
  Expect,
  ExpectBuilder,
  ParseError,
  escape,
  unescape,
};

fn reference() -> ExpectBuilder {
  Expect::builder()
    .any(["Server", "World"])
    .any(["foo", "boo", "fee", "bee"])
    .stop_interpreting()
    .any([r#""int1"#, r#"int2""#, r#""int3""#])
    .named("name")
    .any(["name1", "name2"])
    .named("rep")
    .any(["param1"])
    .any(["param2"])
    .repeat()
    .flag("flag", ["f"])
    .named("words")
    .words(|words| words.any(["word1", "word2"]))
    .named("spaces")
    .any(["This has spaces", r#"And this has: "too""#])
    .named("suggest")
    .any_raw(["Server", "World"])
    .named("or")
    .any(["foo", "boo"])
    .or()
    .any(["fee", "bee"])
}

fn grammar() -> Expect {
  reference().build().unwrap()
}

fn split_grammar() -> Expect {
  reference()
    .named("split")
    .split(|_| reference())
    .build()
    .unwrap()
}

/// Lines and the completions expected for their last word.
const COMPLETIONS: &[(&str, &[&str])] = &[
  ("Server", &["Server"]),
  ("Serv", &["Server"]),
  ("serv", &["Server"]),
  ("", &["Server", "World"]),
  ("Server f", &["foo", "fee"]),
  ("Server ", &["foo", "boo", "fee", "bee"]),
  ("--name n", &["name1", "name2"]),
  ("--flag ", &["Server", "World"]),
  ("--rep a --rep b --rep ", &["param2"]),
  ("--rep ", &["param1"]),
  ("--words \"some thing word", &["word1", "word2"]),
  ("--words \"some thing ", &["word1", "word2"]),
  ("Server foo \"", &["\"int1", "\"int3\""]),
  ("Server foo ", &["\"int1", "int2\"", "\"int3\""]),
  ("--spaces \"This", &["\"This has spaces"]),
  ("--spaces \"This has", &["has spaces"]),
  ("--spaces \"And this", &["this has: \\\"too\\\""]),
  ("--spaces Th", &["\"This has spaces"]),
  ("--suggest Server", &["Server", "World"]),
  ("--suggest xyz", &["Server", "World"]),
  ("--or f", &["foo", "fee"]),
  ("--or ", &["foo", "boo", "fee", "bee"]),
  ("--name \"name1\"", &[]),
];

#[track_caller]
fn assert_same(actual: Vec<String>, expected: &[&str], line: &str) {
  let mut actual = actual;
  let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
  actual.sort();
  expected.sort();
  assert_eq!(actual, expected, "completing {line:?}");
}

/// Writes `line` as the value of `--split`, as a user would type it.
fn nested(line: &str) -> String {
  format!("--split \"{}", escape(line))
}

/// Undoes the quoting a nested completion picks up on the way out.
fn unnest(completion: &str) -> String {
  unescape(completion.strip_prefix('"').unwrap_or(completion)).into_owned()
}

/// Replaces the last word of `line` with `completion`.
fn splice(line: &str, completion: &str) -> String {
  let start = line
    .rfind(|ch: char| ch.is_ascii_whitespace())
    .map_or(0, |idx| idx + 1);
  format!("{}{completion}", &line[..start])
}

#[test]
fn completes_reference_lines() {
  let grammar = grammar();
  for (line, expected) in COMPLETIONS {
    assert_same(grammar.complete(&(), line), expected, line);
  }
}

#[test]
fn completes_reference_lines_inside_split() {
  let grammar = split_grammar();
  for (line, expected) in COMPLETIONS {
    let outer = nested(line);
    let actual = grammar
      .complete(&(), &outer)
      .iter()
      .map(|completion| unnest(completion))
      .collect();
    assert_same(actual, expected, &outer);
  }
}

#[test]
fn completes_markers() {
  let grammar = grammar();
  assert_same(
    grammar.complete(&(), "--s"),
    &["--spaces", "--suggest"],
    "--s",
  );
  assert_same(
    grammar.complete(&(), "Server foo bar --s"),
    &[],
    "markers after interpretation stopped",
  );
  assert_same(
    split_grammar().complete(&(), "--s"),
    &["--spaces", "--suggest", "--split"],
    "--s",
  );
}

#[test]
fn completions_parse() {
  let grammar = grammar();
  let lines = [
    "",
    "-",
    "--",
    "Server ",
    "Server f",
    "Server foo ",
    "--name n",
    "--name name1 --",
    "--flag -",
    "--rep a --rep ",
    "--spaces \"This has",
    "--spaces Th",
    "--words \"some thing word",
    "--or ",
  ];
  for line in lines {
    for completion in grammar.complete(&(), line) {
      let typed = splice(line, &completion);
      assert!(
        grammar.parse(&typed).is_ok(),
        "{line:?} completed to {typed:?}"
      );
    }
  }
}

#[test]
fn nested_completions_parse() {
  let grammar = split_grammar();
  let inner = self::grammar();
  for line in ["", "-", "--name name1 --", "Server f", "--spaces \"This"] {
    let outer = nested(line);
    for completion in grammar.complete(&(), &outer) {
      let typed = splice(&outer, &completion);
      let args = grammar.parse(&typed).unwrap();
      let value = unescape(args.get("split").require().unwrap()).into_owned();
      assert!(
        inner.parse(&value).is_ok(),
        "{outer:?} completed to {typed:?}"
      );
    }
  }
}

#[test]
fn parses_positionals() {
  let grammar = grammar();

  let args = grammar.parse("Server").unwrap();
  assert_eq!(args.get(0).require().unwrap(), "Server");

  let args = grammar.parse("Test").unwrap();
  assert_eq!(args.get(0).require().unwrap(), "Test");

  let args = grammar.parse("Server foo").unwrap();
  let first = args.get(0);
  assert!(first.has(2));
  assert!(!first.has(3));
  assert_eq!(first.shift(1).require().unwrap(), "foo");
  assert!(!first.shift(2).has(1));
  assert_eq!(first.varargs().unwrap(), ["Server", "foo"]);
}

#[test]
fn parses_after_interpretation_stops() {
  let grammar = grammar();
  let args = grammar.parse("Server foo \"int1 --name -f").unwrap();
  assert_eq!(args.positionals(), ["Server", "foo", "\"int1", "--name", "-f"]);
  assert!(!args.has("name"));
  assert!(!args.has("flag"));
}

#[test]
fn parses_flags() {
  let grammar = grammar();
  for line in ["--flag", "Test --flag", "--flag Test", "-f"] {
    let args = grammar.parse(line).unwrap();
    assert!(args.has("flag"), "{line}");
  }

  assert!(grammar.parse("Server --flag").unwrap().get("flag").is_set());
  assert!(!grammar.parse("Server").unwrap().get("flag").is_set());
}

#[test]
fn parses_named() {
  let grammar = grammar();
  let args = grammar.parse("--name name1").unwrap();
  assert_eq!(args.get("name").require().unwrap(), "name1");

  let args = grammar.parse("--name Test").unwrap();
  assert_eq!(args.get("name").require().unwrap(), "Test");
  assert_eq!(args.get("rep").optional().unwrap(), None);
  assert_eq!(args.get("rep").optional().unwrap().unwrap_or("default"), "default");

  let args = grammar.parse("--rep a --rep b --rep c").unwrap();
  assert_eq!(args.get("rep").varargs().unwrap(), ["a", "b", "c"]);
  assert_eq!(args.get("rep").shift(2).require().unwrap(), "c");

  let args = grammar.parse("--spaces \"This has spaces\"").unwrap();
  assert_eq!(args.get("spaces").require().unwrap(), "This has spaces");
}

#[test]
fn rejects_invalid_lines() {
  let grammar = grammar();
  assert_eq!(
    grammar.parse("--asjdkla").unwrap_err(),
    ParseError::UnknownParameter {
      token: "--asjdkla".to_string(),
    }
  );
  assert!(matches!(
    grammar.parse("-fs").unwrap_err(),
    ParseError::UnknownParameter { .. }
  ));
  assert_eq!(
    grammar.parse("--name a --name b").unwrap_err(),
    ParseError::TooManyArguments {
      name: "name".to_string(),
    }
  );
}

#[test]
fn parses_inside_split() {
  let grammar = split_grammar();
  let inner = self::grammar();

  let parse = |line: &str| -> Result<Vec<String>, ParseError> {
    let outer = format!("--split \"{}\"", escape(line));
    let args = grammar.parse(&outer).unwrap();
    let value = unescape(args.get("split").require().unwrap()).into_owned();
    let args = inner.parse(&value)?;
    Ok(args.iter().map(|arg| arg.to_string()).collect())
  };

  assert_eq!(parse("Server foo").unwrap(), ["Server", "foo"]);
  assert_eq!(parse("--flag Test").unwrap(), ["Test"]);
  assert_eq!(parse("--spaces \"This has spaces\" x").unwrap(), ["x"]);
  assert!(matches!(
    parse("--asjdkla"),
    Err(ParseError::UnknownParameter { .. })
  ));
  assert!(matches!(
    parse("--name a --name b"),
    Err(ParseError::TooManyArguments { .. })
  ));
}

#[test]
fn shared_between_threads() {
  let grammar = split_grammar();
  std::thread::scope(|scope| {
    for (line, expected) in COMPLETIONS {
      let grammar = &grammar;
      scope.spawn(move || {
        assert_same(grammar.complete(&(), line), expected, line);
        let _ = grammar.parse(line);
      });
    }
  });
}
