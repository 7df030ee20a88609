#![no_main]

use libfuzzer_sys::fuzz_target;
use the_opts::{
  Expect,
  ExpectBuilder,
  Parameters,
  current_token,
  tokenize,
};

fn grammar() -> ExpectBuilder {
  Expect::builder()
    .any(["Server", "World"])
    .any(["foo", "fee"])
    .stop_interpreting()
    .any([r#""int1"#, r#"int2""#])
    .named("name")
    .any(["name1", "name2"])
    .alias("n")
    .named("rep")
    .any(["param1"])
    .any(["param2"])
    .repeat()
    .flag("flag", ["f"])
    .named("words")
    .words(|words| words.any(["word1", "word2"]))
    .named("spaces")
    .any(["This has spaces", r#"And this has: "too""#])
}

fuzz_target!(|data: &[u8]| {
  let Ok(line) = std::str::from_utf8(data) else {
    return;
  };
  let Ok(expect) = grammar().named("split").split(|_| grammar()).build() else {
    return;
  };

  let tokens = tokenize(line);
  for token in &tokens {
    assert_eq!(&line[token.start..token.end()], token.raw);
  }
  let current = current_token(line, &tokens);
  assert!(current.end() == line.len() || current.start == line.len());

  let _ = expect.parse(line);
  let lenient = Parameters::parse_lenient(line, &expect);
  let _ = lenient.get(0).shift(1).varargs();

  for completion in expect.complete(&(), line) {
    let start = line
      .rfind(|ch: char| ch.is_ascii_whitespace())
      .map_or(0, |idx| idx + 1);
    let typed = format!("{}{completion}", &line[..start]);
    let _ = Parameters::parse_lenient(&typed, &expect);
  }
});
