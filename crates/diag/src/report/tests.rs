use super::{Report, Snippet};
use crate::report::{Level, Source};

#[test]
fn snippet_single_line() {
  let src = "lorem ipsum dolor sit amet consectetur adipiscing elit";

  assert_eq!(
    Snippet::new(src, 6..17),
    Snippet {
      s: "lorem ipsum dolor sit amet consectetur adipiscing elit".into(),
      line: 1,
      count: 1,
      span: (6..17).into(),
    }
  );
}

#[test]
fn snippet_multi_line() {
  struct Case {
    src: &'static str,
    src_span: std::ops::Range<usize>,
    snippet: Snippet<'static>,
  }

  let tests = vec![
    Case {
      src: "lorem ipsum\ndolor sit amet\nconsectetur adipiscing elit",
      src_span: 6..17,
      snippet: Snippet {
        s: "lorem ipsum\ndolor sit amet".into(),
        line: 1,
        count: 2,
        span: (6..17).into(),
      },
    },
    Case {
      src: "lorem ipsum\ndolor sit amet\nconsectetur adipiscing elit",
      src_span: 17..31,
      snippet: Snippet {
        s: "dolor sit amet\nconsectetur adipiscing elit".into(),
        line: 2,
        count: 2,
        span: (5..19).into(),
      },
    },
    Case {
      src: "d(                 ",
      src_span: 19..19,
      snippet: Snippet {
        s: "d(".into(),
        line: 1,
        count: 1,
        span: (2..2).into(),
      },
    },
    Case {
      src: "x ",
      src_span: 0..2,
      snippet: Snippet {
        s: "x".into(),
        line: 1,
        count: 1,
        span: (0..1).into(),
      },
    },
  ];

  for (i, case) in tests.iter().enumerate() {
    let snippet = Snippet::new(case.src, case.src_span.clone());
    assert_eq!(snippet, case.snippet, "[Test #{i}] Snippets mismatch");
  }
}

#[test]
fn emit_report_single_line() {
  let report = Report {
    level: Level::Error,
    source: Source::file("goDoIt", "1 + \nfoo"),
    message: "unknown selector `foo`".into(),
    span: (5..8).into(),
    label: None,
    color: false,
  };
  let out = report.emit_to_string().unwrap();
  assert!(out.contains("error: unknown selector `foo`"));
  assert!(out.contains("goDoIt:2"));
  assert!(out.contains("foo"));
}

#[test]
fn emit_report_with_label() {
  let report = Report {
    level: Level::Error,
    source: Source::file("goDoIt", "^ 1 +"),
    message: "expected an expression".into(),
    span: (5..5).into(),
    label: Some("message send is missing its argument".into()),
    color: false,
  };
  let out = report.emit_to_string().unwrap();
  assert!(out.contains("error: expected an expression"));
  assert!(out.contains("message send is missing its argument"));
}

#[test]
fn emit_report_out_of_bounds_span_errors() {
  let report = Report {
    level: Level::Error,
    source: Source::file("goDoIt", "1 + 2"),
    message: "bug".into(),
    span: (10..20).into(),
    label: None,
    color: false,
  };
  assert!(report.emit_to_string().is_err());
}
