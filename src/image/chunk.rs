//! Chunk-format source reader.
//!
//! A thin utility over [`syntax::parse`]: splits bang-terminated chunks
//! out of raw source text, then groups them into class declarations and
//! their method sets. Never touches an [`crate::object::ObjectTable`] or
//! the interpreter directly — a cold-boot caller (the CLI) is
//! responsible for actually defining the classes and compiling the
//! methods this module hands back.

use crate::error::{Error, Result};

/// One class declaration and the method sources that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassChunk {
  pub superclass: String,
  pub name: String,
  pub instance_vars: Vec<String>,
  pub methods: Vec<String>,
}

/// Split `text` into chunk bodies: runs of text terminated by a lone
/// `!` followed by a newline, with `!!` unescaping to a single literal
/// `!`. Empty chunks (blank lines between chunks) are dropped.
pub fn split_chunks(text: &str) -> Vec<String> {
  let mut chars = text.chars().peekable();
  let mut chunks = Vec::new();
  let mut current = String::new();

  while let Some(c) = chars.next() {
    if c == '!' {
      if chars.peek() == Some(&'!') {
        chars.next();
        current.push('!');
        continue;
      }
      if chars.peek() == Some(&'\n') {
        chars.next();
      }
      let trimmed = current.trim();
      if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
      }
      current.clear();
      continue;
    }
    current.push(c);
  }

  chunks
}

/// Parse a class-header chunk: `super name [| ivar ivar ... |]`, the
/// `[| ... |]` clause optional when the class adds no instance
/// variables.
fn parse_header(chunk: &str) -> Result<(String, String, Vec<String>)> {
  let (head, vars) = match chunk.find("[|") {
    Some(start) => {
      let end = chunk.rfind("|]").ok_or_else(|| Error::ImageLoad(format!("unterminated instance-variable clause: {chunk}")))?;
      let vars = chunk[start + 2..end].split_whitespace().map(str::to_string).collect();
      (&chunk[..start], vars)
    }
    None => (chunk, Vec::new()),
  };
  let mut words = head.split_whitespace();
  let superclass = words.next().ok_or_else(|| Error::ImageLoad(format!("empty class header: {chunk}")))?.to_string();
  let name = words.next().ok_or_else(|| Error::ImageLoad(format!("class header missing class name: {chunk}")))?.to_string();
  if words.next().is_some() {
    return Err(Error::ImageLoad(format!("malformed class header: {chunk}")));
  }
  Ok((superclass, name, vars))
}

/// Read a full chunk-format source file into its class declarations.
/// Each class header chunk is optionally followed by a `{` chunk, a run
/// of method-body chunks, and a closing `}` chunk.
pub fn read_source(text: &str) -> Result<Vec<ClassChunk>> {
  let chunks = split_chunks(text);
  let mut classes = Vec::new();
  let mut iter = chunks.into_iter().peekable();

  while let Some(chunk) = iter.next() {
    let (superclass, name, instance_vars) = parse_header(&chunk)?;
    let mut methods = Vec::new();
    if iter.peek().map(String::as_str) == Some("{") {
      iter.next();
      loop {
        match iter.next() {
          Some(m) if m == "}" => break,
          Some(m) => methods.push(m),
          None => return Err(Error::ImageLoad(format!("unterminated method set for {name}"))),
        }
      }
    }
    classes.push(ClassChunk { superclass, name, instance_vars, methods });
  }

  Ok(classes)
}

/// Parse every method chunk in `class` through the ordinary method
/// grammar, surfacing the first syntax error encountered.
pub fn parse_methods(class: &ClassChunk) -> Result<Vec<syntax::ast::Method>> {
  class
    .methods
    .iter()
    .map(|src| syntax::parse(src).map_err(Error::Compile))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_simple_chunks() {
    let text = "one!\ntwo!\n";
    assert_eq!(split_chunks(text), vec!["one", "two"]);
  }

  #[test]
  fn unescapes_doubled_bang() {
    let text = "a!!b!\n";
    assert_eq!(split_chunks(text), vec!["a!b"]);
  }

  #[test]
  fn parses_class_header_with_instance_vars() {
    let text = "Object Point [| x y |]!\n";
    let classes = read_source(text).unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].superclass, "Object");
    assert_eq!(classes[0].name, "Point");
    assert_eq!(classes[0].instance_vars, vec!["x", "y"]);
    assert!(classes[0].methods.is_empty());
  }

  #[test]
  fn parses_class_header_without_instance_vars() {
    let text = "Object Empty!\n";
    let classes = read_source(text).unwrap();
    assert_eq!(classes[0].instance_vars, Vec::<String>::new());
  }

  #[test]
  fn gathers_method_set_between_braces() {
    let text = "Object Point [| x y |]!\n{!\nx ^ x!\ny ^ y!\n}!\n";
    let classes = read_source(text).unwrap();
    assert_eq!(classes[0].methods, vec!["x ^ x", "y ^ y"]);
  }

  #[test]
  fn parses_gathered_methods_with_the_method_grammar() {
    let text = "Object Point [| x |]!\n{!\nx ^ x!\n}!\n";
    let classes = read_source(text).unwrap();
    let methods = parse_methods(&classes[0]).unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].pattern.selector(), "x");
  }

  #[test]
  fn rejects_unterminated_method_set() {
    let text = "Object Point!\n{!\nx ^ x!\n";
    assert!(read_source(text).is_err());
  }
}
