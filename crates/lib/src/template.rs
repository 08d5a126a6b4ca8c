//! Command templates.
//!
//! Rule commands are shell command lines with `$${...}` placeholders that are
//! filled in once a rule has been matched against a concrete target.
//!
//! # Placeholder Formats
//!
//! - `$${in}` - the rule's primary prerequisite
//! - `$${out}` - the target being built (the bare name for phony targets)
//! - `$${stem}` - the part of the target name matched by the rule's `%`
//! - `$${out_dir}` - the per-architecture, per-device output directory
//! - `$${device_xml}` - the merged device-definition file
//! - `$${device_type_dir}` - the device-type directory
//! - `$${var:NAME}` - a configuration variable, shell-quoted
//! - `$${raw:NAME}` - a configuration variable spliced verbatim (word splitting applies)
//!
//! Path placeholders are rendered relative to the command's working directory
//! when they lie inside it, and shell-quoted when needed.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence. Single `$`
//! characters pass through unchanged, so shell variables like `$HOME` work.
//!
//! # Example
//!
//! ```
//! use rrmake_lib::template::{parse, Placeholder, Segment};
//!
//! let segments = parse("cp $${in} $${out}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("cp ".to_string()),
//!     Segment::Placeholder(Placeholder::In),
//!     Segment::Literal(" ".to_string()),
//!     Segment::Placeholder(Placeholder::Out),
//! ]);
//! ```

use std::borrow::Cow;

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  In,
  Out,
  Stem,
  OutDir,
  DeviceXml,
  DeviceTypeDir,
  /// `$${var:NAME}`
  Var(String),
  /// `$${raw:NAME}`
  Raw(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during template parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unknown variable: {0}")]
  UnknownVariable(String),

  #[error("placeholder '{0}' has no value for this target")]
  Unavailable(&'static str),
}

/// Supplies values for placeholders.
pub trait Resolver {
  /// Resolve a path-like placeholder (`in`, `out`, `stem`, `out_dir`, `device_xml`, `device_type_dir`).
  fn resolve_path(&self, placeholder: &Placeholder) -> Result<&str, TemplateError>;

  /// Resolve a configuration variable.
  fn resolve_var(&self, name: &str) -> Result<Cow<'_, str>, TemplateError>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed, empty or of an unknown type.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();

        match chars.peek() {
          Some((_, '$')) => {
            chars.next();

            if let Some((_, '{')) = chars.peek() {
              // $$${ -> literal $${
              literal.push_str("$${");
              chars.next();
            } else {
              literal.push_str("$$$");
            }
          }
          Some((_, '{')) => {
            chars.next();

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;

            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(TemplateError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ is a shell variable and passes through.
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, TemplateError> {
  match content {
    "in" => return Ok(Placeholder::In),
    "out" => return Ok(Placeholder::Out),
    "stem" => return Ok(Placeholder::Stem),
    "out_dir" => return Ok(Placeholder::OutDir),
    "device_xml" => return Ok(Placeholder::DeviceXml),
    "device_type_dir" => return Ok(Placeholder::DeviceTypeDir),
    _ => {}
  }

  let (kind, name) = content
    .split_once(':')
    .ok_or_else(|| TemplateError::UnknownType(content.to_string()))?;

  if name.is_empty() {
    return Err(TemplateError::Malformed(format!("missing variable name in '{content}'")));
  }

  match kind {
    "var" => Ok(Placeholder::Var(name.to_string())),
    "raw" => Ok(Placeholder::Raw(name.to_string())),
    _ => Err(TemplateError::UnknownType(kind.to_string())),
  }
}

/// Substitute all placeholders in a command template.
///
/// The result is trimmed so that an empty trailing `$${raw:...}` leaves no
/// dangling whitespace.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Raw(name)) => result.push_str(&resolver.resolve_var(name)?),
      Segment::Placeholder(Placeholder::Var(name)) => result.push_str(&shell_quote(&resolver.resolve_var(name)?)),
      Segment::Placeholder(p) => result.push_str(&shell_quote(resolver.resolve_path(p)?)),
    }
  }

  Ok(result.trim().to_string())
}

/// Quote a single shell word if it contains anything beyond a safe character set.
pub fn shell_quote(value: &str) -> Cow<'_, str> {
  let safe = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+@%^".contains(c);
  if !value.is_empty() && value.chars().all(safe) {
    Cow::Borrowed(value)
  } else {
    Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
  }
}
