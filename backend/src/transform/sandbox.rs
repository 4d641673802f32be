//! Compilation of user supplied transform programs.
//!
//! The user hook is never executed as native code. Its source is parsed into a
//! [`TransformProgram`] and run by the DSL executor, which only ever sees the
//! two record sets it is handed. No environment, filesystem or credentials are
//! reachable from a program.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::dsl::{execute, TransformProgram};
use crate::error::TransformCompileError;
use crate::models::{Record, RecordSet};

/// Arguments handed to a transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    pub new_records: &'a [Record],
    pub old_records: &'a [Record],
}

type NativeTransform = dyn Fn(TransformInput<'_>) -> RecordSet + Send + Sync;

enum Kind {
    Program(TransformProgram),
    Native(Box<NativeTransform>),
}

/// A compiled transform: `(new, old) -> replacement records`.
#[derive(Clone)]
pub struct TransformFn {
    kind: Arc<Kind>,
}

impl TransformFn {
    /// Wrap an already parsed program.
    pub fn from_program(program: TransformProgram) -> Self {
        Self {
            kind: Arc::new(Kind::Program(program)),
        }
    }

    /// Wrap a Rust closure, for library callers.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(TransformInput<'_>) -> RecordSet + Send + Sync + 'static,
    {
        Self {
            kind: Arc::new(Kind::Native(Box::new(f))),
        }
    }

    /// Run the transform. Its output replaces the merge result as-is.
    pub fn call(&self, input: TransformInput<'_>) -> RecordSet {
        match self.kind.as_ref() {
            Kind::Program(program) => execute(program, input.new_records, input.old_records).records,
            Kind::Native(f) => f(input),
        }
    }

    /// The underlying program, if this transform was compiled from source.
    pub fn program(&self) -> Option<&TransformProgram> {
        match self.kind.as_ref() {
            Kind::Program(program) => Some(program),
            Kind::Native(_) => None,
        }
    }
}

impl fmt::Debug for TransformFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            Kind::Program(program) => f
                .debug_struct("TransformFn")
                .field("steps", &program.steps.len())
                .finish(),
            Kind::Native(_) => f.write_str("TransformFn(native)"),
        }
    }
}

/// Compile transform source text.
///
/// Returns `Ok(None)` when there is no source, when the source is entirely
/// commented out, or when it is JSON `null`: the built-in strategy applies.
pub fn compile(source: Option<&str>) -> Result<Option<TransformFn>, TransformCompileError> {
    let Some(source) = source else {
        return Ok(None);
    };

    let stripped = strip_comments(source);
    if stripped.trim().is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(&stripped).map_err(|e| TransformCompileError::Parse(e.to_string()))?;

    match value {
        Value::Null => Ok(None),
        Value::Object(_) => {
            let program: TransformProgram = serde_json::from_value(value)
                .map_err(|e| TransformCompileError::Invalid(e.to_string()))?;
            program
                .validate()
                .map_err(|problems| TransformCompileError::Invalid(problems.join("; ")))?;
            Ok(Some(TransformFn::from_program(program)))
        }
        Value::Bool(_) => Err(TransformCompileError::NotAProgram("a boolean")),
        Value::Number(_) => Err(TransformCompileError::NotAProgram("a number")),
        Value::String(_) => Err(TransformCompileError::NotAProgram("a string")),
        Value::Array(_) => Err(TransformCompileError::NotAProgram("an array")),
    }
}

/// Remove `//` and `/* */` comments outside of strings, and lines starting with `#`.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                at_line_start = false;
                out.push(c);
            }
            '#' if at_line_start => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                out.push(' ');
            }
            '\n' => {
                at_line_start = true;
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                at_line_start = false;
                out.push(c);
            }
        }
    }
    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    for c in chars.by_ref() {
        if c == '\n' {
            out.push('\n');
            break;
        }
    }
}
