use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use thiserror::Error;

/// A syntax error with its location inside a code fragment.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (<string>, line {line})")]
pub struct ParseError {
    pub message: String,
    /// Byte span relative to the start of the fragment.
    pub span: Range<usize>,
    /// 1-based line within the fragment.
    pub line: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Range<usize>, line: usize) -> Self {
        ParseError {
            message: message.into(),
            span,
            line,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic. `offset` is the byte
    /// position of the fragment inside the file registered as `file_id`.
    pub fn to_diagnostic(&self, file_id: usize, offset: usize) -> Diagnostic<usize> {
        let span = offset + self.span.start..offset + self.span.end;
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(file_id, span)])
            .with_notes(self.notes.clone())
    }
}

/// The built-in exception classes understood by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Exception,
    SyntaxError,
    NameError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    ZeroDivisionError,
    AttributeError,
    RuntimeError,
    RecursionError,
    OverflowError,
    MemoryError,
    AssertionError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 14] = [
        ExceptionKind::Exception,
        ExceptionKind::SyntaxError,
        ExceptionKind::NameError,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::KeyError,
        ExceptionKind::IndexError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::AttributeError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::OverflowError,
        ExceptionKind::MemoryError,
        ExceptionKind::AssertionError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::SyntaxError => "SyntaxError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::MemoryError => "MemoryError",
            ExceptionKind::AssertionError => "AssertionError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// `except parent:` catches `self`.
    pub fn is_subclass_of(self, parent: ExceptionKind) -> bool {
        self == parent
            || parent == ExceptionKind::Exception
            || matches!(
                (self, parent),
                (ExceptionKind::RecursionError, ExceptionKind::RuntimeError)
            )
    }
}

/// A fault raised while running code. Its `Display` is the description a
/// rendered document shows in place of output.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Exception {
            kind,
            message: message.into(),
        }
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(
            ExceptionKind::NameError,
            format!("name '{}' is not defined", name),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::IndexError, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ZeroDivisionError, message)
    }

    pub fn overflow() -> Self {
        Self::new(ExceptionKind::OverflowError, "integer overflow")
    }

    pub fn memory() -> Self {
        Self::new(ExceptionKind::MemoryError, "")
    }

    /// Python shows a missing key through its repr, so callers pass it pre-rendered.
    pub fn key_error(key_repr: String) -> Self {
        Self::new(ExceptionKind::KeyError, key_repr)
    }

    pub fn attribute_error(type_name: &str, attribute: &str) -> Self {
        Self::new(
            ExceptionKind::AttributeError,
            format!("'{}' object has no attribute '{}'", type_name, attribute),
        )
    }

    pub fn io(error: std::io::Error) -> Self {
        Self::new(ExceptionKind::RuntimeError, format!("I/O error: {}", error))
    }
}

impl From<ParseError> for Exception {
    fn from(error: ParseError) -> Self {
        Exception::new(ExceptionKind::SyntaxError, error.to_string())
    }
}
