use log::debug;

use crate::environment::Namespace;
use crate::error::{Exception, ParseError};
use crate::executor::Interpreter;
use crate::parser::{parse_expression, parse_program};
use crate::runtime_value::Value;

/// Marks a line the reader "typed" into the session.
pub const PROMPT: &str = ">>> ";

/// Marks a line that continues the statement above it.
pub const CONTINUATION: &str = "...";

/// How a single line of a session block is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLine<'a> {
    /// `>>> code`: run, with the code after the marker.
    Prompt(&'a str),
    /// `... code` (or a bare `...`): joined to the statement above.
    Continuation(&'a str),
    /// Anything else: echoed, never run.
    Text,
}

impl<'a> SessionLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        if let Some(code) = line.strip_prefix(PROMPT) {
            return SessionLine::Prompt(code);
        }
        match line.strip_prefix(CONTINUATION) {
            Some("") => SessionLine::Continuation(""),
            Some(rest) => match rest.strip_prefix(' ') {
                Some(code) => SessionLine::Continuation(code),
                None => SessionLine::Text,
            },
            None => SessionLine::Text,
        }
    }

    /// Length of the marker in front of the code.
    fn marker_len(&self, line: &str) -> usize {
        match self {
            SessionLine::Prompt(code) | SessionLine::Continuation(code) => line.len() - code.len(),
            SessionLine::Text => 0,
        }
    }
}

/// A run of session lines that is echoed and evaluated together.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatement<'a> {
    /// Lines copied into the transcript as written.
    pub echo: Vec<&'a str>,
    /// The code with markers removed, or `None` for plain text.
    pub source: Option<String>,
    /// For each joined line: its offset in `source` and in the block.
    segments: Vec<(usize, usize)>,
}

impl SessionStatement<'_> {
    /// Map a byte offset inside `source` back to an offset in the block.
    pub fn block_offset(&self, source_offset: usize) -> usize {
        self.segments
            .iter()
            .rev()
            .find(|(start, _)| *start <= source_offset)
            .map(|(start, block)| block + (source_offset - start))
            .unwrap_or(source_offset)
    }
}

/// Group the lines of a session block into statements.
pub fn session_statements(code: &str) -> Vec<SessionStatement<'_>> {
    let mut statements: Vec<SessionStatement<'_>> = Vec::new();
    let mut offset = 0;

    for raw in code.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line_offset = offset;
        offset += raw.len();

        let kind = SessionLine::classify(line);
        let code_offset = line_offset + kind.marker_len(line);
        match kind {
            SessionLine::Prompt(code) => statements.push(SessionStatement {
                echo: vec![line],
                source: Some(code.to_string()),
                segments: vec![(0, code_offset)],
            }),
            SessionLine::Continuation(code) => match statements.last_mut() {
                Some(SessionStatement {
                    echo,
                    source: Some(source),
                    segments,
                }) => {
                    source.push('\n');
                    segments.push((source.len(), code_offset));
                    source.push_str(code);
                    echo.push(line);
                }
                _ => statements.push(SessionStatement {
                    echo: vec![line],
                    source: None,
                    segments: Vec::new(),
                }),
            },
            SessionLine::Text => statements.push(SessionStatement {
                echo: vec![line],
                source: None,
                segments: Vec::new(),
            }),
        }
    }
    statements
}

/// Replay a session block against `namespace` and return the transcript:
/// every line echoed, each statement followed by what it printed and the
/// repr of its value (when it is an expression whose value is not `None`).
/// A statement that raises shows only `exception: <description>`.
pub fn replay_session(code: &str, namespace: &mut Namespace) -> String {
    let mut transcript = String::new();
    for statement in session_statements(code) {
        for line in &statement.echo {
            transcript.push_str(line);
            transcript.push('\n');
        }
        if let Some(source) = &statement.source {
            transcript.push_str(&evaluate_statement(source, namespace));
        }
    }
    transcript
}

fn evaluate_statement(source: &str, namespace: &mut Namespace) -> String {
    let mut buffer: Vec<u8> = Vec::new();
    let result = run_statement(source, namespace, &mut buffer);

    match result {
        Ok(value) => {
            let mut output = String::from_utf8_lossy(&buffer).into_owned();
            if let Some(value) = value {
                output.push_str(&value.repr());
                output.push('\n');
            }
            output
        }
        Err(exception) => {
            debug!(
                "session line raised {}: {}",
                exception.kind.name(),
                exception.message
            );
            format!("exception: {}\n", exception)
        }
    }
}

/// Evaluate `source` as an expression when it is one, otherwise execute it.
fn run_statement(
    source: &str,
    namespace: &mut Namespace,
    output: &mut Vec<u8>,
) -> Result<Option<Value>, Exception> {
    let mut interpreter = Interpreter::new(namespace, output);
    match parse_expression(source) {
        Ok(expr) => {
            let value = interpreter.evaluate(&expr)?;
            Ok((!matches!(value, Value::None)).then_some(value))
        }
        Err(_) => {
            let program = parse_program(source)?;
            interpreter.run(&program)?;
            Ok(None)
        }
    }
}

/// Syntax errors in a session block, with spans relative to the block.
pub fn check_session(code: &str) -> Vec<ParseError> {
    let mut errors = Vec::new();
    for statement in session_statements(code) {
        let Some(source) = &statement.source else {
            continue;
        };
        if parse_expression(source).is_ok() {
            continue;
        }
        if let Err(mut error) = parse_program(source) {
            let start = statement.block_offset(error.span.start);
            let end = statement.block_offset(error.span.end).max(start);
            error.span = start..end;
            errors.push(error);
        }
    }
    errors
}
