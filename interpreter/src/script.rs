use log::debug;

use crate::environment::Namespace;
use crate::error::{Exception, ParseError};
use crate::executor::execute_program;
use crate::parser::parse_program;

/// The result of running one code fragment as a program.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Ran to the end. `output` is `None` when nothing was printed.
    Completed { output: Option<String> },
    /// Raised an exception. `output` holds whatever was printed before it.
    Faulted { description: String, output: String },
}

impl ScriptOutcome {
    /// The text shown under the code: the captured output, or the fault
    /// description in its place.
    pub fn into_output(self) -> Option<String> {
        match self {
            ScriptOutcome::Completed { output } => output,
            ScriptOutcome::Faulted { description, .. } => Some(description),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, ScriptOutcome::Faulted { .. })
    }
}

/// Run `code` as a program against `namespace`, capturing everything it prints.
///
/// Faults never escape: they come back as `ScriptOutcome::Faulted`. Bindings
/// made before a fault stay in the namespace.
pub fn run_script(code: &str, namespace: &mut Namespace) -> ScriptOutcome {
    let mut buffer: Vec<u8> = Vec::new();
    let result = parse_program(code)
        .map_err(Exception::from)
        .and_then(|program| execute_program(&program, namespace, &mut buffer));
    let output = String::from_utf8_lossy(&buffer).into_owned();

    match result {
        Ok(()) => {
            debug!("script completed with {} bytes of output", output.len());
            ScriptOutcome::Completed {
                output: (!output.is_empty()).then_some(output),
            }
        }
        Err(exception) => {
            debug!(
                "script raised {}: {}",
                exception.kind.name(),
                exception.message
            );
            ScriptOutcome::Faulted {
                description: exception.to_string(),
                output,
            }
        }
    }
}

/// Parse `code` without running it.
pub fn check_script(code: &str) -> Result<(), ParseError> {
    parse_program(code).map(|_| ())
}
