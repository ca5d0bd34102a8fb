pub mod ast;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod format;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod runtime_value;
pub mod script;
pub mod session;

pub use environment::Namespace;
pub use error::{Exception, ExceptionKind, ParseError};
pub use executor::{Interpreter, execute_program};
pub use parser::{parse_expression, parse_program};
pub use runtime_value::Value;
pub use script::{ScriptOutcome, check_script, run_script};
pub use session::{PROMPT, SessionLine, check_session, replay_session};
