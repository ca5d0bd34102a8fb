use std::io::Write;
use std::rc::Rc;

use crate::ast::{BinaryOperator, ExceptHandler, Expr, Stmt, Target};
use crate::environment::{Environment, Namespace};
use crate::error::{Exception, ExceptionKind};
use crate::evaluator::{binary_op, delete_item, delete_slice, get_item, set_item, set_slice};
use crate::runtime_value::{Function, Value};

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Execution state for one run of code against a namespace.
///
/// `print` writes go to `output`; the caller decides where that is.
pub struct Interpreter<'a> {
    pub(crate) env: Environment<'a>,
    pub(crate) output: &'a mut dyn Write,
    /// Exceptions being handled by enclosing `except` blocks, innermost last.
    handling: Vec<Exception>,
}

/// Execute a parsed program against `namespace`.
pub fn execute_program(
    program: &[Stmt],
    namespace: &mut Namespace,
    output: &mut dyn Write,
) -> Result<(), Exception> {
    Interpreter::new(namespace, output).run(program)
}

impl<'a> Interpreter<'a> {
    pub fn new(namespace: &'a mut Namespace, output: &'a mut dyn Write) -> Self {
        Interpreter {
            env: Environment::new(namespace),
            output,
            handling: Vec::new(),
        }
    }

    pub fn run(&mut self, program: &[Stmt]) -> Result<(), Exception> {
        self.execute_block(program).map(|_| ())
    }

    pub(crate) fn execute_block(&mut self, body: &[Stmt]) -> Result<Flow, Exception> {
        for stmt in body {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, Exception> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Assignment { targets, value } => {
                let value = self.evaluate(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
            }

            Stmt::AugmentedAssignment {
                target,
                operator,
                value,
            } => self.execute_augmented(target, *operator, value)?,

            Stmt::Pass => {}
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }

            Stmt::Raise(value) => {
                let exception = match value {
                    Some(expr) => to_exception(self.evaluate(expr)?)?,
                    None => self.handling.last().cloned().ok_or_else(|| {
                        Exception::new(
                            ExceptionKind::RuntimeError,
                            "No active exception to reraise",
                        )
                    })?,
                };
                return Err(exception);
            }

            Stmt::Delete(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
            }

            Stmt::Global(names) => {
                for name in names {
                    self.env.declare_global(name);
                }
            }

            Stmt::Assert { test, message } => {
                if !self.evaluate(test)?.is_truthy() {
                    let message = match message {
                        Some(expr) => self.evaluate(expr)?.to_str(),
                        None => String::new(),
                    };
                    return Err(Exception::new(ExceptionKind::AssertionError, message));
                }
            }

            Stmt::If { branches, orelse } => {
                for (condition, body) in branches {
                    if self.evaluate(condition)?.is_truthy() {
                        return self.execute_block(body);
                    }
                }
                return self.execute_block(orelse);
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }

            Stmt::For { target, iter, body } => {
                for item in self.evaluate(iter)?.iterate()? {
                    self.assign_target(target, item)?;
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }

            Stmt::FunctionDef(def) => {
                let mut defaults = Vec::with_capacity(def.parameters.len());
                for parameter in &def.parameters {
                    defaults.push(match &parameter.default {
                        Some(expr) => Some(self.evaluate(expr)?),
                        None => None,
                    });
                }
                let function = Function {
                    def: Rc::clone(def),
                    defaults,
                };
                self.env.assign(&def.name, Value::Function(Rc::new(function)));
            }

            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let outcome = match self.execute_block(body) {
                    Ok(Flow::Normal) => self.execute_block(orelse),
                    Ok(flow) => Ok(flow),
                    Err(exception) => self.handle_exception(handlers, exception),
                };
                if finalbody.is_empty() {
                    return outcome;
                }
                // A `return`/`break` in `finally` overrides the pending outcome.
                return match self.execute_block(finalbody)? {
                    Flow::Normal => outcome,
                    flow => Ok(flow),
                };
            }
        }
        Ok(Flow::Normal)
    }

    fn handle_exception(
        &mut self,
        handlers: &[ExceptHandler],
        exception: Exception,
    ) -> Result<Flow, Exception> {
        for handler in handlers {
            let matches = match &handler.class {
                None => true,
                Some(expr) => {
                    let class = self.evaluate(expr)?;
                    exception_matches(&class, exception.kind)?
                }
            };
            if !matches {
                continue;
            }

            if let Some(name) = &handler.binding {
                self.env
                    .assign(name, Value::Exception(Rc::new(exception.clone())));
            }
            self.handling.push(exception);
            let result = self.execute_block(&handler.body);
            self.handling.pop();
            if let Some(name) = &handler.binding {
                self.env.delete(name);
            }
            return result;
        }
        Err(exception)
    }

    fn execute_augmented(
        &mut self,
        target: &Target,
        operator: BinaryOperator,
        value: &Expr,
    ) -> Result<(), Exception> {
        match target {
            Target::Name(name) => {
                let current = self
                    .env
                    .lookup(name)
                    .ok_or_else(|| Exception::name_error(name))?;
                let value = self.evaluate(value)?;
                let updated = augmented(operator, current, &value)?;
                self.env.assign(name, updated);
            }
            Target::Subscript { value: container, index } => {
                let container = self.evaluate(container)?;
                let key = self.evaluate(index)?;
                let current = get_item(&container, &key)?;
                let value = self.evaluate(value)?;
                let updated = augmented(operator, current, &value)?;
                set_item(&container, key, updated)?;
            }
            Target::Tuple(_) => {
                return Err(Exception::new(
                    ExceptionKind::SyntaxError,
                    "illegal expression for augmented assignment",
                ));
            }
        }
        Ok(())
    }

    /// Bind `value` to an assignment target, unpacking tuples.
    pub(crate) fn assign_target(&mut self, target: &Target, value: Value) -> Result<(), Exception> {
        match target {
            Target::Name(name) => self.env.assign(name, value),
            Target::Subscript { value: container, index } => {
                let container = self.evaluate(container)?;
                match index {
                    Expr::Slice { start, stop, step } => {
                        let bounds = self.evaluate_slice(start, stop, step)?;
                        set_slice(&container, bounds, value)?;
                    }
                    index => {
                        let key = self.evaluate(index)?;
                        set_item(&container, key, value)?;
                    }
                }
            }
            Target::Tuple(targets) => {
                let items = value.iterate().map_err(|_| {
                    Exception::type_error(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    ))
                })?;
                if items.len() > targets.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                if items.len() < targets.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign_target(target, item)?;
                }
            }
        }
        Ok(())
    }

    fn delete_target(&mut self, target: &Target) -> Result<(), Exception> {
        match target {
            Target::Name(name) => {
                if !self.env.delete(name) {
                    return Err(Exception::name_error(name));
                }
            }
            Target::Subscript { value, index } => {
                let container = self.evaluate(value)?;
                match index {
                    Expr::Slice { start, stop, step } => {
                        let bounds = self.evaluate_slice(start, stop, step)?;
                        delete_slice(&container, bounds)?;
                    }
                    index => {
                        let key = self.evaluate(index)?;
                        delete_item(&container, &key)?;
                    }
                }
            }
            Target::Tuple(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
            }
        }
        Ok(())
    }
}

/// `x op= y`. Lists extend in place, so aliases see the change.
fn augmented(operator: BinaryOperator, current: Value, value: &Value) -> Result<Value, Exception> {
    if let (BinaryOperator::Addition, Value::List(items)) = (operator, &current) {
        let extra = value.iterate()?;
        items.borrow_mut().extend(extra);
        return Ok(current);
    }
    binary_op(operator, &current, value)
}

/// The exception raised by `raise value`.
fn to_exception(value: Value) -> Result<Exception, Exception> {
    match value {
        Value::Exception(exception) => Ok(exception.as_ref().clone()),
        Value::ExceptionType(kind) => Ok(Exception::new(kind, "")),
        _ => Err(Exception::type_error(
            "exceptions must derive from BaseException",
        )),
    }
}

/// Does `except class:` catch an exception of `kind`?
fn exception_matches(class: &Value, kind: ExceptionKind) -> Result<bool, Exception> {
    match class {
        Value::ExceptionType(parent) => Ok(kind.is_subclass_of(*parent)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(class, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}
