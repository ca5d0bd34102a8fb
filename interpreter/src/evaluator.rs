use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{
    BinaryOperator, BooleanOperator, CompareOperator, Expr, FStringPart, Target, UnaryOperator,
};
use crate::builtins;
use crate::environment::Frame;
use crate::error::{Exception, ExceptionKind};
use crate::executor::{Flow, Interpreter};
use crate::format::format_value;
use crate::methods;
use crate::runtime_value::{
    Dict, Function, MAX_SEQUENCE_LEN, Number, Value, range_item, range_len,
};

/// Deepest allowed nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 100;

impl Interpreter<'_> {
    /// Evaluate an expression to a value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Exception> {
        match expr {
            // --- Literals ---
            Expr::None => Ok(Value::None),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Integer(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(text) => out.push_str(text),
                        FStringPart::Field {
                            expr,
                            conversion,
                            spec,
                        } => {
                            let value = self.evaluate(expr)?;
                            let value = match conversion {
                                Some('r') | Some('a') => Value::Str(value.repr()),
                                Some(_) => Value::Str(value.to_str()),
                                None => value,
                            };
                            out.push_str(&format_value(&value, spec)?);
                        }
                    }
                }
                Ok(Value::Str(out))
            }

            // --- References ---
            Expr::Name(name) => self
                .env
                .lookup(name)
                .or_else(|| builtins::lookup(name))
                .ok_or_else(|| Exception::name_error(name)),

            // --- Displays ---
            Expr::List(items) => Ok(Value::list(self.evaluate_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.evaluate_all(items)?)),
            Expr::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.evaluate(key)?;
                    let value = self.evaluate(value)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::ListComprehension {
                element,
                target,
                iter,
                condition,
            } => self.evaluate_comprehension(element, target, iter, condition.as_deref()),

            // --- Operations ---
            Expr::Unary { operator, operand } => {
                let value = self.evaluate(operand)?;
                unary_op(*operator, &value)
            }
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(*operator, &left, &right)
            }
            Expr::Logical {
                operator,
                left,
                right,
            } => {
                // Short-circuit: the deciding operand is the result.
                let left = self.evaluate(left)?;
                let decided = match operator {
                    BooleanOperator::And => !left.is_truthy(),
                    BooleanOperator::Or => left.is_truthy(),
                };
                if decided { Ok(left) } else { self.evaluate(right) }
            }
            Expr::Compare { left, comparisons } => {
                let mut left = self.evaluate(left)?;
                for (operator, right) in comparisons {
                    let right = self.evaluate(right)?;
                    if !compare(*operator, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional {
                condition,
                body,
                orelse,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(body)
                } else {
                    self.evaluate(orelse)
                }
            }

            // --- Trailers ---
            Expr::Call {
                function,
                arguments,
                keywords,
            } => {
                let function = self.evaluate(function)?;
                let arguments = self.evaluate_all(arguments)?;
                let mut evaluated = Vec::with_capacity(keywords.len());
                for (name, value) in keywords {
                    evaluated.push((name.clone(), self.evaluate(value)?));
                }
                self.call_value(&function, arguments, evaluated)
            }
            Expr::Attribute { value, name } => {
                let receiver = self.evaluate(value)?;
                methods::attribute(receiver, name)
            }
            Expr::Subscript { value, index } => {
                let container = self.evaluate(value)?;
                match index.as_ref() {
                    Expr::Slice { start, stop, step } => {
                        let bounds = self.evaluate_slice(start, stop, step)?;
                        get_slice(&container, bounds)
                    }
                    index => {
                        let key = self.evaluate(index)?;
                        get_item(&container, &key)
                    }
                }
            }
            Expr::Slice { .. } => Err(Exception::new(
                ExceptionKind::SyntaxError,
                "invalid syntax",
            )),
        }
    }

    pub(crate) fn evaluate_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Exception> {
        exprs.iter().map(|expr| self.evaluate(expr)).collect()
    }

    fn evaluate_comprehension(
        &mut self,
        element: &Expr,
        target: &Target,
        iter: &Expr,
        condition: Option<&Expr>,
    ) -> Result<Value, Exception> {
        let items = self.evaluate(iter)?.iterate()?;

        // The loop variables do not leak into the enclosing scope.
        let names: Vec<String> = target.names().into_iter().map(String::from).collect();
        let saved: Vec<Option<Value>> = names.iter().map(|name| self.env.lookup(name)).collect();

        let outcome = self.collect_comprehension(element, target, items, condition);

        for (name, value) in names.iter().zip(saved) {
            match value {
                Some(value) => self.env.assign(name, value),
                None => {
                    self.env.delete(name);
                }
            }
        }

        outcome.map(Value::list)
    }

    fn collect_comprehension(
        &mut self,
        element: &Expr,
        target: &Target,
        items: Vec<Value>,
        condition: Option<&Expr>,
    ) -> Result<Vec<Value>, Exception> {
        let mut result = Vec::new();
        for item in items {
            self.assign_target(target, item)?;
            if let Some(condition) = condition {
                if !self.evaluate(condition)?.is_truthy() {
                    continue;
                }
            }
            result.push(self.evaluate(element)?);
        }
        Ok(result)
    }

    pub(crate) fn evaluate_slice(
        &mut self,
        start: &Option<Box<Expr>>,
        stop: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> Result<SliceBounds, Exception> {
        let mut bound = |expr: &Option<Box<Expr>>| -> Result<Option<i64>, Exception> {
            match expr {
                None => Ok(None),
                Some(expr) => match self.evaluate(expr)? {
                    Value::None => Ok(None),
                    value => value.as_index().map(Some).ok_or_else(|| {
                        Exception::type_error(
                            "slice indices must be integers or None or have an __index__ method",
                        )
                    }),
                },
            }
        };
        Ok(SliceBounds {
            start: bound(start)?,
            stop: bound(stop)?,
            step: bound(step)?,
        })
    }

    /// Call any callable value.
    pub fn call_value(
        &mut self,
        function: &Value,
        arguments: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Value, Exception> {
        match function {
            Value::Function(function) => self.call_function(function, arguments, keywords),
            Value::Builtin(name) => builtins::call(self, name, arguments, keywords),
            Value::Type(name) => builtins::construct(name, arguments, keywords),
            Value::Method { receiver, name } => {
                methods::call(self, receiver, name, arguments, keywords)
            }
            Value::ExceptionType(kind) => {
                builtins::reject_keywords(kind.name(), &keywords)?;
                Ok(Value::Exception(Rc::new(builtins::new_exception(
                    *kind, &arguments,
                ))))
            }
            other => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        arguments: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Value, Exception> {
        let def = &function.def;
        if self.env.depth() >= MAX_CALL_DEPTH {
            return Err(Exception::new(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        let parameters = &def.parameters;
        if arguments.len() > parameters.len() {
            return Err(Exception::type_error(format!(
                "{}() takes {} positional argument{} but {} {} given",
                def.name,
                parameters.len(),
                if parameters.len() == 1 { "" } else { "s" },
                arguments.len(),
                if arguments.len() == 1 { "was" } else { "were" },
            )));
        }

        let mut slots: Vec<Option<Value>> = arguments.into_iter().map(Some).collect();
        slots.resize(parameters.len(), None);

        for (name, value) in keywords {
            let Some(index) = parameters.iter().position(|p| p.name == name) else {
                return Err(Exception::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    def.name, name
                )));
            };
            if slots[index].is_some() {
                return Err(Exception::type_error(format!(
                    "{}() got multiple values for argument '{}'",
                    def.name, name
                )));
            }
            slots[index] = Some(value);
        }

        let mut frame = Frame::new();
        let mut missing = Vec::new();
        for (index, (parameter, slot)) in parameters.iter().zip(slots).enumerate() {
            match slot.or_else(|| function.defaults[index].clone()) {
                Some(value) => frame.bind(parameter.name.clone(), value),
                None => missing.push(format!("'{}'", parameter.name)),
            }
        }
        if !missing.is_empty() {
            let listed = match missing.len() {
                1 => missing[0].clone(),
                n => format!("{} and {}", missing[..n - 1].join(", "), missing[n - 1]),
            };
            return Err(Exception::type_error(format!(
                "{}() missing {} required positional argument{}: {}",
                def.name,
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
                listed
            )));
        }

        self.env.push_frame(frame);
        let result = self.execute_block(&def.body);
        self.env.pop_frame();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

pub fn unary_op(operator: UnaryOperator, value: &Value) -> Result<Value, Exception> {
    if operator == UnaryOperator::LogicalNot {
        return Ok(Value::Bool(!value.is_truthy()));
    }
    let symbol = if operator == UnaryOperator::Negation { "-" } else { "+" };
    match (operator, value.as_number()) {
        (UnaryOperator::Negation, Some(Number::Int(n))) => {
            n.checked_neg().map(Value::Int).ok_or_else(Exception::overflow)
        }
        (UnaryOperator::Negation, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (_, Some(Number::Int(n))) => Ok(Value::Int(n)),
        (_, Some(Number::Float(f))) => Ok(Value::Float(f)),
        _ => Err(Exception::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            value.type_name()
        ))),
    }
}

pub fn binary_op(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        let shifts = matches!(operator, BinaryOperator::LeftShift | BinaryOperator::RightShift);
        if shifts && matches!((a, b), (Number::Float(_), _) | (_, Number::Float(_))) {
            return Err(unsupported_operands(operator.symbol(), left, right));
        }
        return arithmetic(operator, a, b);
    }

    match (operator, left, right) {
        (BinaryOperator::Addition, Value::Str(a), Value::Str(b)) => {
            Ok(Value::Str(format!("{}{}", a, b)))
        }
        (BinaryOperator::Addition, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOperator::Addition, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOperator::Addition, Value::Str(_) | Value::List(_) | Value::Tuple(_), _) => {
            Err(Exception::type_error(format!(
                "can only concatenate {} (not \"{}\") to {}",
                left.type_name(),
                right.type_name(),
                left.type_name()
            )))
        }
        (BinaryOperator::Multiplication, sequence, count)
        | (BinaryOperator::Multiplication, count, sequence)
            if count.as_index().is_some()
                && matches!(sequence, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let times = count.as_index().unwrap_or(0).max(0) as usize;
            repeat(sequence, times)
        }
        _ => Err(unsupported_operands(operator.symbol(), left, right)),
    }
}

fn repeat(sequence: &Value, times: usize) -> Result<Value, Exception> {
    match sequence {
        Value::Str(s) => {
            repeated_len(s.len(), times)?;
            Ok(Value::Str(s.repeat(times)))
        }
        Value::List(items) => {
            let items = items.borrow();
            let len = repeated_len(items.len(), times)?;
            Ok(Value::list(items.iter().cloned().cycle().take(len).collect()))
        }
        Value::Tuple(items) => {
            let len = repeated_len(items.len(), times)?;
            Ok(Value::tuple(items.iter().cloned().cycle().take(len).collect()))
        }
        other => Err(Exception::type_error(format!(
            "can't multiply sequence by non-int of type '{}'",
            other.type_name()
        ))),
    }
}

fn repeated_len(len: usize, times: usize) -> Result<usize, Exception> {
    match len.checked_mul(times) {
        None => Err(Exception::new(
            ExceptionKind::OverflowError,
            "repeated sequence is too long",
        )),
        Some(total) if total > MAX_SEQUENCE_LEN => Err(Exception::memory()),
        Some(total) => Ok(total),
    }
}

fn unsupported_operands(symbol: &str, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        left.type_name(),
        right.type_name()
    ))
}

/// `<<` and `>>` on ints. Right shifts floor, like Python's.
fn shift(operator: BinaryOperator, a: i64, count: i64) -> Result<Value, Exception> {
    if count < 0 {
        return Err(Exception::value_error("negative shift count"));
    }
    let shifted = match operator {
        BinaryOperator::LeftShift if a == 0 => 0,
        BinaryOperator::LeftShift => {
            if count >= 64 {
                return Err(Exception::overflow());
            }
            i64::try_from(i128::from(a) << count).map_err(|_| Exception::overflow())?
        }
        _ => a >> count.min(63),
    };
    Ok(Value::Int(shifted))
}

fn arithmetic(operator: BinaryOperator, a: Number, b: Number) -> Result<Value, Exception> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_arithmetic(operator, a, b),
        (a, b) => float_arithmetic(operator, a.to_f64(), b.to_f64()),
    }
}

fn int_arithmetic(operator: BinaryOperator, a: i64, b: i64) -> Result<Value, Exception> {
    let checked = |result: Option<i64>| result.map(Value::Int).ok_or_else(Exception::overflow);
    match operator {
        BinaryOperator::Addition => checked(a.checked_add(b)),
        BinaryOperator::Subtraction => checked(a.checked_sub(b)),
        BinaryOperator::Multiplication => checked(a.checked_mul(b)),
        BinaryOperator::Division => {
            if b == 0 {
                return Err(Exception::zero_division("division by zero"));
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinaryOperator::FloorDivision => {
            if b == 0 {
                return Err(Exception::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            let quotient = a.checked_div(b).ok_or_else(Exception::overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::Int(quotient - 1))
            } else {
                Ok(Value::Int(quotient))
            }
        }
        BinaryOperator::Modulo => {
            if b == 0 {
                return Err(Exception::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            let remainder = a.checked_rem(b).unwrap_or(0);
            if remainder != 0 && ((remainder < 0) != (b < 0)) {
                Ok(Value::Int(remainder + b))
            } else {
                Ok(Value::Int(remainder))
            }
        }
        BinaryOperator::Power => {
            if b < 0 {
                if a == 0 {
                    return Err(Exception::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exponent = u32::try_from(b).map_err(|_| Exception::overflow())?;
            checked(a.checked_pow(exponent))
        }
        BinaryOperator::LeftShift | BinaryOperator::RightShift => shift(operator, a, b),
    }
}

fn float_arithmetic(operator: BinaryOperator, a: f64, b: f64) -> Result<Value, Exception> {
    let value = match operator {
        BinaryOperator::Addition => a + b,
        BinaryOperator::Subtraction => a - b,
        BinaryOperator::Multiplication => a * b,
        BinaryOperator::Division => {
            if b == 0.0 {
                return Err(Exception::zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOperator::FloorDivision => {
            if b == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOperator::Modulo => {
            if b == 0.0 {
                return Err(Exception::zero_division("float modulo"));
            }
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOperator::Power => {
            if a == 0.0 && b < 0.0 {
                return Err(Exception::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(Exception::value_error("math domain error"));
            }
            a.powf(b)
        }
        BinaryOperator::LeftShift | BinaryOperator::RightShift => {
            return Err(Exception::type_error(format!(
                "unsupported operand type(s) for {}: 'float'",
                operator.symbol()
            )));
        }
    };
    Ok(Value::Float(value))
}

/// Order two values, failing for types without an ordering.
pub fn order(left: &Value, right: &Value, symbol: &str) -> Result<Ordering, Exception> {
    match left.partial_cmp_value(right) {
        Some(ordering) => Ok(ordering),
        // NaN compares false against everything but is still a number.
        None if left.as_number().is_some() && right.as_number().is_some() => Ok(Ordering::Equal),
        None => Err(Exception::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            left.type_name(),
            right.type_name()
        ))),
    }
}

pub fn compare(operator: CompareOperator, left: &Value, right: &Value) -> Result<bool, Exception> {
    let nan = |v: &Value| matches!(v, Value::Float(f) if f.is_nan());
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool, Exception> {
        let ordering = order(left, right, operator.symbol())?;
        Ok(!nan(left) && !nan(right) && accept(ordering))
    };

    match operator {
        CompareOperator::Equal => Ok(left.python_eq(right)),
        CompareOperator::NotEqual => Ok(!left.python_eq(right)),
        CompareOperator::Less => ordered(|o| o == Ordering::Less),
        CompareOperator::LessEqual => ordered(|o| o != Ordering::Greater),
        CompareOperator::Greater => ordered(|o| o == Ordering::Greater),
        CompareOperator::GreaterEqual => ordered(|o| o != Ordering::Less),
        CompareOperator::In => contains(right, left),
        CompareOperator::NotIn => contains(right, left).map(|found| !found),
        CompareOperator::Is => Ok(left.is_same(right)),
        CompareOperator::IsNot => Ok(!left.is_same(right)),
    }
}

/// `needle in container`.
pub fn contains(container: &Value, needle: &Value) -> Result<bool, Exception> {
    match container {
        Value::Str(haystack) => match needle {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|item| item.python_eq(needle))),
        Value::Tuple(items) => Ok(items.iter().any(|item| item.python_eq(needle))),
        Value::Dict(dict) => {
            needle.check_hashable()?;
            Ok(dict.borrow().contains_key(needle))
        }
        Value::Range { start, stop, step } => Ok(match needle.as_number() {
            Some(Number::Int(n)) => {
                let offset = n as i128 - *start as i128;
                let index = offset / *step as i128;
                offset % *step as i128 == 0
                    && index >= 0
                    && index < range_len(*start, *stop, *step)
            }
            _ => container.iterate()?.iter().any(|item| item.python_eq(needle)),
        }),
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Subscripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SliceBounds {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceBounds {
    /// The positions selected from a sequence of `len` items.
    pub fn indices(self, len: usize) -> Result<Vec<usize>, Exception> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(Exception::value_error("slice step cannot be zero"));
        }
        let len = len as i64;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |bound: i64| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step < 0 { upper } else { lower });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step < 0 { lower } else { upper });

        let mut indices = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            indices.push(i as usize);
            i += step;
        }
        Ok(indices)
    }
}

/// Resolve a possibly negative index against a sequence length.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn index_type_error(container: &Value, key: &Value) -> Exception {
    Exception::type_error(format!(
        "{} indices must be integers or slices, not {}",
        container.type_name(),
        key.type_name()
    ))
}

fn index_out_of_range(container: &Value) -> Exception {
    let noun = match container {
        Value::Str(_) => "string",
        Value::Range { .. } => "range object",
        other => other.type_name(),
    };
    Exception::index_error(format!("{} index out of range", noun))
}

fn sequence_index(container: &Value, key: &Value, len: usize) -> Result<usize, Exception> {
    let index = key
        .as_index()
        .ok_or_else(|| index_type_error(container, key))?;
    normalize_index(index, len).ok_or_else(|| index_out_of_range(container))
}

pub fn get_item(container: &Value, key: &Value) -> Result<Value, Exception> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let index = sequence_index(container, key, items.len())?;
            Ok(items[index].clone())
        }
        Value::Tuple(items) => {
            let index = sequence_index(container, key, items.len())?;
            Ok(items[index].clone())
        }
        Value::Str(s) => {
            let len = s.chars().count();
            let index = sequence_index(container, key, len)?;
            Ok(s.chars()
                .nth(index)
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or(Value::None))
        }
        Value::Range { start, stop, step } => {
            // Ranges can be longer than any i64 index, so resolve in i128.
            let len = range_len(*start, *stop, *step);
            let index = key
                .as_index()
                .map(i128::from)
                .ok_or_else(|| index_type_error(container, key))?;
            let resolved = if index < 0 { index + len } else { index };
            if !(0..len).contains(&resolved) {
                return Err(index_out_of_range(container));
            }
            Ok(Value::Int(range_item(*start, *step, resolved)))
        }
        Value::Dict(dict) => {
            key.check_hashable()?;
            dict.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| Exception::key_error(key.repr()))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn get_slice(container: &Value, bounds: SliceBounds) -> Result<Value, Exception> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let indices = bounds.indices(items.len())?;
            Ok(Value::list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let indices = bounds.indices(items.len())?;
            Ok(Value::tuple(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let indices = bounds.indices(chars.len())?;
            Ok(Value::Str(indices.into_iter().map(|i| chars[i]).collect()))
        }
        Value::Range { .. } => {
            let items = container.iterate()?;
            let indices = bounds.indices(items.len())?;
            Ok(Value::list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn item_assignment_error(container: &Value) -> Exception {
    Exception::type_error(format!(
        "'{}' object does not support item assignment",
        container.type_name()
    ))
}

pub fn set_item(container: &Value, key: Value, value: Value) -> Result<(), Exception> {
    match container {
        Value::List(items) => {
            let len = items.borrow().len();
            let index = sequence_index(container, &key, len).map_err(|e| {
                if e.kind == ExceptionKind::IndexError {
                    Exception::index_error("list assignment index out of range")
                } else {
                    e
                }
            })?;
            items.borrow_mut()[index] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(key, value),
        other => Err(item_assignment_error(other)),
    }
}

pub fn set_slice(container: &Value, bounds: SliceBounds, value: Value) -> Result<(), Exception> {
    let Value::List(items) = container else {
        return Err(item_assignment_error(container));
    };
    let replacement = value.iterate()?;
    let len = items.borrow().len();
    let indices = bounds.indices(len)?;

    if bounds.step.unwrap_or(1) == 1 {
        let start = match bounds.start {
            Some(start) if start < 0 => (start + len as i64).max(0) as usize,
            Some(start) => (start as usize).min(len),
            None => 0,
        };
        let end = indices.last().map(|last| last + 1).unwrap_or(start).max(start);
        items.borrow_mut().splice(start..end, replacement);
        return Ok(());
    }

    if indices.len() != replacement.len() {
        return Err(Exception::value_error(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            indices.len()
        )));
    }
    let mut items = items.borrow_mut();
    for (index, item) in indices.into_iter().zip(replacement) {
        items[index] = item;
    }
    Ok(())
}

pub fn delete_item(container: &Value, key: &Value) -> Result<(), Exception> {
    match container {
        Value::List(items) => {
            let len = items.borrow().len();
            let index = sequence_index(container, key, len).map_err(|e| {
                if e.kind == ExceptionKind::IndexError {
                    Exception::index_error("list assignment index out of range")
                } else {
                    e
                }
            })?;
            items.borrow_mut().remove(index);
            Ok(())
        }
        Value::Dict(dict) => {
            key.check_hashable()?;
            dict.borrow_mut()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| Exception::key_error(key.repr()))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

pub fn delete_slice(container: &Value, bounds: SliceBounds) -> Result<(), Exception> {
    let Value::List(items) = container else {
        return Err(Exception::type_error(format!(
            "'{}' object doesn't support item deletion",
            container.type_name()
        )));
    };
    let len = items.borrow().len();
    let mut indices = bounds.indices(len)?;
    indices.sort_unstable();
    let mut items = items.borrow_mut();
    for index in indices.into_iter().rev() {
        items.remove(index);
    }
    Ok(())
}
