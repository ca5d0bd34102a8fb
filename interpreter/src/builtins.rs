use std::cmp::Ordering;

use crate::ast::BinaryOperator;
use crate::error::{Exception, ExceptionKind};
use crate::evaluator::{binary_op, order};
use crate::executor::Interpreter;
use crate::runtime_value::{Dict, Value, range_len, string_repr};

const FUNCTIONS: &[&str] = &[
    "print",
    "len",
    "repr",
    "abs",
    "min",
    "max",
    "sum",
    "sorted",
    "reversed",
    "enumerate",
    "zip",
    "round",
    "isinstance",
    "format",
];

const TYPES: &[&str] = &["str", "int", "float", "bool", "list", "tuple", "dict", "range", "type"];

/// Resolve a name that is not bound in any scope.
pub fn lookup(name: &str) -> Option<Value> {
    if let Some(function) = FUNCTIONS.iter().find(|f| **f == name) {
        return Some(Value::Builtin(function));
    }
    if let Some(type_name) = TYPES.iter().find(|t| **t == name) {
        return Some(Value::Type(type_name));
    }
    ExceptionKind::from_name(name).map(Value::ExceptionType)
}

pub fn reject_keywords(name: &str, keywords: &[(String, Value)]) -> Result<(), Exception> {
    if keywords.is_empty() {
        Ok(())
    } else {
        Err(Exception::type_error(format!(
            "{}() takes no keyword arguments",
            name
        )))
    }
}

/// Check the positional argument count against `min..=max`.
pub fn expect_arguments(
    name: &str,
    arguments: &[Value],
    min: usize,
    max: usize,
) -> Result<(), Exception> {
    let given = arguments.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let plural = |n: usize| if n == 1 { "" } else { "s" };
    let message = if min == max {
        format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            min,
            plural(min),
            given
        )
    } else if given < min {
        format!(
            "{}() takes at least {} argument{} ({} given)",
            name,
            min,
            plural(min),
            given
        )
    } else {
        format!(
            "{}() takes at most {} argument{} ({} given)",
            name,
            max,
            plural(max),
            given
        )
    };
    Err(Exception::type_error(message))
}

/// Reject keyword arguments whose names are not in `allowed`.
fn keyword_arguments(
    function: &str,
    keywords: Vec<(String, Value)>,
    allowed: &[&str],
) -> Result<Vec<(String, Value)>, Exception> {
    for (name, _) in &keywords {
        if !allowed.contains(&name.as_str()) {
            return Err(Exception::type_error(format!(
                "'{}' is an invalid keyword argument for {}()",
                name, function
            )));
        }
    }
    Ok(keywords)
}

fn keyword(keywords: &[(String, Value)], name: &str) -> Option<Value> {
    keywords
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Build an exception instance from constructor arguments.
pub fn new_exception(kind: ExceptionKind, arguments: &[Value]) -> Exception {
    let message = match arguments {
        [] => String::new(),
        // KeyError shows its key through repr.
        [key] if kind == ExceptionKind::KeyError => key.repr(),
        [single] => single.to_str(),
        many => Value::tuple(many.to_vec()).repr(),
    };
    Exception::new(kind, message)
}

fn integer_argument(value: &Value) -> Result<i64, Exception> {
    value.as_index().ok_or_else(|| {
        Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/// Call a builtin function.
pub fn call(
    interpreter: &mut Interpreter<'_>,
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    match name {
        "print" => {
            let keywords = keyword_arguments(name, keywords, &["sep", "end", "flush"])?;
            let text_option = |key: &str, default: &str| match keyword(&keywords, key) {
                None | Some(Value::None) => Ok(default.to_string()),
                Some(Value::Str(s)) => Ok(s),
                Some(other) => Err(Exception::type_error(format!(
                    "{} must be None or a string, not {}",
                    key,
                    other.type_name()
                ))),
            };
            let sep = text_option("sep", " ")?;
            let end = text_option("end", "\n")?;
            let line = arguments
                .iter()
                .map(Value::to_str)
                .collect::<Vec<_>>()
                .join(&sep);
            write!(interpreter.output, "{}{}", line, end).map_err(Exception::io)?;
            Ok(Value::None)
        }

        "len" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 1)?;
            let len = match &arguments[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.borrow().len(),
                Value::Tuple(items) => items.len(),
                Value::Dict(dict) => dict.borrow().len(),
                Value::Range { start, stop, step } => {
                    usize::try_from(range_len(*start, *stop, *step))
                        .ok()
                        .filter(|len| i64::try_from(*len).is_ok())
                        .ok_or_else(|| {
                            Exception::new(
                                ExceptionKind::OverflowError,
                                "Python int too large to convert to C ssize_t",
                            )
                        })?
                }
                other => {
                    return Err(Exception::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(len as i64))
        }

        "repr" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 1)?;
            Ok(Value::Str(arguments[0].repr()))
        }

        "format" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 2)?;
            let spec = match arguments.get(1) {
                None => String::new(),
                Some(Value::Str(spec)) => spec.clone(),
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "format() argument 2 must be str, not {}",
                        other.type_name()
                    )));
                }
            };
            crate::format::format_value(&arguments[0], &spec).map(Value::Str)
        }

        "abs" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 1)?;
            match &arguments[0] {
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(Exception::overflow),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(Exception::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }

        "min" | "max" => {
            let keywords = keyword_arguments(name, keywords, &["key", "default"])?;
            if arguments.is_empty() {
                return Err(Exception::type_error(format!(
                    "{} expected at least 1 argument, got 0",
                    name
                )));
            }
            let candidates = if arguments.len() == 1 {
                arguments[0].iterate()?
            } else {
                arguments
            };
            let key = keyword(&keywords, "key").filter(|k| !matches!(k, Value::None));
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };

            let mut best: Option<(Value, Value)> = None;
            for candidate in candidates {
                let rank = match &key {
                    Some(key) => interpreter.call_value(key, vec![candidate.clone()], Vec::new())?,
                    None => candidate.clone(),
                };
                let replace = match &best {
                    None => true,
                    Some((best_rank, _)) => {
                        let symbol = if name == "min" { "<" } else { ">" };
                        order(&rank, best_rank, symbol)? == wanted
                    }
                };
                if replace {
                    best = Some((rank, candidate));
                }
            }
            match best {
                Some((_, value)) => Ok(value),
                None => keyword(&keywords, "default").ok_or_else(|| {
                    Exception::value_error(format!("{}() arg is an empty sequence", name))
                }),
            }
        }

        "sum" => {
            let keywords = keyword_arguments(name, keywords, &["start"])?;
            expect_arguments(name, &arguments, 1, 2)?;
            let mut total = arguments
                .get(1)
                .cloned()
                .or_else(|| keyword(&keywords, "start"))
                .unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(Exception::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in arguments[0].iterate()? {
                total = binary_op(BinaryOperator::Addition, &total, &item)?;
            }
            Ok(total)
        }

        "sorted" => {
            let keywords = keyword_arguments(name, keywords, &["key", "reverse"])?;
            expect_arguments(name, &arguments, 1, 1)?;
            let mut items = arguments[0].iterate()?;
            let key = keyword(&keywords, "key");
            let reverse = keyword(&keywords, "reverse").is_some_and(|r| r.is_truthy());
            sort_values(interpreter, &mut items, key.as_ref(), reverse)?;
            Ok(Value::list(items))
        }

        "reversed" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 1)?;
            let mut items = arguments[0].iterate()?;
            items.reverse();
            Ok(Value::list(items))
        }

        "enumerate" => {
            let keywords = keyword_arguments(name, keywords, &["start"])?;
            expect_arguments(name, &arguments, 1, 2)?;
            let start = match arguments.get(1).cloned().or_else(|| keyword(&keywords, "start")) {
                Some(start) => integer_argument(&start)?,
                None => 0,
            };
            let items = arguments[0].iterate()?;
            let mut pairs = Vec::with_capacity(items.len());
            for (offset, item) in items.into_iter().enumerate() {
                let index = start
                    .checked_add(offset as i64)
                    .ok_or_else(Exception::overflow)?;
                pairs.push(Value::tuple(vec![Value::Int(index), item]));
            }
            Ok(Value::list(pairs))
        }

        "zip" => {
            reject_keywords(name, &keywords)?;
            let columns = arguments
                .iter()
                .map(Value::iterate)
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            let rows = (0..len)
                .map(|i| Value::tuple(columns.iter().map(|column| column[i].clone()).collect()))
                .collect();
            Ok(Value::list(rows))
        }

        "round" => {
            let keywords = keyword_arguments(name, keywords, &["ndigits"])?;
            expect_arguments(name, &arguments, 1, 2)?;
            let digits = match arguments.get(1).cloned().or_else(|| keyword(&keywords, "ndigits")) {
                None | Some(Value::None) => None,
                Some(digits) => Some(integer_argument(&digits)?),
            };
            round(&arguments[0], digits)
        }

        "isinstance" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 2, 2)?;
            is_instance(&arguments[0], &arguments[1]).map(Value::Bool)
        }

        _ => Err(Exception::name_error(name)),
    }
}

/// An integral float as an int. Anything outside `i64` is an `OverflowError`.
fn float_to_int(f: f64) -> Result<i64, Exception> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        Err(Exception::value_error("cannot convert float NaN to integer"))
    } else if f.is_infinite() {
        Err(Exception::new(
            ExceptionKind::OverflowError,
            "cannot convert float infinity to integer",
        ))
    } else if !(-LIMIT..LIMIT).contains(&f) {
        Err(Exception::overflow())
    } else {
        Ok(f as i64)
    }
}

fn round(value: &Value, digits: Option<i64>) -> Result<Value, Exception> {
    match (value, digits) {
        (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(value.as_index().unwrap_or(0))),
        (Value::Int(n), Some(digits)) if digits < 0 => {
            let factor = 10i64
                .checked_pow(digits.unsigned_abs() as u32)
                .ok_or_else(Exception::overflow)?;
            let rounded = (*n as f64 / factor as f64).round_ties_even() as i64;
            rounded.checked_mul(factor).map(Value::Int).ok_or_else(Exception::overflow)
        }
        (Value::Int(_) | Value::Bool(_), Some(_)) => Ok(Value::Int(value.as_index().unwrap_or(0))),
        (Value::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Value::Float(f), Some(digits)) => {
            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
            Ok(Value::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

fn is_instance(value: &Value, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Type(name) => Ok(value.type_name() == *name
            || (*name == "int" && matches!(value, Value::Bool(_)))),
        Value::ExceptionType(kind) => Ok(match value {
            Value::Exception(exception) => exception.kind.is_subclass_of(*kind),
            _ => false,
        }),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

/// Stable sort by an optional key function, as `sorted` and `list.sort` do.
pub fn sort_values(
    interpreter: &mut Interpreter<'_>,
    items: &mut Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> Result<(), Exception> {
    let keys = match key {
        Some(key) if !matches!(key, Value::None) => items
            .iter()
            .map(|item| interpreter.call_value(key, vec![item.clone()], Vec::new()))
            .collect::<Result<Vec<_>, _>>()?,
        _ => items.clone(),
    };

    let mut failure = None;
    let mut positions: Vec<usize> = (0..items.len()).collect();
    positions.sort_by(|&a, &b| {
        let (left, right) = if reverse {
            (&keys[b], &keys[a])
        } else {
            (&keys[a], &keys[b])
        };
        match order(left, right, "<") {
            Ok(ordering) => ordering,
            Err(exception) => {
                failure.get_or_insert(exception);
                Ordering::Equal
            }
        }
    });
    if let Some(exception) = failure {
        return Err(exception);
    }

    *items = positions.into_iter().map(|i| items[i].clone()).collect();
    Ok(())
}

/// Call a builtin type as a constructor: `int("3")`, `list(range(3))`, ...
pub fn construct(
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    match name {
        "int" => {
            let keywords = keyword_arguments(name, keywords, &["base"])?;
            expect_arguments(name, &arguments, 0, 2)?;
            let base = arguments.get(1).cloned().or_else(|| keyword(&keywords, "base"));
            match (arguments.first(), base) {
                (None, _) => Ok(Value::Int(0)),
                (Some(Value::Str(s)), base) => {
                    let base = match base {
                        Some(base) => integer_argument(&base)?,
                        None => 10,
                    };
                    parse_int(s, base).map(Value::Int)
                }
                (Some(_), Some(_)) => Err(Exception::type_error(
                    "int() can't convert non-string with explicit base",
                )),
                (Some(Value::Float(f)), None) => float_to_int(f.trunc()).map(Value::Int),
                (Some(value), None) => value.as_index().map(Value::Int).ok_or_else(|| {
                    Exception::type_error(format!(
                        "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                        value.type_name()
                    ))
                }),
            }
        }

        "float" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 0, 1)?;
            match arguments.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => parse_float(s).map(Value::Float),
                Some(value) => value
                    .as_number()
                    .map(|n| Value::Float(n.to_f64()))
                    .ok_or_else(|| {
                        Exception::type_error(format!(
                            "float() argument must be a string or a real number, not '{}'",
                            value.type_name()
                        ))
                    }),
            }
        }

        "str" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 0, 1)?;
            Ok(Value::Str(
                arguments.first().map(Value::to_str).unwrap_or_default(),
            ))
        }

        "bool" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 0, 1)?;
            Ok(Value::Bool(arguments.first().is_some_and(Value::is_truthy)))
        }

        "list" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 0, 1)?;
            match arguments.first() {
                None => Ok(Value::list(Vec::new())),
                Some(value) => Ok(Value::list(value.iterate()?)),
            }
        }

        "tuple" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 0, 1)?;
            match arguments.first() {
                None => Ok(Value::tuple(Vec::new())),
                Some(Value::Tuple(items)) => Ok(Value::Tuple(items.clone())),
                Some(value) => Ok(Value::tuple(value.iterate()?)),
            }
        }

        "dict" => {
            expect_arguments(name, &arguments, 0, 1)?;
            let mut dict = Dict::new();
            if let Some(source) = arguments.first() {
                update_dict(&mut dict, source)?;
            }
            for (key, value) in keywords {
                dict.insert(Value::Str(key), value)?;
            }
            Ok(Value::dict(dict))
        }

        "range" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 3)?;
            let bounds = arguments
                .iter()
                .map(integer_argument)
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => (0, 0, 1),
            };
            if step == 0 {
                return Err(Exception::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range { start, stop, step })
        }

        "type" => {
            reject_keywords(name, &keywords)?;
            expect_arguments(name, &arguments, 1, 1)?;
            Ok(type_of(&arguments[0]))
        }

        _ => Err(Exception::name_error(name)),
    }
}

fn type_of(value: &Value) -> Value {
    match value {
        Value::Exception(exception) => Value::ExceptionType(exception.kind),
        other => Value::Type(other.type_name()),
    }
}

/// Merge a mapping or an iterable of pairs into `dict`.
pub fn update_dict(dict: &mut Dict, source: &Value) -> Result<(), Exception> {
    if let Value::Dict(other) = source {
        for (key, value) in other.borrow().entries() {
            dict.insert(key.clone(), value.clone())?;
        }
        return Ok(());
    }
    for (index, item) in source.iterate()?.into_iter().enumerate() {
        let pair = item.iterate().map_err(|_| {
            Exception::type_error(format!(
                "cannot convert dictionary update sequence element #{} to a sequence",
                index
            ))
        })?;
        let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
            Exception::value_error(format!(
                "dictionary update sequence element #{} has length {}; 2 is required",
                index,
                pair.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(())
}

fn parse_int(text: &str, base: i64) -> Result<i64, Exception> {
    let invalid = || {
        Exception::value_error(format!(
            "invalid literal for int() with base {}: {}",
            base,
            string_repr(text)
        ))
    };
    if !(2..=36).contains(&base) && base != 0 {
        return Err(Exception::value_error("int() base must be >= 2 and <= 36, or 0"));
    }

    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &digits[2..]),
        (0 | 8, Some("0o")) => (8, &digits[2..]),
        (0 | 2, Some("0b")) => (2, &digits[2..]),
        (0, _) => (10, digits),
        (base, _) => (base as u32, digits),
    };

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i128::from_str_radix(&cleaned, radix).map_err(|_| invalid())?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| Exception::overflow())
}

fn parse_float(text: &str) -> Result<f64, Exception> {
    let trimmed = text.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let unsigned = lowered.trim_start_matches(['+', '-']);
    let special = matches!(unsigned, "inf" | "infinity" | "nan");
    let numeric = unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | '+' | '-' | '_'));
    if special || (numeric && !unsigned.is_empty()) {
        if let Ok(value) = lowered.replace('_', "").parse::<f64>() {
            return Ok(value);
        }
    }
    Err(Exception::value_error(format!(
        "could not convert string to float: {}",
        string_repr(text)
    )))
}
