use std::cell::RefCell;
use std::rc::Rc;

use crate::builtins::{expect_arguments, reject_keywords, sort_values, update_dict};
use crate::error::Exception;
use crate::executor::Interpreter;
use crate::format::format_template;
use crate::runtime_value::{Dict, Value};

const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
    "find",
    "count",
    "title",
    "format",
];

const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "reverse", "sort", "copy",
    "clear",
];

const DICT_METHODS: &[&str] = &[
    "get",
    "keys",
    "values",
    "items",
    "pop",
    "update",
    "setdefault",
    "copy",
    "clear",
];

/// `receiver.name`: only methods are exposed as attributes.
pub fn attribute(receiver: Value, name: &str) -> Result<Value, Exception> {
    let methods = match &receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => &[],
    };
    if methods.contains(&name) {
        Ok(Value::Method {
            receiver: Box::new(receiver),
            name: name.to_string(),
        })
    } else {
        Err(Exception::attribute_error(receiver.type_name(), name))
    }
}

/// Call a bound method.
pub fn call(
    interpreter: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    match receiver {
        Value::Str(s) => str_method(s, name, arguments, keywords),
        Value::List(items) => list_method(interpreter, items, name, arguments, keywords),
        Value::Dict(dict) => dict_method(dict, name, arguments, keywords),
        other => Err(Exception::attribute_error(other.type_name(), name)),
    }
}

fn str_argument<'v>(method: &str, value: &'v Value) -> Result<&'v str, Exception> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Exception::type_error(format!(
            "{}() argument must be str, not {}",
            method,
            other.type_name()
        ))),
    }
}

fn optional_index(value: Option<&Value>, default: i64) -> Result<i64, Exception> {
    match value {
        None => Ok(default),
        Some(value) => value.as_index().ok_or_else(|| {
            Exception::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        }),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(c);
            previous_cased = false;
        }
    }
    out
}

fn split_whitespace(s: &str, max_splits: i64) -> Vec<Value> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if max_splits >= 0 && parts.len() as i64 == max_splits {
            parts.push(Value::str(rest));
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(Value::str(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(Value::str(rest));
                break;
            }
        }
    }
    parts
}

fn str_method(
    s: &str,
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let qualified = format!("str.{}", name);
    if !matches!(name, "split" | "format") {
        reject_keywords(&qualified, &keywords)?;
    }

    match name {
        "upper" | "lower" | "title" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            Ok(Value::Str(match name {
                "upper" => s.to_uppercase(),
                "lower" => s.to_lowercase(),
                _ => title_case(s),
            }))
        }

        "strip" | "lstrip" | "rstrip" => {
            expect_arguments(&qualified, &arguments, 0, 1)?;
            let chars: Option<Vec<char>> = match arguments.first() {
                None | Some(Value::None) => None,
                Some(value) => Some(str_argument(name, value)?.chars().collect()),
            };
            let strip = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::str(match name {
                "strip" => s.trim_matches(strip),
                "lstrip" => s.trim_start_matches(strip),
                _ => s.trim_end_matches(strip),
            }))
        }

        "split" => {
            expect_arguments(&qualified, &arguments, 0, 2)?;
            let mut separator = arguments.first().cloned();
            let mut max_splits = arguments.get(1).cloned();
            for (key, value) in keywords {
                match key.as_str() {
                    "sep" => separator = Some(value),
                    "maxsplit" => max_splits = Some(value),
                    other => {
                        return Err(Exception::type_error(format!(
                            "split() got an unexpected keyword argument '{}'",
                            other
                        )));
                    }
                }
            }
            let max_splits = optional_index(max_splits.as_ref(), -1)?;
            let parts = match separator {
                None | Some(Value::None) => split_whitespace(s, max_splits),
                Some(separator) => {
                    let separator = str_argument(name, &separator)?;
                    if separator.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    if max_splits < 0 {
                        s.split(separator).map(Value::str).collect()
                    } else {
                        s.splitn(max_splits as usize + 1, separator)
                            .map(Value::str)
                            .collect()
                    }
                }
            };
            Ok(Value::list(parts))
        }

        "join" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let mut pieces = Vec::new();
            for (index, item) in arguments[0].iterate()?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            index,
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(pieces.join(s)))
        }

        "replace" => {
            expect_arguments(&qualified, &arguments, 2, 3)?;
            let old = str_argument(name, &arguments[0])?;
            let new = str_argument(name, &arguments[1])?;
            let count = optional_index(arguments.get(2), -1)?;
            Ok(Value::Str(if count < 0 {
                s.replace(old, new)
            } else {
                s.replacen(old, new, count as usize)
            }))
        }

        "startswith" | "endswith" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let candidates = match &arguments[0] {
                Value::Tuple(items) => items.as_ref().clone(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let affix = str_argument(name, candidate)?;
                let found = if name == "startswith" {
                    s.starts_with(affix)
                } else {
                    s.ends_with(affix)
                };
                if found {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }

        "find" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let needle = str_argument(name, &arguments[0])?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }

        "count" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let needle = str_argument(name, &arguments[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }

        "format" => format_template(s, &arguments, &keywords).map(Value::Str),

        _ => Err(Exception::attribute_error("str", name)),
    }
}

fn list_method(
    interpreter: &mut Interpreter<'_>,
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let qualified = format!("list.{}", name);
    if name != "sort" {
        reject_keywords(&qualified, &keywords)?;
    }

    match name {
        "append" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            items.borrow_mut().extend(arguments);
            Ok(Value::None)
        }

        "extend" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let extra = arguments[0].iterate()?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }

        "insert" => {
            expect_arguments(&qualified, &arguments, 2, 2)?;
            let len = items.borrow().len() as i64;
            let index = optional_index(arguments.first(), 0)?;
            let index = if index < 0 {
                (index + len).max(0)
            } else {
                index.min(len)
            };
            items.borrow_mut().insert(index as usize, arguments[1].clone());
            Ok(Value::None)
        }

        "pop" => {
            expect_arguments(&qualified, &arguments, 0, 1)?;
            let len = items.borrow().len() as i64;
            if len == 0 {
                return Err(Exception::index_error("pop from empty list"));
            }
            let index = optional_index(arguments.first(), -1)?;
            let resolved = if index < 0 { index + len } else { index };
            if !(0..len).contains(&resolved) {
                return Err(Exception::index_error("pop index out of range"));
            }
            Ok(items.borrow_mut().remove(resolved as usize))
        }

        "remove" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let position = items
                .borrow()
                .iter()
                .position(|item| item.python_eq(&arguments[0]));
            match position {
                Some(position) => {
                    items.borrow_mut().remove(position);
                    Ok(Value::None)
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }

        "index" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let position = items
                .borrow()
                .iter()
                .position(|item| item.python_eq(&arguments[0]));
            position
                .map(|p| Value::Int(p as i64))
                .ok_or_else(|| {
                    Exception::value_error(format!("{} is not in list", arguments[0].repr()))
                })
        }

        "count" => {
            expect_arguments(&qualified, &arguments, 1, 1)?;
            let count = items
                .borrow()
                .iter()
                .filter(|item| item.python_eq(&arguments[0]))
                .count();
            Ok(Value::Int(count as i64))
        }

        "reverse" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }

        "sort" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            let mut key = None;
            let mut reverse = false;
            for (keyword, value) in keywords {
                match keyword.as_str() {
                    "key" => key = Some(value),
                    "reverse" => reverse = value.is_truthy(),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sort() got an unexpected keyword argument '{}'",
                            other
                        )));
                    }
                }
            }
            let mut sorted = items.borrow().clone();
            sort_values(interpreter, &mut sorted, key.as_ref(), reverse)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }

        "copy" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            Ok(Value::list(items.borrow().clone()))
        }

        "clear" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }

        _ => Err(Exception::attribute_error("list", name)),
    }
}

fn dict_method(
    dict: &Rc<RefCell<Dict>>,
    name: &str,
    arguments: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Value, Exception> {
    let qualified = format!("dict.{}", name);
    if name != "update" {
        reject_keywords(&qualified, &keywords)?;
    }

    match name {
        "get" => {
            expect_arguments(&qualified, &arguments, 1, 2)?;
            arguments[0].check_hashable()?;
            let found = dict.borrow().get(&arguments[0]).cloned();
            Ok(found.unwrap_or_else(|| arguments.get(1).cloned().unwrap_or(Value::None)))
        }

        "keys" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            Ok(Value::list(dict.borrow().keys().cloned().collect()))
        }

        "values" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }

        "items" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            let pairs = dict
                .borrow()
                .entries()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(pairs))
        }

        "pop" => {
            expect_arguments(&qualified, &arguments, 1, 2)?;
            arguments[0].check_hashable()?;
            let removed = dict.borrow_mut().remove(&arguments[0]);
            match (removed, arguments.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Exception::key_error(arguments[0].repr())),
            }
        }

        "update" => {
            expect_arguments(&qualified, &arguments, 0, 1)?;
            // Collect first: the source may be this same dict.
            let mut incoming = Dict::new();
            if let Some(source) = arguments.first() {
                update_dict(&mut incoming, source)?;
            }
            for (key, value) in keywords {
                incoming.insert(Value::Str(key), value)?;
            }
            let mut dict = dict.borrow_mut();
            for (key, value) in incoming.entries() {
                dict.insert(key.clone(), value.clone())?;
            }
            Ok(Value::None)
        }

        "setdefault" => {
            expect_arguments(&qualified, &arguments, 1, 2)?;
            let existing = {
                arguments[0].check_hashable()?;
                dict.borrow().get(&arguments[0]).cloned()
            };
            match existing {
                Some(value) => Ok(value),
                None => {
                    let default = arguments.get(1).cloned().unwrap_or(Value::None);
                    dict.borrow_mut()
                        .insert(arguments[0].clone(), default.clone())?;
                    Ok(default)
                }
            }
        }

        "copy" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            Ok(Value::dict(dict.borrow().clone()))
        }

        "clear" => {
            expect_arguments(&qualified, &arguments, 0, 0)?;
            *dict.borrow_mut() = Dict::new();
            Ok(Value::None)
        }

        _ => Err(Exception::attribute_error("dict", name)),
    }
}
