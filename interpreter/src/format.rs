//! Format specs (`f"{x:>8.2f}"`, `format()`, `str.format`).

use crate::error::Exception;
use crate::runtime_value::{MAX_SEQUENCE_LEN, Value, float_repr};

/// A parsed `[[fill]align][sign][0][width][,|_][.precision][type]` spec.
#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Result<FormatSpec, Exception> {
    let chars: Vec<char> = spec.chars().collect();
    let invalid = || Exception::value_error("Invalid format specifier");
    let mut parsed = FormatSpec::default();
    let mut i = 0;

    let is_align = |c: Option<&char>| matches!(c, Some('<' | '>' | '^' | '='));
    if chars.len() >= 2 && is_align(chars.get(1)) {
        parsed.fill = Some(chars[0]);
        parsed.align = Some(chars[1]);
        i = 2;
    } else if is_align(chars.first()) {
        parsed.align = Some(chars[0]);
        i = 1;
    }

    if let Some(c @ ('+' | '-' | ' ')) = chars.get(i) {
        parsed.sign = Some(*c);
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        parsed.zero = true;
        i += 1;
    }

    let width_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > width_start {
        let digits: String = chars[width_start..i].iter().collect();
        parsed.width = digits.parse().map_err(|_| invalid())?;
    }

    if let Some(c @ (',' | '_')) = chars.get(i) {
        parsed.grouping = Some(*c);
        i += 1;
    }

    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err(Exception::value_error("Format specifier missing precision"));
        }
        let digits: String = chars[start..i].iter().collect();
        parsed.precision = Some(digits.parse().map_err(|_| invalid())?);
    }

    if let Some(c) = chars.get(i) {
        parsed.kind = Some(*c);
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid());
    }
    if parsed.width.max(parsed.precision.unwrap_or(0)) > MAX_SEQUENCE_LEN {
        return Err(Exception::memory());
    }
    Ok(parsed)
}

/// Python `format(value, spec)`.
pub fn format_value(value: &Value, spec: &str) -> Result<String, Exception> {
    if spec.is_empty() {
        return Ok(value.to_str());
    }
    let spec = parse_spec(spec)?;

    match value {
        Value::Str(s) => format_str(s, &spec),
        Value::Bool(b) if spec.kind.is_none() => {
            format_str(if *b { "True" } else { "False" }, &spec)
        }
        Value::Bool(b) => format_int(*b as i64, &spec),
        Value::Int(n) => format_int(*n, &spec),
        Value::Float(f) => format_float(*f, &spec),
        other if spec.kind.is_none() && spec.precision.is_none() && spec.sign.is_none() => {
            format_str(&other.to_str(), &spec)
        }
        other => Err(Exception::type_error(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        ))),
    }
}

fn unknown_code(kind: char, type_name: &str) -> Exception {
    Exception::value_error(format!(
        "Unknown format code '{}' for object of type '{}'",
        kind, type_name
    ))
}

fn format_str(s: &str, spec: &FormatSpec) -> Result<String, Exception> {
    if let Some(kind) = spec.kind.filter(|k| *k != 's') {
        return Err(unknown_code(kind, "str"));
    }
    if spec.sign.is_some() {
        return Err(Exception::value_error(
            "Sign not allowed in string format specifier",
        ));
    }
    let text: String = match spec.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    };
    Ok(pad(String::new(), text, spec, '<'))
}

fn format_int(n: i64, spec: &FormatSpec) -> Result<String, Exception> {
    let digits = match spec.kind {
        None | Some('d') | Some('n') => {
            if spec.precision.is_some() {
                return Err(Exception::value_error(
                    "Precision not allowed in integer format specifier",
                ));
            }
            group(&n.unsigned_abs().to_string(), spec.grouping)
        }
        Some('x') => format!("{:x}", n.unsigned_abs()),
        Some('X') => format!("{:X}", n.unsigned_abs()),
        Some('o') => format!("{:o}", n.unsigned_abs()),
        Some('b') => format!("{:b}", n.unsigned_abs()),
        Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%') => {
            return format_float(n as f64, spec);
        }
        Some(kind) => return Err(unknown_code(kind, "int")),
    };
    Ok(pad(sign_prefix(n < 0, spec), digits, spec, '>'))
}

fn format_float(f: f64, spec: &FormatSpec) -> Result<String, Exception> {
    let negative = f.is_sign_negative() && !f.is_nan();
    let magnitude = f.abs();

    let body = if !magnitude.is_finite() {
        let text = if magnitude.is_nan() { "nan" } else { "inf" };
        if matches!(spec.kind, Some('F' | 'E' | 'G')) {
            text.to_uppercase()
        } else {
            text.to_string()
        }
    } else {
        match spec.kind {
            None => match spec.precision {
                None => float_repr(magnitude),
                Some(p) => {
                    let text = general(magnitude, p);
                    if text.contains(['.', 'e']) {
                        text
                    } else {
                        format!("{}.0", text)
                    }
                }
            },
            Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
            Some('e') => scientific(magnitude, spec.precision.unwrap_or(6)),
            Some('E') => scientific(magnitude, spec.precision.unwrap_or(6)).to_uppercase(),
            Some('g') => general(magnitude, spec.precision.unwrap_or(6)),
            Some('G') => general(magnitude, spec.precision.unwrap_or(6)).to_uppercase(),
            Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
            Some(kind) => return Err(unknown_code(kind, "float")),
        }
    };

    let body = match spec.grouping {
        Some(separator) => match body.find(|c: char| !c.is_ascii_digit()) {
            Some(end) => format!("{}{}", group(&body[..end], Some(separator)), &body[end..]),
            None => group(&body, Some(separator)),
        },
        None => body,
    };
    Ok(pad(sign_prefix(negative, spec), body, spec, '>'))
}

/// `{:e}` with Python's two-digit signed exponent: `1.50e+03`.
fn scientific(f: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, f);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => text,
    }
}

/// The `g` presentation: fixed or scientific depending on the exponent,
/// trailing zeros removed.
fn general(f: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return "0".to_string();
    }
    let probe = format!("{:.*e}", precision - 1, f);
    let exponent: i32 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let text = scientific(f, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exponent)) => {
                format!("{}e{}", strip_fraction_zeros(mantissa), exponent)
            }
            None => text,
        }
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn strip_fraction_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn group(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_string();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn sign_prefix(negative: bool, spec: &FormatSpec) -> String {
    match (negative, spec.sign) {
        (true, _) => "-".to_string(),
        (false, Some('+')) => "+".to_string(),
        (false, Some(' ')) => " ".to_string(),
        _ => String::new(),
    }
}

fn pad(sign: String, body: String, spec: &FormatSpec, default_align: char) -> String {
    let (fill, align) = match (spec.fill, spec.align, spec.zero) {
        (fill, Some(align), _) => (fill.unwrap_or(' '), align),
        (_, None, true) => ('0', '='),
        (_, None, false) => (' ', default_align),
    };

    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return format!("{}{}", sign, body);
    }
    let padding = spec.width - len;
    let fill_str = |n: usize| fill.to_string().repeat(n);

    match align {
        '<' => format!("{}{}{}", sign, body, fill_str(padding)),
        '^' => format!(
            "{}{}{}{}",
            fill_str(padding / 2),
            sign,
            body,
            fill_str(padding - padding / 2)
        ),
        '=' => format!("{}{}{}", sign, fill_str(padding), body),
        _ => format!("{}{}{}", fill_str(padding), sign, body),
    }
}

/// `str.format(*args, **kwargs)` with `{}`, `{0}`, `{name}`, `!r`/`!s` and specs.
pub fn format_template(
    template: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<String, Exception> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut next_auto = 0usize;
    let mut manual = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                out.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                out.push('}');
                i += 2;
            }
            '}' => {
                return Err(Exception::value_error(
                    "Single '}' encountered in format string",
                ));
            }
            '{' => {
                let start = i + 1;
                let Some(offset) = chars[start..].iter().position(|c| *c == '}') else {
                    return Err(Exception::value_error(
                        "Single '{' encountered in format string",
                    ));
                };
                let field: String = chars[start..start + offset].iter().collect();
                i = start + offset + 1;

                let (field, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conversion)) => (name, Some(conversion)),
                    None => (field, None),
                };

                let value = if name.is_empty() {
                    if manual {
                        return Err(Exception::value_error(
                            "cannot switch from manual field specification to automatic field numbering",
                        ));
                    }
                    next_auto += 1;
                    positional(args, next_auto - 1)?
                } else if let Ok(index) = name.parse::<usize>() {
                    if next_auto > 0 {
                        return Err(Exception::value_error(
                            "cannot switch from automatic field numbering to manual field specification",
                        ));
                    }
                    manual = true;
                    positional(args, index)?
                } else {
                    kwargs
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| Exception::key_error(Value::str(name).repr()))?
                };

                let value = match conversion {
                    None => value,
                    Some("r") => Value::Str(value.repr()),
                    Some("s") => Value::Str(value.to_str()),
                    Some(other) => {
                        return Err(Exception::value_error(format!(
                            "Unknown conversion specifier {}",
                            other
                        )));
                    }
                };
                out.push_str(&format_value(&value, spec)?);
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn positional(args: &[Value], index: usize) -> Result<Value, Exception> {
    args.get(index).cloned().ok_or_else(|| {
        Exception::index_error(format!(
            "Replacement index {} out of range for positional args tuple",
            index
        ))
    })
}
