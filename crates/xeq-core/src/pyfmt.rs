//! Python-compatible textual forms for numbers and strings.
//!
//! Mutated snippets and debug records are compared against corpora produced by
//! Python tooling, so floats must render the way `repr(float)` does and
//! integral values the way `str(int(x))` does.

use std::fmt::Write as _;

use num_complex::Complex64;

/// `repr(x)` for a Python float: shortest round-trip digits, fixed notation
/// for decimal exponents in `-4 < e <= 16`, scientific otherwise.
#[must_use]
pub fn float_repr(value: f64) -> String {
    repr_with_mode(value, true)
}

/// Shortest repr of a single-precision value, as numpy prints `float32`.
#[must_use]
pub fn float32_repr(value: f32) -> String {
    if !value.is_finite() || value == 0.0 {
        return repr_with_mode(f64::from(value), true);
    }
    layout_scientific(&format!("{value:e}"), true)
}

/// `str(int(x))` for an integral, finite float. Negative zero renders as `0`.
#[must_use]
pub fn integral_repr(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value:.0}")
}

#[must_use]
pub fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

/// `repr(complex)`: the real part is omitted when it is `+0.0`, and neither
/// part gets a trailing `.0`.
#[must_use]
pub fn complex_repr(value: Complex64) -> String {
    let imag = repr_with_mode(value.im, false);
    let imag_sign = if imag.starts_with('-') { "" } else { "+" };
    if value.re == 0.0 && value.re.is_sign_positive() {
        return format!("{imag}j");
    }
    format!(
        "({}{imag_sign}{imag}j)",
        repr_with_mode(value.re, false)
    )
}

/// `repr(str)`: single quotes unless the text contains a single quote and no
/// double quote.
#[must_use]
pub fn str_repr(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Parses a float the way Python's `float(text)` does: surrounding
/// whitespace, an optional sign, `nan`/`inf`/`infinity` in any case, and
/// single underscores between digits.
#[must_use]
pub fn parse_python_float(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let lowered = unsigned.to_ascii_lowercase();
    let special = match lowered.as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "infinity" => Some(f64::INFINITY),
        _ => None,
    };
    if let Some(value) = special {
        return Some(if negative { -value } else { value });
    }

    if !unsigned
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-' | '_'))
    {
        return None;
    }
    let digits = strip_digit_separators(unsigned)?;
    let value = digits.parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}

fn strip_digit_separators(text: &str) -> Option<String> {
    if !text.contains('_') {
        return Some(text.to_string());
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    for (index, byte) in bytes.iter().enumerate() {
        if *byte == b'_' {
            let before = index
                .checked_sub(1)
                .and_then(|prev| bytes.get(prev))
                .is_some_and(u8::is_ascii_digit);
            let after = bytes.get(index + 1).is_some_and(u8::is_ascii_digit);
            if !(before && after) {
                return None;
            }
            continue;
        }
        out.push(char::from(*byte));
    }
    Some(out)
}

fn repr_with_mode(value: f64, add_dot_zero: bool) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        let body = if add_dot_zero { "0.0" } else { "0" };
        return if value.is_sign_negative() {
            format!("-{body}")
        } else {
            body.to_string()
        };
    }

    layout_scientific(&format!("{value:e}"), add_dot_zero)
}

/// Lays out Rust's shortest `{:e}` digits the way Python's repr does.
fn layout_scientific(scientific: &str, add_dot_zero: bool) -> String {
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific, 0),
    };
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let decimal_point = exponent + 1;

    let mut out = String::with_capacity(digits.len() + 8);
    if negative {
        out.push('-');
    }
    if !(-3..=16).contains(&decimal_point) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
    } else if decimal_point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', decimal_point.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let point = decimal_point as usize;
        if point >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat_n('0', point - digits.len()));
            if add_dot_zero {
                out.push_str(".0");
            }
        } else {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
    out
}
