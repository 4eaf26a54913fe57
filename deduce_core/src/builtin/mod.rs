//! Built-in aliases every [`Registry::builtin`] registry starts with.
//!
//! All of them accept their own output unchanged, so converting twice is
//! the same as converting once.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Number, Value, json};

use crate::converter::{Converter, Equiv, Filter, Regex, render};
use crate::error::ValidationError;
use crate::registry::Registry;

/// Accepts `"{min}:{max}"`, `"{min}..{max}"` and `"{min}...{max}"`.
const RANGE_PATTERN: &str = r"(\d+)(?:\.{2,3}|:)(\d+)";

macro_rules! integers {
    ($registry:expr; $($ty:ty),+ $(,)?) => {
        $( $registry.record(stringify!($ty), integer::<$ty>(stringify!($ty))); )+
    };
}

macro_rules! floats {
    ($registry:expr; $($ty:ty),+ $(,)?) => {
        $( $registry.record(stringify!($ty), float(stringify!($ty), |x: f64| (x as $ty).is_finite())); )+
    };
}

pub(crate) fn seed(registry: &mut Registry) {
    integers!(registry; i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
    floats!(registry; f32, f64);

    let string = string();
    registry.record("String", string.clone());
    registry.record("str", string);
    registry.record("char", character());
    registry.record("decimal", decimal());

    registry.record(
        "bool",
        Equiv::new()
            .group(
                [json!(true), json!("true"), json!("True"), json!("yes"), json!("y"), json!("1")],
                true,
            )
            .group(
                [json!(false), json!("false"), json!("False"), json!("no"), json!("n"), json!("0")],
                false,
            ),
    );
    let none = Converter::from(
        Equiv::new().group([Value::Null, json!("null"), json!("none")], Value::Null),
    );
    registry.record("none", none.clone());
    registry.record("()", none);

    registry.record("bin", radix("bin", 2, "0b"));
    registry.record("oct", radix("oct", 8, "0o"));
    registry.record("hex", radix("hex", 16, "0x"));

    match span() {
        Ok(range) => registry.record("range", range),
        Err(err) => tracing::error!(%err, "invalid range pattern, 'range' alias not registered"),
    }

    registry.record("is_alphabetic", every("is_alphabetic", char::is_alphabetic));
    registry.record("is_alphanumeric", every("is_alphanumeric", char::is_alphanumeric));
    registry.record("is_numeric", every("is_numeric", char::is_numeric));
    registry.record("is_whitespace", every("is_whitespace", char::is_whitespace));
    registry.record("is_ascii", every("is_ascii", |c| c.is_ascii()));
    registry.record("is_ascii_digit", every("is_ascii_digit", |c| c.is_ascii_digit()));
    registry.record("is_ascii_hexdigit", every("is_ascii_hexdigit", |c| c.is_ascii_hexdigit()));
    registry.record(
        "is_lowercase",
        Filter::str("is_lowercase", |s| {
            s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
        }),
    );
    registry.record(
        "is_uppercase",
        Filter::str("is_uppercase", |s| {
            s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
        }),
    );
}

/// Non-empty strings whose every char passes `test`.
fn every(name: &'static str, test: fn(char) -> bool) -> Filter {
    Filter::str(name, move |s| !s.is_empty() && s.chars().all(test))
}

fn integer<T>(name: &'static str) -> Converter
where
    T: FromStr + TryFrom<i64> + TryFrom<u64> + Into<Value> + 'static,
{
    Converter::new(name, move |value| match &value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|i| <T as TryFrom<i64>>::try_from(i).ok())
            .or_else(|| n.as_u64().and_then(|u| <T as TryFrom<u64>>::try_from(u).ok()))
            .map(Into::into)
            .ok_or_else(|| ValidationError::new(format!("'{n}' is not a valid {name}"))),
        Value::String(s) => s
            .trim()
            .parse::<T>()
            .map(Into::into)
            .map_err(|_| ValidationError::new(format!("invalid literal for {name}: '{s}'"))),
        other => Err(ValidationError::new(format!(
            "expected {name}, got '{}'",
            render(other)
        ))),
    })
}

/// `fits` tells whether the parsed `f64` stays finite in the target type.
fn float(name: &'static str, fits: fn(f64) -> bool) -> Converter {
    Converter::new(name, move |value| {
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|x| fits(*x))
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| {
                ValidationError::new(format!("could not convert to {name}: '{}'", render(&value)))
            })
    })
}

fn string() -> Converter {
    Converter::new("String", |value| match value {
        Value::String(_) => Ok(value),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(ValidationError::new(format!(
            "expected a string, got '{}'",
            render(&other)
        ))),
    })
}

/// Exact decimals as canonical strings, so no precision is lost in JSON.
fn decimal() -> Converter {
    Converter::new("decimal", |value| {
        let literal = match &value {
            Value::String(s) => s.trim().to_owned(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ValidationError::new(format!(
                    "expected a decimal, got '{}'",
                    render(other)
                )));
            }
        };
        Decimal::from_str(&literal)
            .or_else(|_| Decimal::from_scientific(&literal))
            .map(|d| Value::String(d.to_string()))
            .map_err(|_| ValidationError::new(format!("invalid literal for decimal: '{literal}'")))
    })
}

fn character() -> Converter {
    Converter::new("char", |value| {
        let single = value.as_str().is_some_and(|s| s.chars().count() == 1);
        if single {
            return Ok(value);
        }
        Err(ValidationError::new(format!(
            "expected a single character, got '{}'",
            render(&value)
        )))
    })
}

fn radix(name: &'static str, radix: u32, prefix: &'static str) -> Converter {
    Converter::new(name, move |value| {
        if value.is_i64() || value.is_u64() {
            return Ok(value);
        }
        let invalid =
            || ValidationError::new(format!("invalid literal for {name}: '{}'", render(&value)));
        let literal = value.as_str().ok_or_else(invalid)?.trim();

        let (sign, unsigned) = match literal.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", literal.strip_prefix('+').unwrap_or(literal)),
        };
        let digits = match unsigned.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => &unsigned[prefix.len()..],
            _ => unsigned,
        };
        // One sign, before the prefix.
        if digits.starts_with(['+', '-']) {
            return Err(invalid());
        }

        i64::from_str_radix(&format!("{sign}{digits}"), radix)
            .map(Value::from)
            .map_err(|_| invalid())
    })
}

fn span() -> Result<Converter, regex::Error> {
    let to_bound = |digits: &str| {
        digits
            .parse::<u64>()
            .map_err(|e| ValidationError::new(format!("invalid range bound '{digits}': {e}")))
    };
    let regex = Converter::from(Regex::new(RANGE_PATTERN)?.map(move |caps| {
        Ok(json!({
            "start": to_bound(&caps[1])?,
            "end": to_bound(&caps[2])?,
        }))
    }));

    Ok(Converter::new("range", move |value| {
        let spanned = value.is_object()
            && serde_json::from_value::<std::ops::Range<u64>>(value.clone()).is_ok();
        if spanned {
            return Ok(value);
        }
        regex.convert(value)
    }))
}
