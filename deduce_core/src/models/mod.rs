//! Core data models for deduce-rs
//!
//! Signatures describe a function's parameters and how each one is
//! converted; arguments are what a caller supplies; bound arguments are the
//! two matched up by name.

use std::borrow::Cow;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::converter::{Converter, Identity};
use crate::error::{BindError, DeduceError, DeserializationError};

/// Key under which a converter is registered.
pub type AliasKey = Cow<'static, str>;

/// `std::any::type_name` with every module path stripped:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.truncate(segment_start);
            }
            c if c.is_alphanumeric() || c == '_' => out.push(c),
            c => {
                out.push(c);
                segment_start = out.len();
            }
        }
    }
    out
}

// ============================================================================
// SIGNATURES
// ============================================================================

/// How a single parameter gets its converter, decided when the signature
/// is written down and resolved once when the function is deduced.
#[derive(Debug, Clone)]
pub enum ConverterSpec {
    /// No annotation: the value is passed through untouched.
    Identity,
    /// Use this converter as is.
    Converter(Converter),
    /// Look the key up in the alias registry. When nothing is registered the
    /// fallback is used; without one, deducing fails.
    Alias {
        key: AliasKey,
        fallback: Option<Converter>,
    },
    /// `null` passes through, anything else goes to the inner spec.
    Optional(Box<ConverterSpec>),
}

impl ConverterSpec {
    pub fn alias(key: impl Into<AliasKey>) -> Self {
        ConverterSpec::Alias {
            key: key.into(),
            fallback: None,
        }
    }

    pub fn converter(converter: impl Into<Converter>) -> Self {
        ConverterSpec::Converter(converter.into())
    }

    /// Uses the Rust type's name as the alias key (`i64`, `String`, `str`,
    /// `Vec<u8>` ...), falling back to the type's own deserializer when no
    /// converter is registered under that name.
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        let name = short_type_name::<T>();
        ConverterSpec::Alias {
            key: Cow::Owned(name.trim_start_matches('&').to_string()),
            fallback: Some(Converter::native::<T>()),
        }
    }

    pub fn optional(inner: impl Into<ConverterSpec>) -> Self {
        ConverterSpec::Optional(Box::new(inner.into()))
    }
}

impl From<Converter> for ConverterSpec {
    fn from(converter: Converter) -> Self {
        ConverterSpec::Converter(converter)
    }
}

impl From<Identity> for ConverterSpec {
    fn from(_: Identity) -> Self {
        ConverterSpec::Identity
    }
}

impl From<&'static str> for ConverterSpec {
    fn from(key: &'static str) -> Self {
        ConverterSpec::alias(key)
    }
}

impl From<String> for ConverterSpec {
    fn from(key: String) -> Self {
        ConverterSpec::alias(key)
    }
}

/// A declared parameter. A parameter with a default is optional.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Cow<'static, str>,
    pub spec: ConverterSpec,
    pub default: Option<Value>,
}

/// The ordered parameter list of a function, with a conversion spec for
/// each parameter.
///
/// ```rust
/// # use deduce_core::Signature;
/// let sig = Signature::new()
///     .required("x", "i64")
///     .optional("y", "i64", 0)
///     .untyped("label");
/// assert_eq!(sig.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn required(self, name: impl Into<Cow<'static, str>>, spec: impl Into<ConverterSpec>) -> Self {
        self.param(Param {
            name: name.into(),
            spec: spec.into(),
            default: None,
        })
    }

    pub fn optional(
        self,
        name: impl Into<Cow<'static, str>>,
        spec: impl Into<ConverterSpec>,
        default: impl Into<Value>,
    ) -> Self {
        self.param(Param {
            name: name.into(),
            spec: spec.into(),
            default: Some(default.into()),
        })
    }

    /// A required parameter without any conversion.
    pub fn untyped(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.required(name, ConverterSpec::Identity)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Binds positional values in declaration order, then keywords by name,
    /// then fills unsupplied optional parameters with their defaults.
    pub fn bind(&self, args: Arguments) -> Result<BoundArguments, BindError> {
        let Arguments {
            positional,
            keyword,
        } = args;

        if positional.len() > self.params.len() {
            return Err(BindError::TooManyPositional {
                expected: self.params.len(),
                found: positional.len(),
            });
        }

        let mut slots: Vec<Option<(Value, ArgSource)>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(positional) {
            *slot = Some((value, ArgSource::Positional));
        }

        for (name, value) in keyword {
            let Some(idx) = self.position(&name) else {
                return Err(BindError::UnexpectedKeyword { name });
            };
            if slots[idx].is_some() {
                return Err(BindError::MultipleValues { name });
            }
            slots[idx] = Some((value, ArgSource::Keyword));
        }

        let mut missing = Vec::new();
        let mut bound = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let (value, source) = match (slot, &param.default) {
                (Some(supplied), _) => supplied,
                (None, Some(default)) => (default.clone(), ArgSource::Default),
                (None, None) => {
                    missing.push(param.name.to_string());
                    continue;
                }
            };
            bound.push(BoundArg {
                name: param.name.clone(),
                value,
                source,
            });
        }

        if !missing.is_empty() {
            return Err(BindError::MissingArguments { names: missing });
        }
        Ok(BoundArguments { args: bound })
    }
}

// ============================================================================
// ARGUMENTS
// ============================================================================

/// Arguments as supplied by a caller: positional values and keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: Map<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// An array is read as positional values, an object as keywords and
    /// `null` as no arguments at all.
    pub fn from_json(value: Value) -> Result<Self, BindError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Array(positional) => Ok(Self {
                positional,
                keyword: Map::new(),
            }),
            Value::Object(keyword) => Ok(Self {
                positional: Vec::new(),
                keyword,
            }),
            Value::Bool(_) => Err(BindError::InvalidArguments { found: "a boolean" }),
            Value::Number(_) => Err(BindError::InvalidArguments { found: "a number" }),
            Value::String(_) => Err(BindError::InvalidArguments { found: "a string" }),
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &Map<String, Value> {
        &self.keyword
    }
}

impl TryFrom<Value> for Arguments {
    type Error = BindError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Arguments::from_json(value)
    }
}

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSource {
    Positional,
    Keyword,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundArg {
    pub name: Cow<'static, str>,
    pub value: Value,
    pub source: ArgSource,
}

/// Arguments matched to parameter names, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    args: Vec<BoundArg>,
}

impl BoundArguments {
    pub fn iter(&self) -> impl Iterator<Item = &BoundArg> {
        self.args.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BoundArg> {
        self.args.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Values that were supplied positionally, in order.
    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.args
            .iter()
            .filter(|a| a.source == ArgSource::Positional)
            .map(|a| &a.value)
    }

    /// Values that were supplied by keyword or filled from a default.
    pub fn keywords(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args
            .iter()
            .filter(|a| a.source != ArgSource::Positional)
            .map(|a| (a.name.as_ref(), &a.value))
    }

    /// Deserializes a copy of the named argument.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, DeserializationError> {
        let value = self.value(name).cloned().ok_or_else(|| unbound(name))?;
        serde_json::from_value(value)
            .map_err(|e| DeserializationError::new(name.to_string(), e))
    }

    /// Moves the named argument out and deserializes it, leaving `null`.
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, DeserializationError> {
        let arg = self
            .args
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| unbound(name))?;
        serde_json::from_value(arg.value.take())
            .map_err(|e| DeserializationError::new(name.to_string(), e))
    }

    /// All arguments as a JSON object keyed by parameter name.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.args
                .iter()
                .map(|a| (a.name.to_string(), a.value.clone()))
                .collect(),
        )
    }

    /// Deserializes every argument at once, reading them as the fields of
    /// a struct named after the parameters.
    pub fn parse<I: DeserializeOwned>(&self) -> Result<I, DeserializationError> {
        serde_json::from_value(self.to_value())
            .map_err(|e| DeserializationError::new("arguments", e))
    }

    /// Turns the bound values back into call arguments of the same shape:
    /// positional values stay positional, the rest become keywords.
    pub fn into_arguments(self) -> Arguments {
        self.args
            .into_iter()
            .fold(Arguments::new(), |args, arg| match arg.source {
                ArgSource::Positional => args.arg(arg.value),
                ArgSource::Keyword | ArgSource::Default => args.kwarg(arg.name, arg.value),
            })
    }
}

fn unbound(name: &str) -> DeserializationError {
    DeserializationError::new(
        name.to_string(),
        <serde_json::Error as serde::de::Error>::custom(format!("no argument bound to '{name}'")),
    )
}

// ============================================================================
// CALLS AND REGISTRATIONS
// ============================================================================

/// Represents a call of a deduced function by name with JSON arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Link-time registration emitted by `#[deduce]`.
pub struct DeducedRegistration {
    /// Function name
    pub name: &'static str,
    /// Doc comment of the function
    pub doc: &'static str,
    /// Builds the parameter list with each parameter's conversion spec
    pub signature: fn() -> Signature,
    /// Calls the function with converted arguments (JSON out)
    pub f: fn(BoundArguments) -> Result<Value, DeduceError>,
}

impl DeducedRegistration {
    pub const fn new(
        name: &'static str,
        doc: &'static str,
        signature: fn() -> Signature,
        f: fn(BoundArguments) -> Result<Value, DeduceError>,
    ) -> Self {
        Self {
            name,
            doc,
            signature,
            f,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig() -> Signature {
        Signature::new()
            .required("x", "i64")
            .optional("y", "i64", 10)
    }

    #[test]
    fn short_type_names_drop_module_paths() {
        assert_eq!(short_type_name::<i64>(), "i64");
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Option<String>>(), "Option<String>");
        assert_eq!(short_type_name::<Vec<(u8, String)>>(), "Vec<(u8, String)>");
        assert_eq!(short_type_name::<&str>(), "&str");
    }

    #[test]
    fn spec_of_uses_type_name_as_alias() {
        let ConverterSpec::Alias { key, fallback } = ConverterSpec::of::<String>() else {
            panic!("expected an alias spec");
        };
        assert_eq!(key, "String");
        assert!(fallback.is_some());
    }

    #[test]
    fn bind_positional_then_defaults() {
        let bound = sig().bind(Arguments::new().arg("1")).unwrap();

        assert_eq!(bound.value("x"), Some(&json!("1")));
        assert_eq!(bound.value("y"), Some(&json!(10)));
        assert_eq!(bound.positional().collect::<Vec<_>>(), vec![&json!("1")]);
        assert_eq!(
            bound.keywords().collect::<Vec<_>>(),
            vec![("y", &json!(10))]
        );
    }

    #[test]
    fn bind_keywords_by_name() {
        let bound = sig()
            .bind(Arguments::new().kwarg("y", "2").kwarg("x", "1"))
            .unwrap();
        let names: Vec<&str> = bound.iter().map(|a| a.name.as_ref()).collect();
        assert_eq!(names, ["x", "y"]);
        assert!(bound.iter().all(|a| a.source == ArgSource::Keyword));
    }

    #[test]
    fn bind_reports_usage_errors() {
        assert_eq!(
            sig().bind(Arguments::new().arg(1).arg(2).arg(3)).unwrap_err(),
            BindError::TooManyPositional {
                expected: 2,
                found: 3
            }
        );
        assert_eq!(
            sig().bind(Arguments::new().arg(1).kwarg("z", 1)).unwrap_err(),
            BindError::UnexpectedKeyword { name: "z".into() }
        );
        assert_eq!(
            sig().bind(Arguments::new().arg(1).kwarg("x", 1)).unwrap_err(),
            BindError::MultipleValues { name: "x".into() }
        );
        assert_eq!(
            Signature::new()
                .untyped("a")
                .untyped("b")
                .bind(Arguments::new())
                .unwrap_err(),
            BindError::MissingArguments {
                names: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn arguments_from_json() {
        let positional = Arguments::from_json(json!([1, "two"])).unwrap();
        assert_eq!(positional.positional(), &[json!(1), json!("two")]);

        let keyword = Arguments::try_from(json!({ "x": 1 })).unwrap();
        assert_eq!(keyword.keyword().get("x"), Some(&json!(1)));

        assert_eq!(Arguments::from_json(Value::Null).unwrap(), Arguments::new());
        assert_eq!(
            Arguments::from_json(json!("nope")).unwrap_err(),
            BindError::InvalidArguments { found: "a string" }
        );
    }

    #[test]
    fn typed_access_to_bound_values() {
        #[derive(Deserialize)]
        struct Point {
            x: i64,
            y: i64,
        }

        let mut bound = sig().bind(Arguments::new().arg(3)).unwrap();
        let point: Point = bound.parse().unwrap();
        assert_eq!((point.x, point.y), (3, 10));

        assert_eq!(bound.get::<i64>("x").unwrap(), 3);
        assert_eq!(bound.take::<i64>("y").unwrap(), 10);
        assert_eq!(bound.value("y"), Some(&Value::Null));

        let err = bound.get::<i64>("nope").unwrap_err();
        assert_eq!(err.param, "nope");
    }

    #[test]
    fn into_arguments_keeps_the_call_shape() {
        let args = Arguments::new().arg("1").kwarg("y", "2");
        let back = sig().bind(args.clone()).unwrap().into_arguments();
        assert_eq!(back, args);
    }
}
