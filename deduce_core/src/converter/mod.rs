//! Converters and the combinators that build compound converters.
//!
//! A converter takes one loosely-typed [`Value`] and either returns the
//! converted value or rejects it with a [`ValidationError`]. [`Converter`]
//! is the cheap-to-clone handle everything else passes around; the structs
//! in this module implement [`Convert`] and turn into a `Converter` with
//! `.into()`.
//!
//! ```rust
//! # use deduce_core::converter::{chain, Converter, Filter, OneOf};
//! # use serde_json::json;
//! let color = chain([
//!     Converter::from(Filter::str("is_lowercase", |s| s.chars().all(char::is_lowercase))),
//!     OneOf::new(["red", "green", "blue"]).into(),
//! ]);
//! assert_eq!(color.convert(json!("red")).unwrap(), json!("red"));
//! assert!(color.convert(json!("Red")).is_err());
//! ```

use std::{borrow::Cow, fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ValidationError;

/// Function signature shared by every converter.
pub type ConvertFn = dyn Fn(Value) -> Result<Value, ValidationError> + Send + Sync;

/// Anything that can act as a converter.
pub trait Convert: Send + Sync + 'static {
    fn convert(&self, value: Value) -> Result<Value, ValidationError>;

    /// Short human-readable name, used in logs and failure messages.
    fn name(&self) -> Cow<'static, str>;
}

/// Renders a value for a failure message: strings without their JSON quotes.
pub(crate) fn render(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

// ============================================================================
// CONVERTER HANDLE
// ============================================================================

/// A named, shareable converter. `func` is `None` for [`Identity`].
#[derive(Clone)]
pub struct Converter {
    name: Cow<'static, str>,
    func: Option<Arc<ConvertFn>>,
}

impl Converter {
    /// Wraps a plain function or closure as a converter.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ValidationError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Some(Arc::new(func)),
        }
    }

    pub fn identity() -> Self {
        Self {
            name: Cow::Borrowed("identity"),
            func: None,
        }
    }

    /// Round-trips the value through `T`'s own `Deserialize`/`Serialize`
    /// impls, which is how a Rust type acts as its own converter.
    pub fn native<T>() -> Self
    where
        T: DeserializeOwned + serde::Serialize + 'static,
    {
        Self::new(crate::models::short_type_name::<T>(), |value| {
            let typed: T = serde_json::from_value(value)
                .map_err(|e| ValidationError::new(e.to_string()))?;
            serde_json::to_value(typed).map_err(|e| ValidationError::new(e.to_string()))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_identity(&self) -> bool {
        self.func.is_none()
    }

    pub fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        match &self.func {
            Some(func) => func(value),
            None => Ok(value),
        }
    }

    /// `true` when both handles point at the same converter.
    pub fn ptr_eq(&self, other: &Converter) -> bool {
        match (&self.func, &other.func) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Runs `next` on this converter's output.
    pub fn then(self, next: impl Into<Converter>) -> Converter {
        chain([self, next.into()])
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<C: Convert> From<C> for Converter {
    fn from(conv: C) -> Self {
        Converter::new(conv.name(), move |value| conv.convert(value))
    }
}

// ============================================================================
// COMBINATORS
// ============================================================================

/// The no-op converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl From<Identity> for Converter {
    fn from(_: Identity) -> Self {
        Converter::identity()
    }
}

/// Chains converters left to right, stopping at the first failure.
///
/// Identity steps are dropped, so an empty chain is [`Identity`] and a
/// chain with a single real step is that step itself.
pub fn chain<I>(converters: I) -> Converter
where
    I: IntoIterator,
    I::Item: Into<Converter>,
{
    let mut steps: Vec<Converter> = converters
        .into_iter()
        .map(Into::into)
        .filter(|c| !c.is_identity())
        .collect();

    if steps.len() <= 1 {
        return steps.pop().unwrap_or_else(Converter::identity);
    }
    Chain { steps }.into()
}

struct Chain {
    steps: Vec<Converter>,
}

impl Convert for Chain {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        self.steps
            .iter()
            .try_fold(value, |value, step| step.convert(value))
    }

    fn name(&self) -> Cow<'static, str> {
        let names: Vec<&str> = self.steps.iter().map(Converter::name).collect();
        Cow::Owned(names.join(" | "))
    }
}

/// Transforms the value with a function whose error is any `Display`.
pub struct Transform {
    name: Cow<'static, str>,
    func: Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>,
}

impl Transform {
    pub fn new<F, E>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self {
            name: name.into(),
            func: Box::new(move |value| func(value).map_err(|e| e.to_string())),
        }
    }
}

impl Convert for Transform {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        (self.func)(value).map_err(ValidationError::new)
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// Lets the value through unchanged when the predicate holds.
pub struct Filter {
    name: Cow<'static, str>,
    test: Box<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Filter {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            test: Box::new(test),
        }
    }

    /// A filter over strings; any other value is rejected.
    pub fn str<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |value| value.as_str().is_some_and(&test))
    }
}

impl Convert for Filter {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        if (self.test)(&value) {
            return Ok(value);
        }
        Err(ValidationError::new(format!(
            "'{}' does not satisfy '{}'",
            render(&value),
            self.name
        )))
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// Maps groups of equivalent raw values to one canonical value.
///
/// Groups are scanned in insertion order and members compared with exact
/// `Value` equality, so `"1"` and `1` are different members.
#[derive(Debug, Clone, Default)]
pub struct Equiv {
    groups: Vec<(Vec<Value>, Value)>,
}

impl Equiv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group: every value in `members` converts to `canonical`.
    pub fn group<I>(mut self, members: I, canonical: impl Into<Value>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.groups.push((
            members.into_iter().map(Into::into).collect(),
            canonical.into(),
        ));
        self
    }

    pub fn lookup(&self, value: &Value) -> Option<&Value> {
        self.groups
            .iter()
            .find(|(members, _)| members.contains(value))
            .map(|(_, canonical)| canonical)
    }
}

impl<I, C> FromIterator<(I, C)> for Equiv
where
    I: IntoIterator,
    I::Item: Into<Value>,
    C: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (I, C)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Equiv::new(), |equiv, (members, canonical)| {
                equiv.group(members, canonical)
            })
    }
}

impl Convert for Equiv {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        self.lookup(&value).cloned().ok_or_else(|| {
            ValidationError::new(format!("no equivalent for '{}'", render(&value)))
        })
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("equiv")
    }
}

/// Passes `null` through and hands everything else to the inner converter.
#[derive(Debug, Clone)]
pub struct Optional(pub Converter);

impl Optional {
    pub fn new(inner: impl Into<Converter>) -> Self {
        Self(inner.into())
    }
}

impl Convert for Optional {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return Ok(value);
        }
        self.0.convert(value)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("Option<{}>", self.0.name()))
    }
}

// ============================================================================
// NAMED BUILT-INS
// ============================================================================

/// Requires the value to be one of a fixed set.
#[derive(Debug, Clone)]
pub struct OneOf {
    values: Vec<Value>,
}

impl OneOf {
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Convert for OneOf {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        if self.values.contains(&value) {
            return Ok(value);
        }
        let expected: Vec<Cow<'_, str>> = self.values.iter().map(render).collect();
        Err(ValidationError::new(format!(
            "expected one of '{}', got '{}'",
            expected.join(", "),
            render(&value)
        )))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("one_of")
    }
}

/// Requires a comparable value to lie within `[min, max]`.
///
/// The value is read as `T` for the comparison and returned unchanged.
#[derive(Debug, Clone)]
pub struct Range<T> {
    min: T,
    max: T,
}

impl<T> Range<T>
where
    T: PartialOrd + fmt::Display + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T> Convert for Range<T>
where
    T: PartialOrd + fmt::Display + DeserializeOwned + Send + Sync + 'static,
{
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        let Ok(typed) = T::deserialize(&value) else {
            return Err(ValidationError::new(format!(
                "'{}' is not comparable to {}",
                render(&value),
                self.min
            )));
        };
        if typed < self.min || typed > self.max {
            return Err(ValidationError::new(format!(
                "'{}' is not within [{}, {}]",
                render(&value),
                self.min,
                self.max
            )));
        }
        Ok(value)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("range[{}, {}]", self.min, self.max))
    }
}

type BuildFn = dyn Fn(&regex::Captures<'_>) -> Result<Value, ValidationError> + Send + Sync;

/// Matches a string against a pattern anchored at the start of the input.
///
/// Returns the input string by default; [`Regex::map`] builds the output
/// from the captures instead.
pub struct Regex {
    pattern: regex::Regex,
    build: Option<Box<BuildFn>>,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(regex::Regex::new(pattern)?))
    }

    pub fn from_regex(pattern: regex::Regex) -> Self {
        Self {
            pattern,
            build: None,
        }
    }

    pub fn map<F>(mut self, build: F) -> Self
    where
        F: Fn(&regex::Captures<'_>) -> Result<Value, ValidationError> + Send + Sync + 'static,
    {
        self.build = Some(Box::new(build));
        self
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    fn mismatch(&self, value: &Value) -> ValidationError {
        ValidationError::new(format!(
            "did not match '{}': '{}'",
            self.pattern.as_str(),
            render(value)
        ))
    }
}

impl Convert for Regex {
    fn convert(&self, value: Value) -> Result<Value, ValidationError> {
        let built = {
            let Value::String(s) = &value else {
                return Err(self.mismatch(&value));
            };
            // Leftmost-first: a match at 0 exists iff the first match starts there.
            match self.pattern.captures(s) {
                Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0) => {
                    self.build.as_ref().map(|build| build(&caps))
                }
                _ => return Err(self.mismatch(&value)),
            }
        };
        built.unwrap_or(Ok(value))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("regex({})", self.pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse_int() -> Converter {
        Converter::new("int", |value| match &value {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| ValidationError::new(e.to_string())),
            _ => Ok(value),
        })
    }

    fn double() -> Converter {
        Converter::new("double", |value| {
            value
                .as_i64()
                .map(|n| json!(n * 2))
                .ok_or_else(|| ValidationError::new("not an integer"))
        })
    }

    #[test]
    fn identity_returns_input() {
        let id = Converter::from(Identity);
        assert!(id.is_identity());
        assert_eq!(id.convert(json!({"a": [1, 2]})).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn chain_applies_left_to_right() {
        let conv = chain([parse_int(), double()]);
        assert_eq!(conv.convert(json!("21")).unwrap(), json!(42));
        assert_eq!(conv.name(), "int | double");
    }

    #[test]
    fn chain_of_identities_around_converter_is_that_converter() {
        let inner = parse_int();
        let conv = chain([Converter::identity(), inner.clone(), Converter::identity()]);
        assert!(conv.ptr_eq(&inner));
        assert_eq!(conv.convert(json!("7")).unwrap(), json!(7));
    }

    #[test]
    fn empty_chain_is_identity() {
        let conv = chain(Vec::<Converter>::new());
        assert!(conv.is_identity());
    }

    #[test]
    fn chain_stops_at_first_failure() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            Converter::new("counted", move |value| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        };

        let err = chain([parse_int(), counted]).convert(json!("foo")).unwrap_err();
        assert_eq!(err.message(), "invalid digit found in string");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn then_is_a_two_step_chain() {
        let conv = parse_int().then(double());
        assert_eq!(conv.convert(json!("5")).unwrap(), json!(10));
    }

    #[test]
    fn equiv_maps_groups_to_canonical_values() {
        let conv: Converter = Equiv::new()
            .group(["a", "A"], 1)
            .group(["b", "B"], 2)
            .into();

        assert_eq!(conv.convert(json!("a")).unwrap(), json!(1));
        assert_eq!(conv.convert(json!("A")).unwrap(), json!(1));
        assert_eq!(conv.convert(json!("b")).unwrap(), json!(2));
        assert_eq!(conv.convert(json!("B")).unwrap(), json!(2));
        assert_eq!(
            conv.convert(json!("c")).unwrap_err().message(),
            "no equivalent for 'c'"
        );
    }

    #[test]
    fn equiv_from_iterator() {
        let equiv: Equiv = vec![(vec!["on", "yes"], true), (vec!["off", "no"], false)]
            .into_iter()
            .collect();
        assert_eq!(equiv.lookup(&json!("yes")), Some(&json!(true)));
        assert_eq!(equiv.lookup(&json!("maybe")), None);
    }

    #[test]
    fn filter_passes_or_names_the_predicate() {
        let conv: Converter = Filter::str("is_lowercase", |s| s.chars().all(char::is_lowercase)).into();

        assert_eq!(conv.convert(json!("hello")).unwrap(), json!("hello"));
        assert_eq!(
            conv.convert(json!("Hello")).unwrap_err().message(),
            "'Hello' does not satisfy 'is_lowercase'"
        );
        assert!(conv.convert(json!(3)).is_err());
    }

    #[test]
    fn transform_reports_the_function_error() {
        let conv: Converter = Transform::new("len", |value: Value| {
            value
                .as_str()
                .map(|s| json!(s.len()))
                .ok_or("expected a string")
        })
        .into();

        assert_eq!(conv.convert(json!("abc")).unwrap(), json!(3));
        assert_eq!(conv.convert(json!(1)).unwrap_err().message(), "expected a string");
    }

    #[test]
    fn optional_lets_null_through() {
        let conv: Converter = Optional::new(parse_int()).into();
        assert_eq!(conv.convert(Value::Null).unwrap(), Value::Null);
        assert_eq!(conv.convert(json!("3")).unwrap(), json!(3));
        assert!(conv.convert(json!("x")).is_err());
        assert_eq!(conv.name(), "Option<int>");
    }

    #[test]
    fn one_of_restricts_values() {
        let conv: Converter = OneOf::new(["apple", "orange"]).into();
        assert_eq!(conv.convert(json!("apple")).unwrap(), json!("apple"));
        assert_eq!(
            conv.convert(json!("melon")).unwrap_err().message(),
            "expected one of 'apple, orange', got 'melon'"
        );
    }

    #[test]
    fn range_is_inclusive() {
        let conv: Converter = Range::new(1, 10).into();
        assert_eq!(conv.convert(json!(1)).unwrap(), json!(1));
        assert_eq!(conv.convert(json!(10)).unwrap(), json!(10));
        assert_eq!(
            conv.convert(json!(11)).unwrap_err().message(),
            "'11' is not within [1, 10]"
        );
        assert_eq!(
            conv.convert(json!("5")).unwrap_err().message(),
            "'5' is not comparable to 1"
        );
    }

    #[test]
    fn range_over_floats_and_strings() {
        let unit: Converter = Range::new(0.0, 1.0).into();
        assert!(unit.convert(json!(0.5)).is_ok());
        assert!(unit.convert(json!(1.5)).is_err());

        let letters: Converter = Range::new("a".to_string(), "m".to_string()).into();
        assert!(letters.convert(json!("f")).is_ok());
        assert!(letters.convert(json!("z")).is_err());
    }

    #[test]
    fn regex_matches_at_start_and_returns_input() {
        let conv: Converter = Regex::new(r"\d{3}").unwrap().into();
        assert_eq!(conv.convert(json!("123abc")).unwrap(), json!("123abc"));
        assert_eq!(
            conv.convert(json!("ab123")).unwrap_err().message(),
            r"did not match '\d{3}': 'ab123'"
        );
        assert!(conv.convert(json!(123)).is_err());
    }

    #[test]
    fn regex_map_builds_from_captures() {
        let conv: Converter = Regex::new(r"(\w+)@(\w+)")
            .unwrap()
            .map(|caps| Ok(json!({ "user": &caps[1], "host": &caps[2] })))
            .into();

        assert_eq!(
            conv.convert(json!("ada@example")).unwrap(),
            json!({ "user": "ada", "host": "example" })
        );
    }

    #[test]
    fn invalid_regex_fails_at_construction() {
        assert!(Regex::new("(unclosed").is_err());
    }

    #[test]
    fn native_round_trips_through_the_type() {
        let conv = Converter::native::<Vec<u8>>();
        assert_eq!(conv.convert(json!([1, 2])).unwrap(), json!([1, 2]));
        assert!(conv.convert(json!([1, 300])).is_err());
        assert_eq!(conv.name(), "Vec<u8>");
    }
}
