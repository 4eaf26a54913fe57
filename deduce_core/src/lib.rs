#![deny(unsafe_code)]

use std::{borrow::Cow, collections::HashMap};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

mod builtin;
pub mod converter;
pub mod deduce;
pub mod error;
pub mod models;
pub mod registry;

pub use converter::{
    Convert, Converter, Equiv, Filter, Identity, OneOf, Optional, Range, Regex, Transform, chain,
};
pub use deduce::{Deduced, deduce, deduce_fallible, deduce_typed};
pub use error::{BindError, ConversionError, DeduceError, DeserializationError, ValidationError};
pub use models::{
    AliasKey, ArgSource, Arguments, BoundArg, BoundArguments, ConverterSpec, DeducedRegistration,
    FunctionCall, Param, Signature,
};
pub use registry::{AliasRegistration, Registry, Retrieved, alias, configure, record, retrieve};

// Re-exports for use in generated code
#[doc(hidden)]
pub mod __private {
    pub use inventory;
    pub use serde_json;
}

// ============================================================================
// DEDUCED COLLECTION
// ============================================================================

/// Deduced functions callable by name with JSON arguments.
#[derive(Default, Clone, Debug)]
pub struct DeducedCollection {
    funcs: HashMap<Cow<'static, str>, Deduced<Value>>,
    descriptions: HashMap<Cow<'static, str>, &'static str>,
}

impl DeducedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduces `func` against the process-wide registry and adds it under
    /// `name`. The converted arguments are read into `I` as a struct whose
    /// fields are the parameters.
    pub fn register<I, O, F>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        desc: &'static str,
        signature: Signature,
        func: F,
    ) -> Result<&mut Self, DeduceError>
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        let name = name.into();
        if self.funcs.contains_key(&name) {
            return Err(DeduceError::AlreadyRegistered { name });
        }

        let deduced = deduce_fallible(signature, move |bound| {
            let input: I = bound.parse()?;
            Ok(serde_json::to_value(func(input))?)
        })?;
        self.insert(name, desc, deduced);
        Ok(self)
    }

    /// Adds an already deduced function.
    pub fn insert_deduced(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        desc: &'static str,
        deduced: Deduced<Value>,
    ) -> Result<&mut Self, DeduceError> {
        let name = name.into();
        if self.funcs.contains_key(&name) {
            return Err(DeduceError::AlreadyRegistered { name });
        }
        self.insert(name, desc, deduced);
        Ok(self)
    }

    fn insert(&mut self, name: Cow<'static, str>, desc: &'static str, deduced: Deduced<Value>) {
        debug!(function = %name, "registered deduced function");
        self.descriptions.insert(name.clone(), desc);
        self.funcs.insert(name, deduced);
    }

    pub fn call(&self, call: FunctionCall) -> Result<Value, DeduceError> {
        let FunctionCall { name, arguments } = call;
        let func = self
            .funcs
            .get(name.as_str())
            .ok_or(DeduceError::FunctionNotFound {
                name: Cow::Owned(name),
            })?;
        func.call_json(arguments)
    }

    pub fn get(&self, name: &str) -> Option<&Deduced<Value>> {
        self.funcs.get(name)
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), DeduceError> {
        if self.funcs.remove(name).is_none() {
            return Err(DeduceError::FunctionNotFound {
                name: Cow::Owned(name.to_string()),
            });
        }
        self.descriptions.remove(name);
        Ok(())
    }

    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &'static str)> + '_ {
        self.descriptions.iter().map(|(k, v)| (k.as_ref(), *v))
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Every `#[deduce]` function linked into the binary.
    ///
    /// A function whose converters can't be resolved is skipped and logged.
    pub fn collect_deduced() -> Self {
        let mut hub = Self::new();

        for reg in inventory::iter::<DeducedRegistration> {
            match deduce_fallible((reg.signature)(), reg.f) {
                Ok(deduced) => hub.insert(Cow::Borrowed(reg.name), reg.doc, deduced),
                Err(err) => {
                    tracing::warn!(function = reg.name, error = %err, "skipping deduced function")
                }
            }
        }

        hub
    }
}

inventory::collect!(DeducedRegistration);

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod collection_tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Pair {
        a: i64,
        b: i64,
    }

    fn pair() -> Signature {
        Signature::new().required("a", "i64").required("b", "i64")
    }

    fn fc(name: &str, args: Value) -> FunctionCall {
        FunctionCall::new(name, args)
    }

    #[test]
    fn test_collection() {
        let mut collection = DeducedCollection::default();

        collection
            .register("add", "Adds two values", pair(), |p: Pair| p.a + p.b)
            .unwrap();
        collection
            .register(
                "concat",
                "Concatenates two strings",
                Signature::new().required("a", "String").required("b", "String"),
                |t: std::collections::BTreeMap<String, String>| t.into_values().collect::<String>(),
            )
            .unwrap();

        assert_eq!(collection.call(fc("add", json!(["1", 2]))).unwrap(), json!(3));
        assert_eq!(
            collection.call(fc("add", json!({ "b": "5", "a": "1" }))).unwrap(),
            json!(6)
        );
        assert_eq!(
            collection
                .call(fc("concat", json!(["hello", "world"])))
                .unwrap(),
            json!("helloworld")
        );
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_invalid_function_name() {
        let mut col = DeducedCollection::default();
        col.register("add", "adds", pair(), |p: Pair| p.a + p.b)
            .unwrap();

        let err = col.call(fc("ghost", json!([]))).unwrap_err();
        assert!(matches!(err, DeduceError::FunctionNotFound { .. }));
    }

    #[test]
    fn test_conversion_error() {
        let mut col = DeducedCollection::default();
        col.register("subtract", "Sub two numbers", pair(), |p: Pair| p.a - p.b)
            .unwrap();

        let err = col.call(fc("subtract", json!(["a", "b"]))).unwrap_err();
        let failures = err.as_conversion().unwrap();
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_already_registered() {
        let mut col = DeducedCollection::default();
        col.register("add", "adds", pair(), |p: Pair| p.a + p.b)
            .unwrap();
        let err = col
            .register("add", "adds again", pair(), |p: Pair| p.a + p.b)
            .unwrap_err();
        assert!(matches!(err, DeduceError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_unregister() {
        let mut col = DeducedCollection::default();
        col.register("add", "adds", pair(), |p: Pair| p.a + p.b)
            .unwrap();
        assert_eq!(col.descriptions().collect::<Vec<_>>(), [("add", "adds")]);

        col.unregister("add").unwrap();
        assert!(col.get("add").is_none());
        assert!(col.descriptions().next().is_none());
        assert!(matches!(
            col.unregister("add").unwrap_err(),
            DeduceError::FunctionNotFound { .. }
        ));
    }

    #[test]
    fn test_insert_deduced() {
        let double = Registry::builtin()
            .deduce_fallible(Signature::new().required("n", "i64"), |b| {
                Ok(json!(b.get::<i64>("n")? * 2))
            })
            .unwrap();

        let mut col = DeducedCollection::new();
        col.insert_deduced("double", "Doubles n", double).unwrap();
        assert_eq!(col.call(fc("double", json!(["21"]))).unwrap(), json!(42));
    }
}
