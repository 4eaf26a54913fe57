//! Wrapping functions so their arguments are converted before every call.
//!
//! Converters are resolved once, when the function is deduced. Each call
//! then binds the arguments to the signature, converts every argument
//! (collecting all failures instead of stopping at the first), and only
//! invokes the function when nothing failed.

use std::{borrow::Cow, collections::BTreeMap, collections::HashSet, fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::converter::Converter;
use crate::error::{ConversionError, DeduceError};
use crate::models::{Arguments, BoundArguments, Signature};
use crate::registry::{Registry, global};

/// Function signature of the wrapped callable.
pub type DeducedFn<R> = dyn Fn(BoundArguments) -> Result<R, DeduceError> + Send + Sync;

/// A function whose arguments are converted before it runs.
pub struct Deduced<R> {
    signature: Arc<Signature>,
    converters: Arc<[(Cow<'static, str>, Converter)]>,
    func: Arc<DeducedFn<R>>,
}

impl<R> Clone for Deduced<R> {
    fn clone(&self) -> Self {
        Self {
            signature: Arc::clone(&self.signature),
            converters: Arc::clone(&self.converters),
            func: Arc::clone(&self.func),
        }
    }
}

impl<R> fmt::Debug for Deduced<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.converters.iter().map(|(name, conv)| (name, conv.name())))
            .finish()
    }
}

impl<R> Deduced<R> {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Each parameter with the converter resolved for it, in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Converter)> {
        self.converters.iter().map(|(name, conv)| (name.as_ref(), conv))
    }

    pub fn converter(&self, param: &str) -> Option<&Converter> {
        self.parameters()
            .find(|(name, _)| *name == param)
            .map(|(_, conv)| conv)
    }

    /// Converts every bound argument in place.
    ///
    /// All parameters are attempted; on failure the error names each one
    /// that failed and none that succeeded.
    pub fn convert(&self, mut bound: BoundArguments) -> Result<BoundArguments, ConversionError> {
        let mut failures = BTreeMap::new();

        for (arg, (_, conv)) in bound.iter_mut().zip(self.converters.iter()) {
            if conv.is_identity() {
                continue;
            }
            match conv.convert(std::mem::take(&mut arg.value)) {
                Ok(value) => arg.value = value,
                Err(err) => {
                    debug!(param = %arg.name, converter = conv.name(), error = %err, "argument failed conversion");
                    failures.insert(arg.name.to_string(), err.message().to_string());
                }
            }
        }

        if failures.is_empty() {
            return Ok(bound);
        }
        debug!(failed = failures.len(), "rejecting call");
        Err(ConversionError::from_failures(failures))
    }

    /// Binds, converts and calls.
    pub fn call(&self, args: Arguments) -> Result<R, DeduceError> {
        let bound = self.signature.bind(args)?;
        let converted = self.convert(bound)?;
        (self.func)(converted)
    }

    /// [`Deduced::call`] with arguments given as a JSON array (positional),
    /// object (keywords) or `null` (none).
    pub fn call_json(&self, args: Value) -> Result<R, DeduceError> {
        self.call(Arguments::from_json(args)?)
    }
}

// ============================================================================
// WRAPPING
// ============================================================================

impl Registry {
    /// Wraps `func`, resolving each parameter's converter against this
    /// registry now.
    pub fn deduce<F, R>(&self, signature: Signature, func: F) -> Result<Deduced<R>, DeduceError>
    where
        F: Fn(BoundArguments) -> R + Send + Sync + 'static,
        R: 'static,
    {
        self.deduce_fallible(signature, move |bound| Ok(func(bound)))
    }

    /// Like [`Registry::deduce`], for functions that can fail themselves.
    pub fn deduce_fallible<F, R>(
        &self,
        signature: Signature,
        func: F,
    ) -> Result<Deduced<R>, DeduceError>
    where
        F: Fn(BoundArguments) -> Result<R, DeduceError> + Send + Sync + 'static,
        R: 'static,
    {
        let mut seen = HashSet::new();
        let mut converters = Vec::with_capacity(signature.len());

        for param in signature.params() {
            if !seen.insert(param.name.as_ref()) {
                return Err(DeduceError::DuplicateParameter {
                    name: param.name.clone(),
                });
            }
            let conv = self.resolve(&param.name, param.spec.clone())?;
            trace!(param = %param.name, converter = conv.name(), "resolved converter");
            converters.push((param.name.clone(), conv));
        }

        Ok(Deduced {
            signature: Arc::new(signature),
            converters: converters.into(),
            func: Arc::new(func),
        })
    }

    /// Wraps a function of one typed input. The converted arguments are
    /// deserialized into `I` as a struct whose fields are the parameters.
    pub fn deduce_typed<I, O, F>(
        &self,
        signature: Signature,
        func: F,
    ) -> Result<Deduced<O>, DeduceError>
    where
        I: DeserializeOwned + 'static,
        O: 'static,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        self.deduce_fallible(signature, move |bound| Ok(func(bound.parse::<I>()?)))
    }
}

/// [`Registry::deduce`] against the process-wide registry.
pub fn deduce<F, R>(signature: Signature, func: F) -> Result<Deduced<R>, DeduceError>
where
    F: Fn(BoundArguments) -> R + Send + Sync + 'static,
    R: 'static,
{
    global().deduce(signature, func)
}

/// [`Registry::deduce_fallible`] against the process-wide registry.
pub fn deduce_fallible<F, R>(signature: Signature, func: F) -> Result<Deduced<R>, DeduceError>
where
    F: Fn(BoundArguments) -> Result<R, DeduceError> + Send + Sync + 'static,
    R: 'static,
{
    global().deduce_fallible(signature, func)
}

/// [`Registry::deduce_typed`] against the process-wide registry.
pub fn deduce_typed<I, O, F>(signature: Signature, func: F) -> Result<Deduced<O>, DeduceError>
where
    I: DeserializeOwned + 'static,
    O: 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    global().deduce_typed(signature, func)
}
