//! Call arguments and parameter binding.
//!
//! A memoized function receives its arguments as [`CallArgs`]: positional
//! values plus named keyword values. A [`ParamTable`] names the function's
//! parameters and their defaults; binding maps positionals onto names and
//! fills in every default the caller left out. Two calls that differ only in
//! whether a default was spelled out therefore bind, and hash, identically.

use std::collections::BTreeMap;

use memo_common::Value;

/// Arguments as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument, replacing any earlier value for `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments.
    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// Declared parameters of a memoized function, in positional order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTable {
    params: Vec<Param>,
}

impl ParamTable {
    /// Creates an empty table. Every argument then binds as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter without a default.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declares a parameter with a default value.
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Binds call arguments to the declared parameters.
    ///
    /// Positionals fill declared names in order; surplus positionals are kept
    /// as extras. Keywords win over a positional bound to the same name.
    /// Defaults are merged for every declared parameter left unbound.
    pub fn bind(&self, args: &CallArgs) -> BoundArgs {
        let mut named = BTreeMap::new();
        let mut extra = Vec::new();
        for (i, value) in args.positional.iter().enumerate() {
            match self.params.get(i) {
                Some(param) => {
                    named.insert(param.name.clone(), value.clone());
                }
                None => extra.push(value.clone()),
            }
        }
        for (name, value) in &args.keyword {
            named.insert(name.clone(), value.clone());
        }
        for param in &self.params {
            if let Some(default) = &param.default {
                named
                    .entry(param.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        BoundArgs { named, extra }
    }
}

/// Arguments after binding, as seen by the wrapped function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    named: BTreeMap<String, Value>,
    extra: Vec<Value>,
}

impl BoundArgs {
    /// Returns the named argument, including merged defaults.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// All named arguments.
    pub fn named(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Positional arguments beyond the declared parameters.
    pub fn extra(&self) -> &[Value] {
        &self.extra
    }

    /// The hashable form: `{"args": [extra...], "kwargs": {named...}}`.
    pub fn to_value(&self) -> Value {
        let mut root = BTreeMap::new();
        root.insert("args".to_string(), Value::Seq(self.extra.clone()));
        root.insert("kwargs".to_string(), Value::Map(self.named.clone()));
        Value::Map(root)
    }
}
