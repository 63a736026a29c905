//! Compile-once path expressions over generic JSON-like documents.
//!
//! A [`Path`] is parsed once (usually into a `static`) and then evaluated
//! against any number of documents. Evaluation never fails on shape: absent
//! keys, out-of-range indices and type mismatches simply select nothing.
//!
//! ```
//! use aro_jsonpath::Path;
//! use serde_json::json;
//!
//! let path = Path::compile("$.spec.containers[?(@.name == 'app')].image").unwrap();
//! let doc = json!({"spec": {"containers": [{"name": "app", "image": "nginx"}]}});
//! assert_eq!(path.get(&doc), vec![&json!("nginx")]);
//! ```

#![forbid(unsafe_code)]

mod parse;
mod rule;
mod slot;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use rule::Rule;
pub use slot::{EntrySlot, Slot, UnsupportedDelete, ValueSlot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("{path}: parse error at offset {offset}: {message}")]
    Parse { path: String, offset: usize, message: &'static str },
    #[error("{path}: no value found")]
    NotFound { path: String },
    #[error("{path}: expected exactly one value, found {count}")]
    Ambiguous { path: String, count: usize },
    #[error("{path}: expected {expected}, found {found}")]
    WrongType { path: String, expected: &'static str, found: &'static str },
    #[error("{path}: only map entries can be deleted")]
    UnsupportedDelete { path: String },
}

/// A compiled path expression. Stateless and reentrant.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    source: String,
    rules: Vec<Rule>,
}

impl Path {
    pub fn compile(source: &str) -> Result<Self, PathError> {
        let rules = parse::parse(source)?;
        Ok(Self { source: source.to_string(), rules })
    }

    /// Compile a path literal known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `source` does not parse. Only use with string constants.
    pub fn must_compile(source: &str) -> Self {
        match Self::compile(source) {
            Ok(path) => path,
            Err(e) => panic!("invalid path literal: {e}"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All values the path resolves to, in document order.
    pub fn get<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        rule::evaluate(&self.rules, doc)
    }

    pub fn get_first<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.get(doc).into_iter().next()
    }

    /// Call `f` with a slot for every resolved location.
    pub fn visit_slots(&self, doc: &mut Value, mut f: impl FnMut(&mut dyn Slot)) {
        rule::visit_slots(&self.rules, doc, &mut f);
    }

    /// Assign `value` to every resolved location. A final `.key` on an
    /// existing map inserts the key; missing intermediate maps are not
    /// created.
    pub fn set(&self, doc: &mut Value, value: Value) {
        self.visit_slots(doc, |slot| slot.set(value.clone()));
    }

    /// Remove every resolved map entry. Absent entries are ignored.
    pub fn delete(&self, doc: &mut Value) -> Result<(), PathError> {
        self.delete_where(doc, |_| true)
    }

    /// Remove resolved map entries whose current value equals `expected`.
    pub fn delete_if_match(&self, doc: &mut Value, expected: &Value) -> Result<(), PathError> {
        self.delete_where(doc, |v| v == expected)
    }

    fn delete_where(&self, doc: &mut Value, mut pred: impl FnMut(&Value) -> bool) -> Result<(), PathError> {
        let mut result = Ok(());
        self.visit_slots(doc, |slot| {
            if result.is_err() {
                return;
            }
            let matched = match slot.get() {
                Some(v) => pred(v),
                None => false,
            };
            if matched && slot.delete().is_err() {
                result = Err(PathError::UnsupportedDelete { path: self.source.clone() });
            }
        });
        result
    }

    /// Call `f` on every resolved value, mutably.
    pub fn for_each_mut(&self, doc: &mut Value, mut f: impl FnMut(&mut Value)) {
        self.visit_slots(doc, |slot| {
            if let Some(v) = slot.get_mut() {
                f(v);
            }
        });
    }

    /// Like [`Path::for_each_mut`] but stops at the first error.
    pub fn try_for_each_mut<E>(
        &self,
        doc: &mut Value,
        mut f: impl FnMut(&mut Value) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut result = Ok(());
        self.visit_slots(doc, |slot| {
            if result.is_ok() {
                if let Some(v) = slot.get_mut() {
                    result = f(v);
                }
            }
        });
        result
    }

    // The expect_* accessors are for call sites that have already
    // established the field exists; absence is reported as an error rather
    // than treated as an empty result.

    pub fn expect_one<'a>(&self, doc: &'a Value) -> Result<&'a Value, PathError> {
        let mut found = self.get(doc);
        match found.len() {
            0 => Err(PathError::NotFound { path: self.source.clone() }),
            1 => Ok(found.remove(0)),
            count => Err(PathError::Ambiguous { path: self.source.clone(), count }),
        }
    }

    pub fn expect_string<'a>(&self, doc: &'a Value) -> Result<&'a str, PathError> {
        let v = self.expect_one(doc)?;
        v.as_str().ok_or_else(|| self.wrong_type("string", v))
    }

    pub fn expect_object<'a>(&self, doc: &'a Value) -> Result<&'a Map<String, Value>, PathError> {
        let v = self.expect_one(doc)?;
        v.as_object().ok_or_else(|| self.wrong_type("object", v))
    }

    pub fn expect_array<'a>(&self, doc: &'a Value) -> Result<&'a Vec<Value>, PathError> {
        let v = self.expect_one(doc)?;
        v.as_array().ok_or_else(|| self.wrong_type("array", v))
    }

    /// Every resolved value as a string; zero matches is an empty vec.
    pub fn expect_strings<'a>(&self, doc: &'a Value) -> Result<Vec<&'a str>, PathError> {
        self.get(doc)
            .into_iter()
            .map(|v| v.as_str().ok_or_else(|| self.wrong_type("string", v)))
            .collect()
    }

    fn wrong_type(&self, expected: &'static str, found: &Value) -> PathError {
        PathError::WrongType { path: self.source.clone(), expected, found: type_name(found) }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
