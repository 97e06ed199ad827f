//! Deferred-error view over a desired-state document
//!
//! [`ResourceData`] lets resource code pull typed values out of a loosely
//! structured JSON document in one pass. A missing or mistyped field does not
//! stop request construction: the getter returns the type's zero value and
//! records a [`FieldError`]. The recorded failures are surfaced together by
//! [`ResourceData::error`] at two checkpoints:
//!
//! 1. **pre-check**, right after the request is built and before any remote call
//! 2. **post-check**, after every remote call of the operation has completed
//!    and its results were written back with [`ResourceData::set`]
//!
//! ## Paths
//!
//! Paths are dot-separated. A numeric segment indexes a sequence, so
//! `volume.0.size` reads the `size` of the first declared volume.
//!
//! ## Ownership
//!
//! One accessor is created per lifecycle invocation and owned by it. Getters
//! take `&mut self` because they append to the error list; nothing is shared.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, ExtractionErrors, FieldError, Result};

/// One element of a named collection (or any JSON mapping)
pub type Entry = Map<String, Value>;

/// A type that can be extracted from a document value.
///
/// `Default` supplies the zero value handed back when extraction fails.
pub trait FieldValue: Sized + Default {
    /// Human-readable name of the type, used in error messages
    const KIND: &'static str;

    /// Convert the JSON value, or `None` when its shape does not match
    fn from_value(value: &Value) -> Option<Self>;
}

impl FieldValue for String {
    const KIND: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FieldValue for i64 {
    const KIND: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldValue for i32 {
    const KIND: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl FieldValue for bool {
    const KIND: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for f64 {
    const KIND: &'static str = "number";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldValue for Entry {
    const KIND: &'static str = "mapping";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FieldValue for Vec<Entry> {
    const KIND: &'static str = "sequence of mappings";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_array()?
            .iter()
            .map(|item| item.as_object().cloned())
            .collect()
    }
}

impl FieldValue for Vec<String> {
    const KIND: &'static str = "sequence of strings";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_array()?
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect()
    }
}

impl FieldValue for BTreeMap<String, String> {
    const KIND: &'static str = "mapping of strings";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()?
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
            .collect()
    }
}

/// Typed, deferred-error accessor over the previous and current documents
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    previous: Value,
    current: Value,
    id: Option<i64>,
    errors: Vec<FieldError>,
}

impl ResourceData {
    /// Accessor for a resource that has never been applied
    pub fn new(current: Value) -> Self {
        Self::with_previous(Value::Null, current)
    }

    /// Accessor over the last-applied and the newly declared document
    pub fn with_previous(previous: Value, current: Value) -> Self {
        Self {
            previous,
            current,
            id: None,
            errors: Vec::new(),
        }
    }

    /// Attach the recorded remote identity
    pub fn with_id(mut self, id: Option<i64>) -> Self {
        self.id = id;
        self
    }

    /// Typed extraction that reports its failure instead of recording it
    pub fn try_get<T: FieldValue>(&self, path: &str) -> std::result::Result<T, FieldError> {
        extract(&self.current, path)
    }

    /// Typed extraction with deferred error: zero value plus a recorded
    /// failure when the path is absent or mistyped
    pub fn get<T: FieldValue>(&mut self, path: &str) -> T {
        match extract(&self.current, path) {
            Ok(value) => value,
            Err(err) => {
                self.errors.push(err);
                T::default()
            }
        }
    }

    /// Like [`get`](Self::get) but an absent field is `None` without an
    /// error. A present value of the wrong type is still recorded.
    pub fn get_optional<T: FieldValue>(&mut self, path: &str) -> Option<T> {
        match extract_optional(&self.current, path) {
            Ok(value) => value,
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    pub fn get_string(&mut self, path: &str) -> String {
        self.get(path)
    }

    pub fn get_int(&mut self, path: &str) -> i64 {
        self.get(path)
    }

    pub fn get_bool(&mut self, path: &str) -> bool {
        self.get(path)
    }

    pub fn get_number(&mut self, path: &str) -> f64 {
        self.get(path)
    }

    pub fn get_map(&mut self, path: &str) -> Entry {
        self.get(path)
    }

    pub fn get_list_of_maps(&mut self, path: &str) -> Vec<Entry> {
        self.get(path)
    }

    pub fn get_string_list(&mut self, path: &str) -> Vec<String> {
        self.get(path)
    }

    pub fn get_string_map(&mut self, path: &str) -> BTreeMap<String, String> {
        self.get(path)
    }

    /// Read a field of one collection element, reporting failures under
    /// `prefix.key` (for example `volume.2.size`)
    pub fn get_entry_field<T: FieldValue>(&mut self, entry: &Entry, prefix: &str, key: &str) -> T {
        let path = format!("{}.{}", prefix, key);
        match entry.get(key).filter(|v| !v.is_null()) {
            None => {
                self.errors.push(FieldError::missing(path));
                T::default()
            }
            Some(value) => T::from_value(value).unwrap_or_else(|| {
                self.errors
                    .push(FieldError::wrong_type(path, T::KIND, kind_of(value)));
                T::default()
            }),
        }
    }

    /// Both versions of a field, for the change-set engine.
    ///
    /// An absent side is the empty value (a collection that was added or
    /// removed entirely); a mistyped side is a recorded error.
    pub fn get_changed<T: FieldValue>(&mut self, path: &str) -> (T, T) {
        let previous = match extract_optional::<T>(&self.previous, path) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                self.errors.push(err);
                T::default()
            }
        };
        let current = match extract_optional::<T>(&self.current, path) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                self.errors.push(err);
                T::default()
            }
        };
        (previous, current)
    }

    pub fn get_changed_map(&mut self, path: &str) -> (Entry, Entry) {
        self.get_changed(path)
    }

    pub fn get_changed_string_map(
        &mut self,
        path: &str,
    ) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        self.get_changed(path)
    }

    pub fn get_changed_list_of_maps(&mut self, path: &str) -> (Vec<Entry>, Vec<Entry>) {
        self.get_changed(path)
    }

    /// True iff the previous and current values at `path` differ by content
    pub fn has_changed_element(&self, path: &str) -> bool {
        lookup(&self.previous, path) != lookup(&self.current, path)
    }

    /// Aggregate of every failure recorded so far.
    ///
    /// Never clears: repeated calls return the same aggregate, grown by any
    /// failure recorded in between.
    pub fn error(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Extraction(ExtractionErrors(self.errors.clone())))
        }
    }

    /// Failures recorded so far
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The recorded remote identity, if the resource exists
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// The recorded identity, or zero plus a deferred `id` error
    pub fn require_id(&mut self) -> i64 {
        match self.id {
            Some(id) => id,
            None => {
                self.errors.push(FieldError::missing("id"));
                0
            }
        }
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Write a value back into the current document, creating intermediate
    /// mappings. An impossible write is recorded for the post-check.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        if let Err(reason) = assign(&mut self.current, path, value.into()) {
            self.errors.push(FieldError::unwritable(path, reason));
        }
    }

    pub fn previous(&self) -> &Value {
        &self.previous
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    /// Consume the accessor, returning the written-back document and identity
    pub fn into_current(self) -> (Value, Option<i64>) {
        (self.current, self.id)
    }
}

/// Copy computed attributes from the last observed document into a new
/// declaration wherever the declaration leaves them out.
///
/// A `*` segment walks sequences positionally, so `volume.*.id` restores the
/// remote identity of each declared volume by its position.
pub fn overlay_computed(previous: &Value, desired: &mut Value, paths: &[&str]) {
    for path in paths {
        let segments: Vec<&str> = path.split('.').collect();
        overlay_path(previous, desired, &segments);
    }
}

fn overlay_path(previous: &Value, desired: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match (previous, desired) {
        (Value::Array(prev_items), Value::Array(items)) if *head == "*" => {
            for (prev_item, item) in prev_items.iter().zip(items.iter_mut()) {
                overlay_path(prev_item, item, rest);
            }
        }
        (Value::Object(prev_map), Value::Object(map)) => {
            let Some(prev_value) = prev_map.get(*head) else {
                return;
            };
            if rest.is_empty() {
                if map.get(*head).is_none_or(Value::is_null) {
                    map.insert((*head).to_owned(), prev_value.clone());
                }
            } else if let Some(next) = map.get_mut(*head) {
                overlay_path(prev_value, next, rest);
            }
        }
        _ => {}
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for segment in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if cur.is_null() { None } else { Some(cur) }
}

fn extract<T: FieldValue>(doc: &Value, path: &str) -> std::result::Result<T, FieldError> {
    extract_optional(doc, path)?.ok_or_else(|| FieldError::missing(path))
}

fn extract_optional<T: FieldValue>(
    doc: &Value,
    path: &str,
) -> std::result::Result<Option<T>, FieldError> {
    match lookup(doc, path) {
        None => Ok(None),
        Some(value) => T::from_value(value)
            .map(Some)
            .ok_or_else(|| FieldError::wrong_type(path, T::KIND, kind_of(value))),
    }
}

fn assign(doc: &mut Value, path: &str, value: Value) -> std::result::Result<(), String> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err("empty path".to_owned());
    };

    let mut cur = doc;
    for segment in parents {
        if cur.is_null() {
            *cur = Value::Object(Map::new());
        }
        cur = match cur {
            Value::Object(map) => map.entry((*segment).to_owned()).or_insert(Value::Null),
            Value::Array(items) => {
                let len = items.len();
                let index = parse_index(segment)?;
                items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {} out of range for length {}", index, len))?
            }
            other => return Err(format!("cannot descend into a {}", kind_of(other))),
        };
    }

    if cur.is_null() {
        *cur = Value::Object(Map::new());
    }
    match cur {
        Value::Object(map) => {
            map.insert((*last).to_owned(), value);
            Ok(())
        }
        Value::Array(items) => {
            let len = items.len();
            let index = parse_index(last)?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| format!("index {} out of range for length {}", index, len))?;
            *slot = value;
            Ok(())
        }
        other => Err(format!("cannot write into a {}", kind_of(other))),
    }
}

fn parse_index(segment: &str) -> std::result::Result<usize, String> {
    segment
        .parse()
        .map_err(|_| format!("'{}' is not a sequence index", segment))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
