//! Declarative JSON field rewrites.
//!
//! The proxy binary has no caller-supplied closure, so its transform comes
//! from config:
//!
//! ```toml
//! [rules]
//! remove = ["version", "meta.internal"]
//!
//! [rules.set]
//! age = 2
//! "meta.proxied" = true
//! ```
//!
//! Paths are dot-separated object keys. Removal runs before `set`, only
//! object roots are touched, and text bodies pass through unchanged.

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::intercept::{BoxError, Payload, Transform};

/// Field rewrites applied to every intercepted JSON object body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldRules {
    /// Dotted path → value to write. Missing parent objects are created.
    pub set: BTreeMap<String, Value>,

    /// Dotted paths to delete. Missing paths are ignored.
    pub remove: Vec<String>,
}

impl FieldRules {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Every configured path, for validation.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.set.keys().chain(self.remove.iter()).map(String::as_str)
    }

    /// Apply the rules in place. Non-object values are left alone.
    pub fn apply(&self, value: &mut Value) {
        let Some(root) = value.as_object_mut() else {
            return;
        };
        for path in &self.remove {
            remove_path(root, path);
        }
        for (path, replacement) in &self.set {
            if !set_path(root, path, replacement.clone()) {
                tracing::debug!(path = %path, "Rule path crosses a non-object value, skipped");
            }
        }
    }
}

impl Transform for FieldRules {
    fn transform(&self, mut payload: Payload) -> BoxFuture<'static, Result<Payload, BoxError>> {
        if let Some(value) = payload.as_json_mut() {
            self.apply(value);
        }
        future::ready(Ok(payload)).boxed()
    }
}

fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return true;
        }
        let next = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        match next {
            Value::Object(map) => current = map,
            _ => return false,
        }
    }
    false
}

fn remove_path(root: &mut Map<String, Value>, path: &str) -> bool {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    let mut current = root;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        match current.get_mut(segment) {
            Some(Value::Object(map)) => current = map,
            _ => return false,
        }
    }
    // shift_remove keeps the remaining keys in upstream order
    current.shift_remove(leaf).is_some()
}
