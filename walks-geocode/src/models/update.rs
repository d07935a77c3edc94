//! Per-record store update
//!
//! Field corrections and the audit event travel together in one
//! `RecordUpdate` and are written in a single statement, so a walk is never
//! left with half a correction applied.

use crate::models::record::paths;
use crate::models::AuditEvent;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `$set` / `$unset` / `$push` against a walk document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    /// Dotted path → new value
    pub set: BTreeMap<String, Value>,
    /// Dotted paths to remove
    pub unset: Vec<String>,
    /// Audit event appended to `events`
    pub push_event: Option<AuditEvent>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set.insert(path.to_string(), value.into());
        self
    }

    pub fn unset(mut self, path: &str) -> Self {
        if !self.unset.iter().any(|p| p == path) {
            self.unset.push(path.to_string());
        }
        self
    }

    pub fn with_event(mut self, event: AuditEvent) -> Self {
        self.push_event = Some(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.push_event.is_none()
    }

    /// Apply to an in-memory document
    ///
    /// Order is unset, set, push, the same order the store applies them.
    pub fn apply_to(&self, document: &mut Value) -> serde_json::Result<()> {
        for path in &self.unset {
            remove_path(document, path);
        }
        for (path, value) in &self.set {
            set_path(document, path, value.clone());
        }
        if let Some(event) = &self.push_event {
            let event = serde_json::to_value(event)?;
            let events = ensure_object(document)
                .entry(paths::EVENTS)
                .or_insert_with(|| Value::Array(Vec::new()));
            if !events.is_array() {
                *events = Value::Array(Vec::new());
            }
            if let Value::Array(items) = events {
                items.push(event);
            }
        }
        Ok(())
    }
}

/// Read a dotted path
pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |node, key| node.as_object()?.get(key))
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn set_path(document: &mut Value, path: &str, value: Value) {
    let mut keys = path.split('.').peekable();
    let mut node = document;
    while let Some(key) = keys.next() {
        let map = ensure_object(node);
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
}

fn remove_path(document: &mut Value, path: &str) {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let container = match parent {
        Some(parent) => parent
            .split('.')
            .try_fold(&mut *document, |node, key| node.as_object_mut()?.get_mut(key)),
        None => Some(document),
    };
    if let Some(Value::Object(map)) = container {
        map.remove(leaf);
    }
}
