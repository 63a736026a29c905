//! Accessors for the well-known fields of a resource document.
//!
//! Reads never fail: a missing or mistyped field is `None`. Writers create
//! `metadata` when the document is an object and do nothing otherwise.

use serde_json::{Map, Value};

use crate::Document;

fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

fn meta_str<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get("metadata").and_then(|m| m.get(key)).and_then(Value::as_str)
}

pub fn api_version(doc: &Document) -> Option<&str> {
    str_field(doc, "apiVersion")
}

pub fn kind(doc: &Document) -> Option<&str> {
    str_field(doc, "kind")
}

pub fn name(doc: &Document) -> Option<&str> {
    meta_str(doc, "name")
}

pub fn namespace(doc: &Document) -> Option<&str> {
    meta_str(doc, "namespace").filter(|ns| !ns.is_empty())
}

pub fn resource_version(doc: &Document) -> Option<&str> {
    meta_str(doc, "resourceVersion")
}

/// `metadata` as a mutable map, created if absent.
pub fn metadata_mut(doc: &mut Document) -> Option<&mut Map<String, Value>> {
    let obj = doc.as_object_mut()?;
    let meta = obj.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
    if meta.is_null() {
        *meta = Value::Object(Map::new());
    }
    meta.as_object_mut()
}

pub fn set_namespace(doc: &mut Document, namespace: &str) {
    if let Some(meta) = metadata_mut(doc) {
        meta.insert("namespace".into(), Value::String(namespace.to_string()));
    }
}

pub fn set_resource_version(doc: &mut Document, rv: Option<&str>) {
    if let Some(meta) = metadata_mut(doc) {
        match rv {
            Some(rv) => {
                meta.insert("resourceVersion".into(), Value::String(rv.to_string()));
            }
            None => {
                meta.remove("resourceVersion");
            }
        }
    }
}
