//! Checksum annotations that roll workloads when their configuration changes.
//!
//! Each ConfigMap and Secret in a batch is hashed over its sorted entries,
//! each rendered as `key: "value"` with the value quoted Go-style; workloads
//! in the same batch that mount one of them get
//! `checksum/configmap-<name>` / `checksum/secret-<name>` on their pod
//! template. Objects outside the batch are not looked up.

use std::fmt::Write as _;

use aro_core::{meta, Document, GroupKind};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConfigKind {
    ConfigMap,
    Secret,
}

type ConfigKey = (ConfigKind, String, String);

fn config_kind(doc: &Document) -> Option<ConfigKind> {
    let gk = GroupKind::of(doc).ok()?;
    match (gk.group.as_str(), gk.kind.as_str()) {
        ("", "ConfigMap") => Some(ConfigKind::ConfigMap),
        ("", "Secret") => Some(ConfigKind::Secret),
        _ => None,
    }
}

fn is_workload(doc: &Document) -> bool {
    GroupKind::of(doc)
        .map(|gk| gk.group == "apps" && matches!(gk.kind.as_str(), "DaemonSet" | "Deployment" | "StatefulSet"))
        .unwrap_or(false)
}

/// Go's `%#v` rendering of a scalar: strings double-quoted and escaped.
fn go_repr(v: &Value) -> String {
    match v {
        Value::String(s) => go_quote(s),
        Value::Null => "<nil>".to_string(),
        other => other.to_string(),
    }
}

fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// SHA-256 over `data`, or `stringData` when `data` is empty, as lowercase
/// hex.
pub fn content_hash(doc: &Document) -> String {
    let entries = ["data", "stringData"]
        .iter()
        .filter_map(|f| doc.get(*f).and_then(Value::as_object))
        .find(|m| !m.is_empty());

    let mut hasher = Sha256::new();
    if let Some(entries) = entries {
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        for k in keys {
            hasher.update(format!("{}: {}", k, go_repr(&entries[k])).as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

fn volume_refs(workload: &Document) -> Vec<(ConfigKind, String)> {
    let mut out = Vec::new();
    for vol in path!("$.spec.template.spec.volumes[*]").get(workload) {
        if let Some(name) = vol.get("secret").and_then(|s| s.get("secretName")).and_then(Value::as_str) {
            out.push((ConfigKind::Secret, name.to_string()));
        }
        if let Some(name) = vol.get("configMap").and_then(|c| c.get("name")).and_then(Value::as_str) {
            out.push((ConfigKind::ConfigMap, name.to_string()));
        }
    }
    out
}

fn annotate(workload: &mut Document, checksums: Vec<(String, String)>) {
    let Some(template) = workload.get_mut("spec").and_then(|s| s.get_mut("template")) else { return };
    let Some(md) = meta::metadata_mut(template) else { return };
    let annotations = md.entry("annotations").or_insert_with(|| Value::Object(Map::new()));
    if !annotations.is_object() {
        *annotations = Value::Object(Map::new());
    }
    if let Some(annotations) = annotations.as_object_mut() {
        for (k, v) in checksums {
            annotations.insert(k, Value::String(v));
        }
    }
}

/// Stamp every workload in `objs` with the hashes of the ConfigMaps and
/// Secrets it mounts from the same batch.
pub fn hash_workload_configs(objs: &mut [Document]) {
    let mut hashes: FxHashMap<ConfigKey, String> = FxHashMap::default();
    for doc in objs.iter() {
        if let Some(kind) = config_kind(doc) {
            let ns = meta::namespace(doc).unwrap_or("").to_string();
            let name = meta::name(doc).unwrap_or("").to_string();
            hashes.insert((kind, ns, name), content_hash(doc));
        }
    }
    if hashes.is_empty() {
        return;
    }

    for doc in objs.iter_mut().filter(|d| is_workload(d)) {
        let ns = meta::namespace(doc).unwrap_or("").to_string();
        let checksums: Vec<(String, String)> = volume_refs(doc)
            .into_iter()
            .filter_map(|(kind, name)| {
                let hash = hashes.get(&(kind, ns.clone(), name.clone()))?;
                let prefix = match kind {
                    ConfigKind::ConfigMap => "checksum/configmap-",
                    ConfigKind::Secret => "checksum/secret-",
                };
                Some((format!("{prefix}{name}"), hash.clone()))
            })
            .collect();
        if !checksums.is_empty() {
            annotate(doc, checksums);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn go_quoting() {
        assert_eq!(go_quote("plain"), r#""plain""#);
        assert_eq!(go_quote("a\"b\\c\nd\te"), r#""a\"b\\c\nd\te""#);
        assert_eq!(go_quote("\u{1}"), r#""\x01""#);
        assert_eq!(go_quote("ünï"), "\"ünï\"");
        assert_eq!(go_repr(&json!(5)), "5");
    }

    #[test]
    fn empty_config_hashes_the_empty_string() {
        assert_eq!(
            content_hash(&json!({"kind": "ConfigMap"})),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn other_namespaces_do_not_match() {
        let mut objs = vec![
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "a"}, "data": {"k": "v"}}),
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "web", "namespace": "b"},
                "spec": {"template": {"spec": {"volumes": [{"name": "c", "configMap": {"name": "cfg"}}]}}},
            }),
        ];
        let before = objs[1].clone();
        hash_workload_configs(&mut objs);
        assert_eq!(objs[1], before);
    }
}
