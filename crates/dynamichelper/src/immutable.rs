use aro_core::Document;
use serde_json::{Map, Value};

const METADATA_FIELDS: [&str; 5] = ["resourceVersion", "creationTimestamp", "selfLink", "uid", "generation"];

const INJECT_CA_BUNDLE_LABEL: &str = "config.openshift.io/inject-trusted-cabundle";
const CA_BUNDLE_KEY: &str = "ca-bundle.crt";

/// Copy server-assigned fields from the live object onto the desired one
/// before an update: metadata bookkeeping, `status` when the live object has
/// one, a Service's `spec.clusterIP` and an injected trusted CA bundle.
pub fn preserve_immutable_fields(existing: &Document, desired: &mut Document) {
    let Some(dst) = desired.as_object_mut() else { return };

    if let Some(src) = existing.get("metadata").and_then(Value::as_object) {
        let meta = dst.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
        if let Some(meta) = meta.as_object_mut() {
            for field in METADATA_FIELDS {
                if let Some(v) = src.get(field) {
                    meta.insert(field.to_string(), v.clone());
                }
            }
        }
    }

    if let Some(status) = existing.get("status") {
        dst.insert("status".into(), status.clone());
    }

    if existing.get("kind").and_then(Value::as_str) == Some("Service") {
        let ip = existing.get("spec").and_then(|s| s.get("clusterIP"));
        if let (Some(ip), Some(spec)) = (ip, dst.get_mut("spec").and_then(Value::as_object_mut)) {
            spec.insert("clusterIP".into(), ip.clone());
        }
    }

    preserve_injected_ca_bundle(existing, desired);
}

/// A ConfigMap labelled for trusted-CA injection gets its `ca-bundle.crt`
/// filled in by the cluster; carry the live bundle over so an update does
/// not wipe it.
pub fn preserve_injected_ca_bundle(existing: &Document, desired: &mut Document) {
    if existing.get("kind").and_then(Value::as_str) != Some("ConfigMap") {
        return;
    }
    let labelled = desired
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_object)
        .is_some_and(|l| l.contains_key(INJECT_CA_BUNDLE_LABEL));
    if !labelled {
        return;
    }
    let Some(bundle) = existing.get("data").and_then(|d| d.get(CA_BUNDLE_KEY)) else { return };
    let Some(dst) = desired.as_object_mut() else { return };

    let data = dst.entry("data").or_insert_with(|| Value::Object(Map::new()));
    if data.is_null() {
        *data = Value::Object(Map::new());
    }
    if let Some(data) = data.as_object_mut() {
        data.insert(CA_BUNDLE_KEY.into(), bundle.clone());
    }
}
