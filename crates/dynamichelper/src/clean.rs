//! Stripping of server-managed fields so live and desired objects compare.
//!
//! Every rule tolerates absent or mistyped fields: a shape the rule does not
//! expect leaves the document as it was.

use aro_core::{Document, GroupKind};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static GENERATED_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new("-[a-z0-9]{5}$").expect("static regex"));

fn group_kind(doc: &Document) -> String {
    GroupKind::of(doc).map(|gk| gk.to_string()).unwrap_or_default()
}

/// Remove server bookkeeping from an object's `metadata`.
pub fn clean_metadata(obj: &mut Value) {
    for p in [
        path!("$.metadata.annotations.'kubectl.kubernetes.io/last-applied-configuration'"),
        path!("$.metadata.annotations.'openshift.io/generated-by'"),
        path!("$.metadata.creationTimestamp"),
        path!("$.metadata.generation"),
        path!("$.metadata.resourceVersion"),
        path!("$.metadata.selfLink"),
        path!("$.metadata.uid"),
    ] {
        let _ = p.delete(obj);
    }
    let _ = path!("$.metadata.annotations").delete_if_match(obj, &json!({}));
}

fn clean_pod_template(template: &mut Value) {
    let _ = path!("$.spec.initContainers.*.imagePullPolicy").delete(template);
    let _ = path!("$.spec.containers.*.imagePullPolicy").delete(template);
    clean_metadata(template);
}

fn with_template(obj: &mut Value, f: impl Fn(&mut Value)) {
    path!("$.spec.template").for_each_mut(obj, |t| f(t));
}

/// Move `data` entries that decode to UTF-8 into `stringData`. Entries that
/// are not valid base64 or not text stay in `data`.
fn convert_secret_data(obj: &mut Value) {
    let Some(root) = obj.as_object_mut() else { return };
    let Some(Value::Object(data)) = root.get_mut("data") else { return };

    let mut converted = Map::new();
    data.retain(|k, v| {
        let text = v.as_str().and_then(|s| STANDARD.decode(s).ok()).and_then(|b| String::from_utf8(b).ok());
        match text {
            Some(text) => {
                converted.insert(k.clone(), Value::String(text));
                false
            }
            None => true,
        }
    });
    let data_empty = data.is_empty();

    if !converted.is_empty() {
        match root.get_mut("stringData") {
            Some(Value::Object(existing)) => {
                for (k, v) in converted {
                    existing.entry(k).or_insert(v);
                }
            }
            _ => {
                root.insert("stringData".into(), Value::Object(converted));
            }
        }
    }
    if data_empty {
        root.remove("data");
    }
}

fn drop_generated_refs(obj: &mut Value, field: &str) {
    let Some(root) = obj.as_object_mut() else { return };
    let Some(Value::Array(refs)) = root.get_mut(field) else { return };
    refs.retain(|r| !r.get("name").and_then(Value::as_str).is_some_and(|n| GENERATED_SUFFIX.is_match(n)));
    if refs.is_empty() {
        root.remove(field);
    }
}

/// Normalise a live object fetched from the server.
pub fn clean(obj: &mut Document) {
    let _ = path!("$.status").delete(obj);

    match group_kind(obj).as_str() {
        "CronJob.batch" => {
            path!("$.spec.jobTemplate").for_each_mut(obj, clean_metadata);
            let _ = path!("$.spec.jobTemplate.metadata").delete_if_match(obj, &json!({}));
            path!("$.spec.jobTemplate.spec.template").for_each_mut(obj, clean_metadata);
            let _ = path!("$.spec.jobTemplate.spec.template.metadata").delete_if_match(obj, &json!({}));
        }
        "DaemonSet.apps" => {
            let _ = path!("$.metadata.annotations.'deprecated.daemonset.template.generation'").delete(obj);
            with_template(obj, clean_pod_template);
        }
        "Deployment.apps" => {
            let _ = path!("$.metadata.annotations.'deployment.kubernetes.io/revision'").delete(obj);
            with_template(obj, clean_pod_template);
        }
        "DeploymentConfig.apps.openshift.io" => with_template(obj, clean_pod_template),
        "ImageStream.image.openshift.io" => {
            let _ = path!("$.metadata.annotations.'openshift.io/image.dockerRepositoryCheck'").delete(obj);
            let _ = path!("$.spec.tags[*].generation").delete(obj);
        }
        "Namespace" => {
            for p in [
                path!("$.metadata.annotations.'openshift.io/sa.scc.mcs'"),
                path!("$.metadata.annotations.'openshift.io/sa.scc.supplemental-groups'"),
                path!("$.metadata.annotations.'openshift.io/sa.scc.uid-range'"),
            ] {
                let _ = p.delete(obj);
            }
        }
        "Secret" => {
            if path!("$.type").get_first(obj).and_then(Value::as_str) == Some("kubernetes.io/service-account-token") {
                let _ = path!("$.data").delete(obj);
                let _ = path!("$.metadata.annotations.'kubernetes.io/service-account.uid'").delete(obj);
            }
            convert_secret_data(obj);
        }
        "Service" => {
            let _ = path!("$.metadata.annotations.'service.alpha.openshift.io/serving-cert-signed-by'").delete(obj);
        }
        "ServiceAccount" => {
            drop_generated_refs(obj, "imagePullSecrets");
            drop_generated_refs(obj, "secrets");
        }
        "StatefulSet.apps" => {
            with_template(obj, clean_pod_template);
            path!("$.spec.volumeClaimTemplates[*]").for_each_mut(obj, clean_metadata);
            let _ = path!("$.spec.volumeClaimTemplates[*].status").delete(obj);
        }
        _ => {}
    }

    clean_metadata(obj);
}

/// Lighter normalisation for an object about to be created.
pub fn clean_new_object(obj: &mut Document) {
    let _ = path!("$.status").delete(obj);
    clean_metadata(obj);
    if matches!(group_kind(obj).as_str(), "Deployment.apps" | "DaemonSet.apps") {
        let _ = path!("$.spec.template.metadata.creationTimestamp").delete(obj);
    }
}

/// Carry over fields of a live Service that the server or the cloud
/// load-balancer controller owns.
pub fn handle_special_objects(existing: &Document, desired: &mut Document) {
    if existing.get("kind").and_then(Value::as_str) != Some("Service") {
        return;
    }
    let Some(live) = existing.get("spec").and_then(Value::as_object) else { return };
    let Some(spec) = desired.get_mut("spec").and_then(Value::as_object_mut) else { return };

    if live.get("type").and_then(Value::as_str) == Some("LoadBalancer") {
        for field in ["externalTrafficPolicy", "ports"] {
            match live.get(field) {
                Some(v) => spec.insert(field.into(), v.clone()),
                None => spec.remove(field),
            };
        }
    }
    // An unset live clusterIP goes on the wire as an absent field.
    match live.get("clusterIP") {
        Some(ip) => spec.insert("clusterIP".into(), ip.clone()),
        None => spec.remove("clusterIP"),
    };
}
