//! Removal of fields that equal the API server's documented defaults, so a
//! manifest that leaves them unset compares equal to the defaulted live
//! object.

use aro_core::{Document, GroupKind};
use serde_json::{json, Value};

use crate::clean;

fn probe(p: &mut Value) {
    let _ = path!("$.failureThreshold").delete_if_match(p, &json!(3));
    let _ = path!("$.periodSeconds").delete_if_match(p, &json!(10));
    let _ = path!("$.successThreshold").delete_if_match(p, &json!(1));
    let _ = path!("$.timeoutSeconds").delete_if_match(p, &json!(1));
    let _ = path!("$.httpGet.scheme").delete_if_match(p, &json!("HTTP"));
}

fn container(c: &mut Value) {
    path!("$.livenessProbe").for_each_mut(c, probe);
    path!("$.readinessProbe").for_each_mut(c, probe);
    path!("$.startupProbe").for_each_mut(c, probe);
    let _ = path!("$.terminationMessagePath").delete_if_match(c, &json!("/dev/termination-log"));
    let _ = path!("$.terminationMessagePolicy").delete_if_match(c, &json!("File"));
    let _ = path!("$.ports[*].protocol").delete_if_match(c, &json!("TCP"));
}

/// Defaults of a PodSpec (not the template around it).
pub fn pod_spec(spec: &mut Value) {
    path!("$.containers[*]").for_each_mut(spec, container);
    path!("$.initContainers[*]").for_each_mut(spec, container);

    let _ = path!("$.dnsPolicy").delete_if_match(spec, &json!("ClusterFirst"));
    let _ = path!("$.restartPolicy").delete_if_match(spec, &json!("Always"));
    let _ = path!("$.schedulerName").delete_if_match(spec, &json!("default-scheduler"));
    let _ = path!("$.securityContext").delete_if_match(spec, &json!({}));
    let _ = path!("$.terminationGracePeriodSeconds").delete_if_match(spec, &json!(30));

    // serviceAccount is the deprecated alias the server fills in from
    // serviceAccountName.
    if let Some(name) = path!("$.serviceAccountName").get_first(spec).cloned() {
        let _ = path!("$.serviceAccount").delete_if_match(spec, &name);
    }

    let _ = path!("$.volumes[*].configMap.defaultMode").delete_if_match(spec, &json!(420));
    let _ = path!("$.volumes[*].secret.defaultMode").delete_if_match(spec, &json!(420));
    let _ = path!("$.volumes[*].hostPath.type").delete_if_match(spec, &json!(""));
}

fn remove_if_empty(obj: &mut Value, p: &aro_jsonpath::Path) {
    let _ = p.delete_if_match(obj, &json!({}));
}

fn service_port(port: &mut Value) {
    let _ = path!("$.protocol").delete_if_match(port, &json!("TCP"));
    if let Some(p) = port.get("port").cloned() {
        let _ = path!("$.targetPort").delete_if_match(port, &p);
    }
}

/// Strip documented API defaults from `obj`, per kind.
pub fn defaults(obj: &mut Document) {
    let gk = GroupKind::of(obj).map(|gk| gk.to_string()).unwrap_or_default();
    match gk.as_str() {
        "CronJob.batch" => {
            let _ = path!("$.spec.concurrencyPolicy").delete_if_match(obj, &json!("Allow"));
            let _ = path!("$.spec.failedJobsHistoryLimit").delete_if_match(obj, &json!(1));
            let _ = path!("$.spec.successfulJobsHistoryLimit").delete_if_match(obj, &json!(3));
            let _ = path!("$.spec.suspend").delete_if_match(obj, &json!(false));
            path!("$.spec.jobTemplate.spec.template.spec").for_each_mut(obj, pod_spec);
        }
        "CustomResourceDefinition.apiextensions.k8s.io" => {
            let _ = path!("$.spec.conversion.strategy").delete_if_match(obj, &json!("None"));
            remove_if_empty(obj, path!("$.spec.conversion"));
            let _ = path!("$.spec.preserveUnknownFields").delete_if_match(obj, &json!(true));
        }
        "DaemonSet.apps" => {
            let _ = path!("$.spec.revisionHistoryLimit").delete_if_match(obj, &json!(10));
            let _ = path!("$.spec.updateStrategy.rollingUpdate.maxUnavailable").delete_if_match(obj, &json!(1));
            let _ = path!("$.spec.updateStrategy.rollingUpdate.maxSurge").delete_if_match(obj, &json!(0));
            remove_if_empty(obj, path!("$.spec.updateStrategy.rollingUpdate"));
            let _ = path!("$.spec.updateStrategy.type").delete_if_match(obj, &json!("RollingUpdate"));
            remove_if_empty(obj, path!("$.spec.updateStrategy"));
            path!("$.spec.template.spec").for_each_mut(obj, pod_spec);
        }
        "Deployment.apps" => {
            let _ = path!("$.spec.progressDeadlineSeconds").delete_if_match(obj, &json!(600));
            let _ = path!("$.spec.revisionHistoryLimit").delete_if_match(obj, &json!(10));
            let _ = path!("$.spec.strategy.rollingUpdate.maxSurge").delete_if_match(obj, &json!("25%"));
            let _ = path!("$.spec.strategy.rollingUpdate.maxUnavailable").delete_if_match(obj, &json!("25%"));
            remove_if_empty(obj, path!("$.spec.strategy.rollingUpdate"));
            let _ = path!("$.spec.strategy.type").delete_if_match(obj, &json!("RollingUpdate"));
            remove_if_empty(obj, path!("$.spec.strategy"));
            path!("$.spec.template.spec").for_each_mut(obj, pod_spec);
        }
        "Pod" => path!("$.spec").for_each_mut(obj, pod_spec),
        "Secret" => {
            let _ = path!("$.type").delete_if_match(obj, &json!("Opaque"));
        }
        "Service" => {
            path!("$.spec.ports[*]").for_each_mut(obj, service_port);
            let _ = path!("$.spec.sessionAffinity").delete_if_match(obj, &json!("None"));
            let _ = path!("$.spec.type").delete_if_match(obj, &json!("ClusterIP"));
        }
        "StatefulSet.apps" => {
            let _ = path!("$.spec.podManagementPolicy").delete_if_match(obj, &json!("OrderedReady"));
            let _ = path!("$.spec.revisionHistoryLimit").delete_if_match(obj, &json!(10));
            let _ = path!("$.spec.updateStrategy.rollingUpdate.partition").delete_if_match(obj, &json!(0));
            remove_if_empty(obj, path!("$.spec.updateStrategy.rollingUpdate"));
            let _ = path!("$.spec.updateStrategy.type").delete_if_match(obj, &json!("RollingUpdate"));
            remove_if_empty(obj, path!("$.spec.updateStrategy"));
            let _ = path!("$.spec.volumeClaimTemplates[*].spec.volumeMode").delete_if_match(obj, &json!("Filesystem"));
            path!("$.spec.template.spec").for_each_mut(obj, pod_spec);
        }
        "StorageClass.storage.k8s.io" => {
            let _ = path!("$.reclaimPolicy").delete_if_match(obj, &json!("Delete"));
            let _ = path!("$.volumeBindingMode").delete_if_match(obj, &json!("Immediate"));
        }
        _ => {}
    }
}

/// [`clean`](clean::clean) followed by [`defaults`]: the comparable form of
/// an object.
pub fn normalize(obj: &mut Document) {
    clean::clean(obj);
    defaults(obj);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pod_spec_defaults_are_stripped() {
        let mut spec = json!({
            "containers": [{
                "name": "app",
                "ports": [{"containerPort": 80, "protocol": "TCP"}, {"containerPort": 53, "protocol": "UDP"}],
                "livenessProbe": {
                    "httpGet": {"path": "/healthz", "port": 8080, "scheme": "HTTP"},
                    "failureThreshold": 3,
                    "periodSeconds": 10,
                    "successThreshold": 1,
                    "timeoutSeconds": 5,
                },
                "terminationMessagePath": "/dev/termination-log",
                "terminationMessagePolicy": "FallbackToLogsOnError",
            }],
            "initContainers": [{"name": "init", "terminationMessagePolicy": "File"}],
            "dnsPolicy": "ClusterFirst",
            "restartPolicy": "Always",
            "schedulerName": "default-scheduler",
            "securityContext": {},
            "serviceAccount": "app",
            "serviceAccountName": "app",
            "terminationGracePeriodSeconds": 30,
            "volumes": [
                {"name": "a", "configMap": {"name": "cfg", "defaultMode": 420}},
                {"name": "b", "secret": {"secretName": "s", "defaultMode": 256}},
                {"name": "c", "hostPath": {"path": "/var", "type": ""}},
            ],
        });
        pod_spec(&mut spec);
        assert_eq!(
            spec,
            json!({
                "containers": [{
                    "name": "app",
                    "ports": [{"containerPort": 80}, {"containerPort": 53, "protocol": "UDP"}],
                    "livenessProbe": {"httpGet": {"path": "/healthz", "port": 8080}, "timeoutSeconds": 5},
                    "terminationMessagePolicy": "FallbackToLogsOnError",
                }],
                "initContainers": [{"name": "init"}],
                "serviceAccountName": "app",
                "volumes": [
                    {"name": "a", "configMap": {"name": "cfg"}},
                    {"name": "b", "secret": {"secretName": "s", "defaultMode": 256}},
                    {"name": "c", "hostPath": {"path": "/var"}},
                ],
            })
        );
    }

    #[test]
    fn service_defaults_compare_target_port_per_port() {
        let mut svc = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "spec": {
                "type": "ClusterIP",
                "sessionAffinity": "None",
                "ports": [
                    {"port": 443, "targetPort": 443, "protocol": "TCP"},
                    {"port": 80, "targetPort": 8080, "protocol": "TCP"},
                ],
            },
        });
        defaults(&mut svc);
        assert_eq!(svc["spec"], json!({"ports": [{"port": 443}, {"port": 80, "targetPort": 8080}]}));
    }

    #[test]
    fn empty_strategy_maps_are_removed() {
        let mut ds = json!({
            "apiVersion": "apps/v1",
            "kind": "DaemonSet",
            "spec": {
                "revisionHistoryLimit": 10,
                "updateStrategy": {"type": "RollingUpdate", "rollingUpdate": {"maxUnavailable": 1, "maxSurge": 0}},
                "template": {"spec": {"containers": []}},
            },
        });
        defaults(&mut ds);
        assert_eq!(ds["spec"], json!({"template": {"spec": {"containers": []}}}));

        let mut sts = json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "spec": {
                "podManagementPolicy": "OrderedReady",
                "updateStrategy": {"type": "OnDelete"},
                "volumeClaimTemplates": [{"spec": {"volumeMode": "Filesystem", "accessModes": ["ReadWriteOnce"]}}],
            },
        });
        defaults(&mut sts);
        assert_eq!(
            sts["spec"],
            json!({
                "updateStrategy": {"type": "OnDelete"},
                "volumeClaimTemplates": [{"spec": {"accessModes": ["ReadWriteOnce"]}}],
            })
        );
    }

    #[test]
    fn cluster_scoped_defaults() {
        let mut sc = json!({
            "apiVersion": "storage.k8s.io/v1",
            "kind": "StorageClass",
            "reclaimPolicy": "Delete",
            "volumeBindingMode": "WaitForFirstConsumer",
        });
        defaults(&mut sc);
        assert_eq!(
            sc,
            json!({"apiVersion": "storage.k8s.io/v1", "kind": "StorageClass", "volumeBindingMode": "WaitForFirstConsumer"})
        );

        let mut crd = json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "spec": {"conversion": {"strategy": "None"}, "preserveUnknownFields": true, "group": "x.io"},
        });
        defaults(&mut crd);
        assert_eq!(crd["spec"], json!({"group": "x.io"}));

        let mut cj = json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "spec": {
                "concurrencyPolicy": "Allow",
                "failedJobsHistoryLimit": 1,
                "successfulJobsHistoryLimit": 3,
                "suspend": false,
                "schedule": "@hourly",
                "jobTemplate": {"spec": {"template": {"spec": {"restartPolicy": "OnFailure", "dnsPolicy": "ClusterFirst"}}}},
            },
        });
        defaults(&mut cj);
        assert_eq!(
            cj["spec"],
            json!({
                "schedule": "@hourly",
                "jobTemplate": {"spec": {"template": {"spec": {"restartPolicy": "OnFailure"}}}},
            })
        );

        let mut secret = json!({"apiVersion": "v1", "kind": "Secret", "type": "Opaque"});
        defaults(&mut secret);
        assert_eq!(secret, json!({"apiVersion": "v1", "kind": "Secret"}));
    }
}
