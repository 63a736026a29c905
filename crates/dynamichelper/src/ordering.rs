//! Apply order for batches of heterogeneous manifests.
//!
//! Two independent tables exist. [`OrderingPolicy::GroupKind`] keys on the
//! full GroupKind string and is the default for bulk manifests;
//! [`OrderingPolicy::Kind`] keys on the bare Kind and is used where the
//! workload-checksum flow needs configs ahead of the pods that mount them.

use std::cmp::Ordering;

use aro_core::{Document, GroupKind};
use serde::{Deserialize, Serialize};

const GROUP_KIND_UNLISTED: u8 = 99;
const KIND_UNLISTED: u8 = 10;

pub fn group_kind_priority(group_kind: &str) -> u8 {
    match group_kind {
        "CustomResourceDefinition.apiextensions.k8s.io" => 1,
        "ClusterRole.rbac.authorization.k8s.io" => 2,
        "ClusterRoleBinding.rbac.authorization.k8s.io" => 3,
        "SecurityContextConstraints.security.openshift.io" => 4,
        "Namespace" => 10,
        "ConfigMap" => 11,
        "Secret" => 12,
        "ServiceAccount" => 13,
        _ => GROUP_KIND_UNLISTED,
    }
}

pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "CustomResourceDefinition" => 1,
        "Namespace" => 2,
        "SecurityContextConstraints" => 3,
        "ClusterRole" => 4,
        "ClusterRoleBinding" => 5,
        "ServiceAccount" => 6,
        "Secret" => 7,
        "ConfigMap" => 8,
        "StorageClass" => 9,
        "Service" => 10,
        "Deployment" => 11,
        "DaemonSet" => 12,
        "CronJob" => 13,
        "StatefulSet" => 14,
        "Cluster" => 15,
        _ => KIND_UNLISTED,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingPolicy {
    #[default]
    GroupKind,
    Kind,
}

impl OrderingPolicy {
    pub fn priority(&self, doc: &Document) -> u8 {
        match self {
            Self::GroupKind => {
                let gk = GroupKind::of(doc).map(|gk| gk.to_string()).unwrap_or_default();
                group_kind_priority(&gk)
            }
            Self::Kind => kind_priority(doc.get("kind").and_then(|k| k.as_str()).unwrap_or("")),
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.priority(a).cmp(&self.priority(b))
    }

    /// Stable sort: objects of equal priority keep their relative order.
    pub fn sort(&self, objs: &mut [Document]) {
        objs.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(api_version: &str, kind: &str) -> Document {
        json!({"apiVersion": api_version, "kind": kind, "metadata": {"name": kind.to_lowercase()}})
    }

    fn kinds(objs: &[Document]) -> Vec<&str> {
        objs.iter().map(|o| o["kind"].as_str().unwrap_or("")).collect()
    }

    #[test]
    fn kind_table_orders_workload_batches() {
        let mut objs = vec![
            obj("v1", "ServiceAccount"),
            obj("apps/v1", "Deployment"),
            obj("v1", "Namespace"),
            obj("security.openshift.io/v1", "SecurityContextConstraints"),
            obj("v1", "ConfigMap"),
            obj("v1", "Service"),
        ];
        OrderingPolicy::Kind.sort(&mut objs);
        assert_eq!(
            kinds(&objs),
            vec!["Namespace", "SecurityContextConstraints", "ServiceAccount", "ConfigMap", "Service", "Deployment"]
        );
    }

    #[test]
    fn group_kind_table_puts_unlisted_last() {
        let mut objs = vec![
            obj("apps/v1", "Deployment"),
            obj("v1", "ServiceAccount"),
            obj("rbac.authorization.k8s.io/v1", "ClusterRoleBinding"),
            obj("apiextensions.k8s.io/v1", "CustomResourceDefinition"),
            obj("v1", "Secret"),
            obj("example.com/v1", "Widget"),
            obj("rbac.authorization.k8s.io/v1", "ClusterRole"),
        ];
        OrderingPolicy::GroupKind.sort(&mut objs);
        assert_eq!(
            kinds(&objs),
            vec![
                "CustomResourceDefinition",
                "ClusterRole",
                "ClusterRoleBinding",
                "Secret",
                "ServiceAccount",
                "Deployment",
                "Widget",
            ]
        );
    }

    #[test]
    fn tables_are_independent() {
        // Service is unlisted by GroupKind but ranked by Kind.
        assert_eq!(group_kind_priority("Service"), 99);
        assert_eq!(kind_priority("Service"), 10);
        assert_eq!(kind_priority("Widget"), 10);
        // A bare "Cluster" only means something to the Kind table.
        assert_eq!(kind_priority("Cluster"), 15);
    }
}
