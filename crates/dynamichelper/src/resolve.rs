//! GroupKind to resource resolution against a discovery snapshot.

use aro_core::{GroupKind, GroupVersion, GroupVersionResource};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;

use crate::error::{Error, Result};

/// A resolved resource: where it lives and how it is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTarget {
    pub gvr: GroupVersionResource,
    pub kind: String,
    pub namespaced: bool,
}

/// Find the resource for `group_kind` (`Kind` or `Kind.group`, any case).
///
/// An exact GroupKind match returns the first hit in snapshot order; when
/// several versions of a kind are served and no version is given, which one
/// wins depends on the order the server listed them in. Otherwise the bare
/// Kind must match exactly one resource across all groups.
pub fn find(lists: &[APIResourceList], group_kind: &str, version: Option<&str>) -> Result<ApiTarget> {
    let version = version.filter(|v| !v.is_empty());
    let mut matches = Vec::new();

    for list in lists {
        let gv = GroupVersion::parse(&list.group_version)?;
        if version.is_some_and(|v| v != gv.version) {
            continue;
        }
        for resource in &list.resources {
            if resource.name.contains('/') {
                continue;
            }
            let target = || ApiTarget {
                gvr: GroupVersionResource {
                    group: gv.group.clone(),
                    version: gv.version.clone(),
                    resource: resource.name.clone(),
                },
                kind: resource.kind.clone(),
                namespaced: resource.namespaced,
            };

            let gk = GroupKind::new(gv.group.as_str(), resource.kind.as_str());
            if gk.to_string().eq_ignore_ascii_case(group_kind) {
                return Ok(target());
            }
            if resource.kind.eq_ignore_ascii_case(group_kind) {
                matches.push(target());
            }
        }
    }

    match matches.len() {
        0 => Err(Error::GroupKindNotFound(group_kind.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousGroupKind {
            group_kind: group_kind.to_string(),
            candidates: matches.iter().map(|m| format!("{}.{}", group_kind, m.gvr.group)).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
    use pretty_assertions::assert_eq;

    fn list(gv: &str, resources: &[(&str, &str)]) -> APIResourceList {
        APIResourceList {
            group_version: gv.into(),
            resources: resources
                .iter()
                .map(|(name, kind)| APIResource {
                    name: (*name).into(),
                    kind: (*kind).into(),
                    namespaced: true,
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn snapshot() -> Vec<APIResourceList> {
        vec![
            list("v1", &[("configmaps", "ConfigMap"), ("pods", "Pod"), ("pods/status", "Pod")]),
            list("apps/v1", &[("deployments", "Deployment"), ("deployments/scale", "Scale")]),
            list("metal3.io/v1alpha1", &[("baremetalhosts", "BareMetalHost")]),
            list("plastic.io/v1alpha1", &[("baremetalhosts", "BareMetalHost")]),
            list("batch/v1", &[("cronjobs", "CronJob")]),
            list("batch/v1beta1", &[("cronjobs", "CronJob")]),
        ]
    }

    #[test]
    fn resolves_core_and_grouped_kinds() {
        let t = find(&snapshot(), "configmap", None).unwrap();
        assert_eq!(t.gvr, GroupVersionResource { group: "".into(), version: "v1".into(), resource: "configmaps".into() });
        assert_eq!(t.kind, "ConfigMap");

        let t = find(&snapshot(), "Deployment.apps", None).unwrap();
        assert_eq!(t.gvr.resource, "deployments");
        let t = find(&snapshot(), "deployment", Some("v1")).unwrap();
        assert_eq!(t.gvr.group, "apps");
    }

    #[test]
    fn subresources_are_never_matched() {
        assert!(matches!(find(&snapshot(), "Scale", None), Err(Error::GroupKindNotFound(_))));
    }

    #[test]
    fn ambiguous_bare_kinds_list_every_candidate() {
        match find(&snapshot(), "baremetalhost", None) {
            Err(Error::AmbiguousGroupKind { group_kind, candidates }) => {
                assert_eq!(group_kind, "baremetalhost");
                assert_eq!(candidates, vec!["baremetalhost.metal3.io", "baremetalhost.plastic.io"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        let t = find(&snapshot(), "baremetalhost.metal3.io", None).unwrap();
        assert_eq!(t.gvr.group, "metal3.io");
        assert_eq!(t.gvr.version, "v1alpha1");
    }

    #[test]
    fn versions_filter_lists_and_first_match_wins() {
        assert_eq!(find(&snapshot(), "CronJob.batch", None).unwrap().gvr.version, "v1");
        assert_eq!(find(&snapshot(), "CronJob.batch", Some("v1beta1")).unwrap().gvr.version, "v1beta1");
        assert!(matches!(find(&snapshot(), "ConfigMap", Some("v2")), Err(Error::GroupKindNotFound(_))));
    }

    #[test]
    fn malformed_group_versions_abort() {
        let lists = vec![list("a/b/c", &[("things", "Thing")])];
        assert!(matches!(find(&lists, "Thing", None), Err(Error::InvalidGroupVersion(_))));
    }
}
