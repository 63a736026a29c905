//! aro kubehub: client construction and API discovery snapshots.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use aro_core::{GroupVersion, GroupVersionError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;

/// Client for the current kubeconfig context or in-cluster service account.
pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client")
}

/// Every resource list the server advertises: the core group versions first,
/// then each API group version in the order the server lists them.
///
/// Group versions that fail to list (typically an unavailable aggregated
/// API) are skipped with a warning; failure to list the groups themselves is
/// an error.
pub async fn server_groups_and_resources(client: &Client) -> Result<Vec<APIResourceList>, kube::Error> {
    let mut out = Vec::new();

    let core = client.list_core_api_versions().await?;
    for version in &core.versions {
        match client.list_core_api_resources(version).await {
            Ok(mut list) => {
                if list.group_version.is_empty() {
                    list.group_version = version.clone();
                }
                out.push(list);
            }
            Err(e) => {
                counter!("kubehub_discovery_failures", 1u64);
                warn!(group_version = %version, error = %e, "skipping core version");
            }
        }
    }

    let groups = client.list_api_groups().await?;
    for group in &groups.groups {
        for gv in &group.versions {
            match client.list_api_group_resources(&gv.group_version).await {
                Ok(mut list) => {
                    if list.group_version.is_empty() {
                        list.group_version = gv.group_version.clone();
                    }
                    out.push(list);
                }
                Err(e) => {
                    counter!("kubehub_discovery_failures", 1u64);
                    warn!(group_version = %gv.group_version, error = %e, "skipping group version");
                }
            }
        }
    }
    debug!(lists = out.len(), "discovery snapshot fetched");
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl DiscoveredResource {
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Flatten a snapshot into one row per top-level resource, dropping
/// subresources (`pods/log`), sorted by group, version and kind.
pub fn flatten(lists: &[APIResourceList]) -> Result<Vec<DiscoveredResource>, GroupVersionError> {
    let mut out = Vec::new();
    for list in lists {
        let gv = GroupVersion::parse(&list.group_version)?;
        for r in list.resources.iter().filter(|r| !r.name.contains('/')) {
            out.push(DiscoveredResource {
                group: gv.group.clone(),
                version: gv.version.clone(),
                kind: r.kind.clone(),
                plural: r.name.clone(),
                namespaced: r.namespaced,
            });
        }
    }
    out.sort_by(|a, b| a.group.cmp(&b.group).then(a.version.cmp(&b.version)).then(a.kind.cmp(&b.kind)));
    Ok(out)
}

/// Fetch and flatten the served resources (incl. CRDs).
pub async fn discover(client: &Client) -> Result<Vec<DiscoveredResource>> {
    let lists = server_groups_and_resources(client).await.context("listing API resources")?;
    Ok(flatten(&lists)?)
}
