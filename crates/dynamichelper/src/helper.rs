//! The reconciliation engine.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use aro_core::{meta, Document, GroupKind, GroupVersion, GroupVersionResource, ResourceKey};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::ResourceClient;
use crate::error::{Error, Result};
use crate::ordering::OrderingPolicy;
use crate::policy::UpdatePolicy;
use crate::resolve::{self, ApiTarget};
use crate::retry::{retry_with_backoff_if, RetryConfig};
use crate::{clean, defaults, diff, hash, immutable};

/// What reconciling one object did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Create-or-update engine for schema-less objects.
///
/// The discovery snapshot is fetched at construction and replaced only by
/// [`DynamicHelper::refresh_api_resources`]; resolutions read whichever
/// snapshot is current. Objects are reconciled one at a time.
pub struct DynamicHelper {
    client: Arc<dyn ResourceClient>,
    policy: UpdatePolicy,
    ordering: OrderingPolicy,
    conflict_retry: RetryConfig,
    discovery_retry: RetryConfig,
    api_resources: ArcSwap<Vec<APIResourceList>>,
}

impl DynamicHelper {
    /// Build the engine and take a first discovery snapshot.
    pub async fn new(client: Arc<dyn ResourceClient>, policy: UpdatePolicy) -> Result<Self> {
        let lists = client.server_groups_and_resources().await?;
        Ok(Self::with_api_resources(client, policy, lists))
    }

    /// Build the engine from a snapshot the caller already holds.
    pub fn with_api_resources(client: Arc<dyn ResourceClient>, policy: UpdatePolicy, lists: Vec<APIResourceList>) -> Self {
        Self {
            client,
            policy,
            ordering: OrderingPolicy::default(),
            conflict_retry: RetryConfig::conflict(),
            discovery_retry: RetryConfig::discovery(),
            api_resources: ArcSwap::from_pointee(lists),
        }
    }

    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_retry(mut self, conflict: RetryConfig, discovery: RetryConfig) -> Self {
        self.conflict_retry = conflict;
        self.discovery_retry = discovery;
        self
    }

    pub fn policy(&self) -> &UpdatePolicy {
        &self.policy
    }

    pub fn api_resources(&self) -> Arc<Vec<APIResourceList>> {
        self.api_resources.load_full()
    }

    pub async fn refresh_api_resources(&self) -> Result<()> {
        let lists = self.client.server_groups_and_resources().await?;
        debug!(lists = lists.len(), "api resources refreshed");
        self.api_resources.store(Arc::new(lists));
        Ok(())
    }

    /// Resolve `group_kind` (`Kind` or `Kind.group`) against the current
    /// snapshot.
    pub fn resolve(&self, group_kind: &str, version: Option<&str>) -> Result<GroupVersionResource> {
        self.find(group_kind, version).map(|t| t.gvr)
    }

    fn find(&self, group_kind: &str, version: Option<&str>) -> Result<ApiTarget> {
        resolve::find(&self.api_resources.load(), group_kind, version)
    }

    /// Like [`Self::find`], but when the policy asks for it a kind that is
    /// not served yet triggers a discovery refresh and another attempt.
    async fn find_with_refresh(&self, group_kind: &str, version: Option<&str>) -> Result<ApiTarget> {
        if !self.policy.refresh_api_resources_on_not_found {
            return self.find(group_kind, version);
        }
        retry_with_backoff_if(
            &self.discovery_retry,
            "resolve",
            |e: &Error| matches!(e, Error::GroupKindNotFound(_)),
            || async move {
                match self.find(group_kind, version) {
                    Err(Error::GroupKindNotFound(gk)) => {
                        info!(group_kind = %gk, "refreshing api resources");
                        self.refresh_api_resources().await?;
                        Err(Error::GroupKindNotFound(gk))
                    }
                    other => other,
                }
            },
        )
        .await
    }

    pub async fn get(&self, group_kind: &str, namespace: &str, name: &str) -> Result<Document> {
        let target = self.find(group_kind, None)?;
        self.client.get(&target, namespace, name).await
    }

    pub async fn list(&self, group_kind: &str, namespace: &str) -> Result<Document> {
        let target = self.find(group_kind, None)?;
        self.client.list(&target, namespace).await
    }

    pub async fn delete(&self, group_kind: &str, namespace: &str, name: &str) -> Result<()> {
        let target = self.find(group_kind, None)?;
        self.client.delete(&target, namespace, name).await
    }

    /// Delete, treating an already-absent object as success.
    pub async fn ensure_deleted(&self, group_kind: &str, namespace: &str, name: &str) -> Result<()> {
        match self.delete(group_kind, namespace, name).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Put a namespaced object that names no namespace into `namespace`.
    /// Cluster-scoped kinds, and kinds the snapshot does not serve yet, are
    /// left as they are.
    pub fn default_namespace(&self, doc: &mut Document, namespace: &str) -> Result<()> {
        if namespace.is_empty() || meta::namespace(doc).is_some() {
            return Ok(());
        }
        let group_kind = GroupKind::of(doc)?;
        let version = GroupVersion::parse(meta::api_version(doc).unwrap_or(""))?.version;
        match self.find(&group_kind.to_string(), Some(&version)) {
            Ok(target) if target.namespaced => {
                meta::set_namespace(doc, namespace);
                Ok(())
            }
            Ok(_) | Err(Error::GroupKindNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Bring one object to the state `desired` describes.
    pub async fn create_or_update(&self, desired: &Document) -> Result<Outcome> {
        let key = ResourceKey::of(desired)?;
        if key.group_kind.kind.is_empty() || key.name.is_empty() {
            return Err(Error::invalid_object(format!("{key}: kind and metadata.name are required")));
        }
        let api_version = meta::api_version(desired).unwrap_or("");
        let version = GroupVersion::parse(api_version)?.version;
        let target = self.find_with_refresh(&key.group_kind.to_string(), Some(&version)).await?;

        let t0 = Instant::now();
        let res = if self.policy.retry_on_conflict {
            retry_with_backoff_if(&self.conflict_retry, "create_or_update", Error::is_conflict, || {
                self.reconcile_once(&target, &key, desired)
            })
            .await
        } else {
            self.reconcile_once(&target, &key, desired).await
        };
        histogram!("dynamichelper_reconcile_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(Outcome::Created) => counter!("dynamichelper_creates", 1u64),
            Ok(Outcome::Updated) => counter!("dynamichelper_updates", 1u64),
            Ok(Outcome::Unchanged) => counter!("dynamichelper_unchanged", 1u64),
            Err(_) => counter!("dynamichelper_errors", 1u64),
        }
        res
    }

    async fn reconcile_once(&self, target: &ApiTarget, key: &ResourceKey, desired: &Document) -> Result<Outcome> {
        let existing = match self.client.get(target, &key.namespace, &key.name).await {
            Ok(doc) => doc,
            Err(e) if e.is_not_found() => {
                info!(key = %key, "Create");
                self.client.create(target, &key.namespace, desired).await?;
                return Ok(Outcome::Created);
            }
            Err(e) => return Err(e),
        };

        let mut desired = desired.clone();
        if self.policy.avoid_unnecessary_updates {
            immutable::preserve_immutable_fields(&existing, &mut desired);
            clean::handle_special_objects(&existing, &mut desired);
            if !self.changed(&existing, &desired) {
                debug!(key = %key, "Unchanged");
                return Ok(Outcome::Unchanged);
            }
        } else {
            meta::set_resource_version(&mut desired, meta::resource_version(&existing));
            immutable::preserve_injected_ca_bundle(&existing, &mut desired);
        }

        info!(key = %key, "Update");
        if self.policy.logs_changes_for(&key.group_kind) {
            diff::log_changes(key, &existing, &desired);
        }
        self.client.update(target, &key.namespace, &desired).await?;
        Ok(Outcome::Updated)
    }

    fn changed(&self, existing: &Document, desired: &Document) -> bool {
        if !self.policy.ignore_defaults {
            return diff::needs_update(existing, desired);
        }
        let (mut live, mut want) = (existing.clone(), desired.clone());
        defaults::normalize(&mut live);
        defaults::normalize(&mut want);
        diff::needs_update(&live, &want)
    }

    fn prepare(&self, mut objs: Vec<Document>) -> Vec<Document> {
        hash::hash_workload_configs(&mut objs);
        self.ordering.sort(&mut objs);
        objs
    }

    /// Reconcile a batch in apply order, stopping at the first failure.
    pub async fn ensure(&self, objs: Vec<Document>) -> Result<Vec<(ResourceKey, Outcome)>> {
        let objs = self.prepare(objs);
        let mut out = Vec::with_capacity(objs.len());
        for obj in &objs {
            let outcome = self.create_or_update(obj).await?;
            out.push((ResourceKey::of(obj)?, outcome));
        }
        Ok(out)
    }

    /// Reconcile a batch in apply order, carrying on past failures.
    pub async fn ensure_each(&self, objs: Vec<Document>) -> Vec<(ResourceKey, Result<Outcome>)> {
        let objs = self.prepare(objs);
        let mut out = Vec::with_capacity(objs.len());
        for obj in &objs {
            let key = ResourceKey::of(obj).unwrap_or_default();
            out.push((key, self.create_or_update(obj).await));
        }
        out
    }

    /// Convert a typed object (e.g. a `k8s_openapi` Deployment) into a
    /// document ready for creation.
    pub fn to_document<T: Serialize>(typed: &T) -> Result<Document> {
        let mut doc = serde_json::to_value(typed)?;
        if !doc.is_object() {
            return Err(Error::invalid_object("expected a serialised object"));
        }
        clean::clean_new_object(&mut doc);
        Ok(doc)
    }
}
