//! In-memory API server for exercising the engine without a cluster.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aro_core::{meta, Document};
use aro_dynamichelper::{ApiTarget, DynamicHelper, Error, ResourceClient, Result, UpdatePolicy};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use serde_json::{json, Value};

type StoreKey = (String, String, String, String);

pub fn resource_list(gv: &str, resources: &[(&str, &str, bool)]) -> APIResourceList {
    APIResourceList {
        group_version: gv.into(),
        resources: resources
            .iter()
            .map(|(name, kind, namespaced)| APIResource {
                name: (*name).into(),
                kind: (*kind).into(),
                namespaced: *namespaced,
                ..Default::default()
            })
            .collect(),
    }
}

pub fn snapshot() -> Vec<APIResourceList> {
    vec![
        resource_list(
            "v1",
            &[
                ("configmaps", "ConfigMap", true),
                ("namespaces", "Namespace", false),
                ("secrets", "Secret", true),
                ("serviceaccounts", "ServiceAccount", true),
                ("services", "Service", true),
                ("services/status", "Service", true),
            ],
        ),
        resource_list(
            "apps/v1",
            &[
                ("daemonsets", "DaemonSet", true),
                ("deployments", "Deployment", true),
                ("deployments/scale", "Scale", true),
                ("statefulsets", "StatefulSet", true),
            ],
        ),
        resource_list(
            "rbac.authorization.k8s.io/v1",
            &[("clusterroles", "ClusterRole", false), ("clusterrolebindings", "ClusterRoleBinding", false)],
        ),
        resource_list("metal3.io/v1alpha1", &[("baremetalhosts", "BareMetalHost", true)]),
        resource_list("plastic.io/v1alpha1", &[("baremetalhosts", "BareMetalHost", true)]),
    ]
}

#[derive(Default)]
pub struct FakeClient {
    objects: Mutex<BTreeMap<StoreKey, Document>>,
    lists: Mutex<Vec<APIResourceList>>,
    /// Lists that appear on the next discovery call, like a CRD registering.
    pending: Mutex<Vec<APIResourceList>>,
    log: Mutex<Vec<String>>,
    next_rv: AtomicUsize,
    pub discoveries: AtomicUsize,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub conflicts_to_inject: AtomicUsize,
    pub fail_discovery: std::sync::atomic::AtomicBool,
}

impl FakeClient {
    pub fn new(lists: Vec<APIResourceList>) -> Arc<Self> {
        let fake = Self::default();
        *fake.lists.lock().unwrap() = lists;
        fake.next_rv.store(100, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub fn register_later(&self, list: APIResourceList) {
        self.pending.lock().unwrap().push(list);
    }

    pub fn helper(self: &Arc<Self>, policy: UpdatePolicy) -> DynamicHelper {
        let lists = self.lists.lock().unwrap().clone();
        DynamicHelper::with_api_resources(self.clone(), policy, lists)
    }

    /// Seed a live object as the server would hold it.
    pub fn insert(&self, group: &str, resource: &str, doc: Document) {
        let key = (
            group.to_string(),
            resource.to_string(),
            meta::namespace(&doc).unwrap_or("").to_string(),
            meta::name(&doc).unwrap_or("").to_string(),
        );
        self.objects.lock().unwrap().insert(key, doc);
    }

    pub fn stored(&self, group: &str, resource: &str, namespace: &str, name: &str) -> Option<Document> {
        let key = (group.to_string(), resource.to_string(), namespace.to_string(), name.to_string());
        self.objects.lock().unwrap().get(&key).cloned()
    }

    /// `create <resource>/<name>` and `update <resource>/<name>`, in call order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn key(target: &ApiTarget, namespace: &str, name: &str) -> StoreKey {
        let ns = if target.namespaced { namespace } else { "" };
        (target.gvr.group.clone(), target.gvr.resource.clone(), ns.to_string(), name.to_string())
    }

    fn bump_rv(&self) -> String {
        (self.next_rv.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn server_groups_and_resources(&self) -> Result<Vec<APIResourceList>> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(Error::Discovery("apiserver unavailable".into()));
        }
        let mut lists = self.lists.lock().unwrap();
        lists.append(&mut self.pending.lock().unwrap());
        Ok(lists.clone())
    }

    async fn get(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<Document> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&Self::key(target, namespace, name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{} \"{}\" not found", target.gvr.resource, name)))
    }

    async fn list(&self, target: &ApiTarget, namespace: &str) -> Result<Document> {
        let items: Vec<Value> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((g, r, ns, _), _)| {
                *g == target.gvr.group && *r == target.gvr.resource && (namespace.is_empty() || ns == namespace)
            })
            .map(|(_, v)| v.clone())
            .collect();
        Ok(json!({"apiVersion": "v1", "kind": "List", "items": items}))
    }

    async fn create(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document> {
        let name = meta::name(obj).unwrap_or("").to_string();
        let key = Self::key(target, namespace, &name);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(Error::AlreadyExists(name));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("create {}/{}", target.gvr.resource, name));

        let mut live = obj.clone();
        let rv = self.bump_rv();
        if let Some(md) = meta::metadata_mut(&mut live) {
            md.insert("resourceVersion".into(), json!(rv));
            md.insert("uid".into(), json!(format!("uid-{name}")));
            md.insert("creationTimestamp".into(), json!("2024-01-01T00:00:00Z"));
            md.insert("generation".into(), json!(1));
        }
        if live.get("spec").is_some() {
            live["status"] = json!({"observedGeneration": 1});
        }
        objects.insert(key, live.clone());
        Ok(live)
    }

    async fn update(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let name = meta::name(obj).unwrap_or("").to_string();
        if self
            .conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Conflict(format!("the object \"{name}\" has been modified")));
        }

        let key = Self::key(target, namespace, &name);
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get(&key) else {
            return Err(Error::NotFound(name));
        };
        if meta::resource_version(obj) != meta::resource_version(current) {
            return Err(Error::Conflict(format!("stale resourceVersion for \"{name}\"")));
        }

        let mut live = obj.clone();
        let rv = self.bump_rv();
        if let Some(md) = meta::metadata_mut(&mut live) {
            md.insert("resourceVersion".into(), json!(rv));
            for field in ["uid", "creationTimestamp", "generation"] {
                if let Some(v) = current.get("metadata").and_then(|m| m.get(field)) {
                    md.insert(field.into(), v.clone());
                }
            }
        }
        if let Some(status) = current.get("status") {
            live["status"] = status.clone();
        }
        self.log.lock().unwrap().push(format!("update {}/{}", target.gvr.resource, name));
        objects.insert(key, live.clone());
        Ok(live)
    }

    async fn delete(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&Self::key(target, namespace, name))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

pub fn config_map(ns: &str, name: &str, data: Value) -> Document {
    json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": name, "namespace": ns}, "data": data})
}

pub fn deployment(ns: &str, name: &str, image: &str) -> Document {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": ns},
        "spec": {
            "replicas": 1,
            "selector": {"matchLabels": {"app": name}},
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {"containers": [{"name": name, "image": image}]},
            },
        },
    })
}
