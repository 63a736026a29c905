//! The seam between the engine and an API server.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::core::ApiResource;
use kube::Client;
use serde_json::json;

use crate::error::{Error, Result};
use crate::resolve::ApiTarget;
use aro_core::{meta, Document};

/// Dynamic CRUD by resolved resource. Namespace `""` addresses
/// cluster-scoped objects, or all namespaces for `list`.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// The full discovery snapshot, core group first.
    async fn server_groups_and_resources(&self) -> Result<Vec<APIResourceList>>;

    async fn get(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<Document>;

    /// A `List` document whose `items` are the objects.
    async fn list(&self, target: &ApiTarget, namespace: &str) -> Result<Document>;

    async fn create(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document>;

    async fn update(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document>;

    async fn delete(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<()>;
}

/// [`ResourceClient`] over `kube::Api<DynamicObject>`.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, target: &ApiTarget, namespace: &str) -> Api<DynamicObject> {
        let ar = ApiResource {
            group: target.gvr.group.clone(),
            version: target.gvr.version.clone(),
            api_version: target.gvr.group_version().to_string(),
            kind: target.kind.clone(),
            plural: target.gvr.resource.clone(),
        };
        if target.namespaced && !namespace.is_empty() {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        }
    }
}

fn to_dynamic(obj: &Document) -> Result<DynamicObject> {
    Ok(serde_json::from_value(obj.clone())?)
}

fn name_of(obj: &Document) -> Result<&str> {
    meta::name(obj).ok_or_else(|| Error::invalid_object("metadata.name is required"))
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn server_groups_and_resources(&self) -> Result<Vec<APIResourceList>> {
        aro_kubehub::server_groups_and_resources(&self.client).await.map_err(|e| Error::Discovery(e.to_string()))
    }

    async fn get(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<Document> {
        let obj = self.api(target, namespace).get(name).await?;
        Ok(serde_json::to_value(obj)?)
    }

    async fn list(&self, target: &ApiTarget, namespace: &str) -> Result<Document> {
        let list = self.api(target, namespace).list(&ListParams::default()).await?;
        let items = list.items.into_iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
        Ok(json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": {"resourceVersion": list.metadata.resource_version.unwrap_or_default()},
            "items": items,
        }))
    }

    async fn create(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document> {
        let created = self.api(target, namespace).create(&PostParams::default(), &to_dynamic(obj)?).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn update(&self, target: &ApiTarget, namespace: &str, obj: &Document) -> Result<Document> {
        let name = name_of(obj)?;
        let updated = self.api(target, namespace).replace(name, &PostParams::default(), &to_dynamic(obj)?).await?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn delete(&self, target: &ApiTarget, namespace: &str, name: &str) -> Result<()> {
        self.api(target, namespace).delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}
