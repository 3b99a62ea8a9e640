//! Read side over the reconciled Cloud Foundry snapshots.

use std::sync::Arc;

use dyve_core::{EntityRef, HierarchyStore, Node, StoreError};

use crate::model::{AppInfo, OrgInfo, SpaceInfo};

/// Typed queries against the hierarchy store.
#[derive(Clone)]
pub struct CloudFoundryCatalog {
    store: Arc<dyn HierarchyStore>,
}

impl CloudFoundryCatalog {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self { store }
    }

    async fn list<T: Node>(&self) -> Result<Vec<T>, StoreError> {
        self.store
            .list(&T::KIND)
            .await?
            .into_iter()
            .map(|e| serde_json::from_value(e.info).map_err(StoreError::from))
            .collect()
    }

    async fn get<T: Node>(&self, guid: &str) -> Result<T, StoreError> {
        let reference = EntityRef::new(T::KIND, guid);
        let entity = self
            .store
            .get(&reference)
            .await?
            .ok_or_else(|| StoreError::not_found(reference))?;
        Ok(serde_json::from_value(entity.info)?)
    }

    pub async fn list_orgs(&self) -> Result<Vec<OrgInfo>, StoreError> {
        self.list().await
    }

    pub async fn get_org(&self, guid: &str) -> Result<OrgInfo, StoreError> {
        self.get(guid).await
    }

    pub async fn list_spaces(&self) -> Result<Vec<SpaceInfo>, StoreError> {
        self.list().await
    }

    pub async fn get_space(&self, guid: &str) -> Result<SpaceInfo, StoreError> {
        self.get(guid).await
    }

    pub async fn list_apps(&self) -> Result<Vec<AppInfo>, StoreError> {
        self.list().await
    }

    pub async fn get_app(&self, guid: &str) -> Result<AppInfo, StoreError> {
        self.get(guid).await
    }
}
