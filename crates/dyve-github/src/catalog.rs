use std::sync::Arc;

use dyve_core::{EntityRef, HierarchyStore, Node, StoreError};

use crate::model::TeamInfo;

/// Read side over the reconciled teams.
#[derive(Clone)]
pub struct GitHubCatalog {
    store: Arc<dyn HierarchyStore>,
}

impl GitHubCatalog {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self { store }
    }

    pub async fn list_teams(&self) -> Result<Vec<TeamInfo>, StoreError> {
        self.store
            .list(&TeamInfo::KIND)
            .await?
            .into_iter()
            .map(|e| serde_json::from_value(e.info).map_err(StoreError::from))
            .collect()
    }

    pub async fn get_team(&self, guid: &str) -> Result<TeamInfo, StoreError> {
        let reference = EntityRef::new(TeamInfo::KIND, guid);
        let entity = self
            .store
            .get(&reference)
            .await?
            .ok_or_else(|| StoreError::not_found(reference))?;
        Ok(serde_json::from_value(entity.info)?)
    }
}
