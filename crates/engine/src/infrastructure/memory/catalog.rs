//! In-memory NPC definition catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use npc_domain::{NpcDefinition, NpcDefinitionId};
use tokio::sync::RwLock;

use crate::infrastructure::ports::{NpcDefinitionRepo, RepoError};

#[derive(Default)]
pub struct InMemoryCatalog {
    definitions: RwLock<HashMap<NpcDefinitionId, NpcDefinition>>,
}

impl InMemoryCatalog {
    pub fn new(definitions: impl IntoIterator<Item = NpcDefinition>) -> Self {
        Self {
            definitions: RwLock::new(
                definitions
                    .into_iter()
                    .map(|definition| (definition.id, definition))
                    .collect(),
            ),
        }
    }

    pub async fn insert(&self, definition: NpcDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.id, definition);
    }

    /// Parse a JSON array of definitions.
    pub fn from_json(json: &str) -> Result<Self, RepoError> {
        let definitions: Vec<NpcDefinition> =
            serde_json::from_str(json).map_err(|e| RepoError::storage("from_json", e))?;
        Ok(Self::new(definitions))
    }
}

#[async_trait]
impl NpcDefinitionRepo for InMemoryCatalog {
    async fn get(&self, id: NpcDefinitionId) -> Result<Option<NpcDefinition>, RepoError> {
        Ok(self.definitions.read().await.get(&id).cloned())
    }

    /// Definitions ordered by name.
    async fn list_all(&self) -> Result<Vec<NpcDefinition>, RepoError> {
        let mut definitions: Vec<NpcDefinition> =
            self.definitions.read().await.values().cloned().collect();
        definitions.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(definitions)
    }
}
