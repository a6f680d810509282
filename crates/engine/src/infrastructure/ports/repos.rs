//! Catalog port trait for NPC definitions.

use async_trait::async_trait;
use npc_domain::{NpcDefinition, NpcDefinitionId};

use super::error::RepoError;

// =============================================================================
// Definition Catalog
// =============================================================================

/// Read-only access to NPC definitions. The engine never writes these back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NpcDefinitionRepo: Send + Sync {
    async fn get(&self, id: NpcDefinitionId) -> Result<Option<NpcDefinition>, RepoError>;
    async fn list_all(&self) -> Result<Vec<NpcDefinition>, RepoError>;
}
