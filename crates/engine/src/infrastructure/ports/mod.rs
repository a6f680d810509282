//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions the engine depends on. Ports exist for:
//! - The NPC definition catalog (read-only)
//! - World movement (room exits, sub-zone boundaries, relocation)
//! - Combat awareness (optional)
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Catalog Ports
// =============================================================================
pub use repos::NpcDefinitionRepo;

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{CombatAwarenessPort, MovementPort};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{MockCombatAwarenessPort, MockMovementPort};

#[cfg(test)]
pub use repos::MockNpcDefinitionRepo;

#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{IntegrationError, RepoError};
