//! NPC actor runtime.
//!
//! - `ThreadManager` - one tokio task per active NPC
//! - `CommunicationBridge` - world <-> NPC notification routing
//! - `LifecycleManager` - spawn/despawn/respawn bookkeeping
//! - `StartupQueue` - spawns requested before the engine is ready

pub mod behavior;
pub mod bridge;
pub mod lifecycle;
pub mod startup;
pub mod thread_manager;
mod unit;

#[cfg(test)]
pub(crate) mod test_support;

pub use behavior::NpcBehavior;
pub use bridge::{BridgeMessage, CommunicationBridge};
pub use lifecycle::{ActiveNpc, LifecycleManager, NpcStatus, NpcStatusReport};
pub use startup::{SpawnOutcome, StartupError, StartupQueue, DEFAULT_STARTUP_QUEUE_CAPACITY};
pub use thread_manager::{
    ThreadManager, ThreadManagerError, ThreadManagerStats, DEFAULT_STOP_TIMEOUT,
    DEFAULT_TICK_INTERVAL,
};

#[cfg(test)]
pub use behavior::MockNpcBehavior;
