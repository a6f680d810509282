//! In-memory adapters for the catalog and movement ports.

mod catalog;
mod world;

pub use catalog::InMemoryCatalog;
pub use world::{InMemoryWorld, Room};
