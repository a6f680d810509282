//! Use cases - what NPCs do.

pub mod npc;
