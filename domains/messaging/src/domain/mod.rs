//! Domain layer for Messaging: entities, send lifecycle, merge and selection

pub mod entities;
pub mod merge;
pub mod selection;
pub mod state;
