//! Domain model module declarations.

pub mod snapshot;
pub mod stage;
