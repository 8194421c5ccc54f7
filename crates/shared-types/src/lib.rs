//! # Shared Types Crate
//!
//! Domain entities and the cross-component error taxonomy for the
//! coordination plane. Every subsystem crate depends on this one; nothing
//! in this crate depends on a subsystem.

pub mod entities;
pub mod error;
pub mod ids;

pub use entities::*;
pub use error::{CoordinatorError, CoordinatorResult, ErrorKind};
pub use ids::*;
