//! WARDEN Core - Shared Types
//!
//! Entities, errors, configuration and the small runtime seams (clock,
//! provenance, coordinator probe) that every WARDEN crate depends on.
//! No component logic lives here.

pub mod config;
pub mod constants;
pub mod entities;
pub mod enums;
pub mod error;
pub mod health;
pub mod identity;
pub mod probe;
pub mod provenance;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use probe::*;
pub use provenance::{current_origins, in_origin};
