//! Domain model for routes drawn over background images.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own input validation that must run before any persistence write.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Route point `order` is assigned by core, never by callers.

pub mod point;
pub mod route;
