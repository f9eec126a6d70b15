//! Background Tasks Module
//!
//! # Tasks
//! - Fallback sweep: drops expired fallback entries at configured intervals
//! - Scheduled invalidation: pattern or tag invalidation off the caller's path

mod cleanup;
mod invalidation;

pub use cleanup::spawn_cleanup_task;
pub use invalidation::{spawn_invalidation, Invalidation};
