//! Plan normalization and progression gating for rituals.
//!
//! - [`plan`] coerces an untrusted LLM proposal into a canonical,
//!   exact-length [`ritual_model::Plan`].
//! - [`state`] derives locked/active/completed step states from a plan and
//!   a [`ritual_model::Progress`] record, and records attempt outcomes.
//!
//! Everything here is synchronous and free of I/O.

pub mod plan;
pub mod state;
