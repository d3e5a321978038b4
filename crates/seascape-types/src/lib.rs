//! # Seascape Types Crate
//!
//! Value types that travel across the Seascape bus.
//!
//! ## Contents
//!
//! - **Topic**: 6-level hierarchical address
//!   (`organization.project.network_id.group.name.method`).
//! - **TopicFilter**: set-per-level predicate used to scope subscriptions
//!   and queries across many topics at once.
//! - **Envelopes**: `Request`, `Reply` and `Broadcast`, the three wire shapes.
//! - **Params**: JSON parameter map with typed accessors.
//!
//! ## Wire Boundary Rule
//!
//! A broadcast is encoded as `<topic><JSON reply>` with no separator, and the
//! decoder splits at the first `{`. Topic strings therefore never contain `{`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod errors;
pub mod filter;
pub mod params;
pub mod topic;

pub use envelope::{Broadcast, Envelope, Reply, ReplyStatus, Request};
pub use errors::*;
pub use filter::TopicFilter;
pub use params::Params;
pub use topic::Topic;
