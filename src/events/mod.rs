//! Processor events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the processing pipeline and the
//! monitor loop.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the `TaskProcessor` pipeline (queued/started/completed/
//!   failed) and its monitor loop (metrics reports).
//! - **Consumers**: receivers from `TaskProcessor::subscribe()`, plus the
//!   [`SubscriberSet`](crate::SubscriberSet) fan-out fed directly by the
//!   processor.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
