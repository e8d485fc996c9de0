//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery
//! that delivers processor events to application code.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   TaskProcessor ── publish(Event) ──► SubscriberSet ──► per-subscriber queues
//!                          │                                    │
//!                          │                               ┌────┴─────┬────────┐
//!                          │                               ▼          ▼        ▼
//!                          │                           LogWriter   Custom    ...
//!                          │
//!                          └──► Bus (broadcast, for ad-hoc `subscribe()` receivers)
//! ```
//!
//! Attached subscribers get buffered, panic-isolated delivery through
//! [`SubscriberSet`]; ad-hoc consumers can instead poll a broadcast receiver
//! from `TaskProcessor::subscribe`.

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
