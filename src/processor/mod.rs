//! # Task processing pipeline.
//!
//! The processor ties the durable store, the admission gate, the circuit
//! breaker, metrics, and the event system into one lifecycle:
//!
//! ```text
//! persist ─► admit ─► execute ─► remove (success) / keep (failure)
//!    │          │         │
//!    └──────────┴─────────┴──► events (queued / started / completed / failed)
//! ```
//!
//! Construction goes through [`ProcessorBuilder`]; application logic plugs
//! in via [`Handler`] (or the closure-backed [`HandlerFn`]).

mod builder;
mod core;
mod handler;

pub use builder::{BuildError, ProcessorBuilder};
pub use core::{RecoveryReport, TaskProcessor};
pub use handler::{Handler, HandlerFn, HandlerRef};
