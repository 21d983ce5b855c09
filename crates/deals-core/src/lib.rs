//! deals-core library: sales pipeline engine and activity timeline.
//!
//! # Conventions
//!
//! - **Engine**: `pipeline`, `forecast` and `timeline` are pure functions over
//!   snapshots; they borrow their inputs and return new values.
//! - **Time**: civil dates come from a [`clock::RequestContext`] resolved once
//!   per request in the configured business timezone.
//! - **Errors**: typed `thiserror` enums per module, unified by
//!   [`error::DealsError`]; `anyhow` only for config and file plumbing.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod timeline;

pub use clock::{BusinessCalendar, Clock, FixedClock, RequestContext, SystemClock};
pub use error::{DealsError, ErrorCode};
