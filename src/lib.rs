//! netspeed — live network throughput sampling with persisted hourly and
//! daily usage totals.
//!
//! The core is UI-agnostic:
//!   - [`system::counters`]: OS byte counters (total or per adapter)
//!   - [`system::sampler`]: counter deltas to rates, with adapter fallback
//!   - [`system::usage`]: hourly/daily aggregation with day rollover
//!   - [`system::rate_buffer`]: bounded rolling window for graphs
//!   - [`system::store`]: CSV persistence
//!   - [`system::engine`]: the sampling thread and its tick queue

pub mod config;
pub mod error;
pub mod logging;
pub mod system;

pub use error::{NetError, Result};
