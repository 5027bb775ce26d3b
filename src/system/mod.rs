pub mod counters;
pub mod engine;
pub mod rate_buffer;
pub mod sampler;
pub mod store;
pub mod units;
pub mod usage;
