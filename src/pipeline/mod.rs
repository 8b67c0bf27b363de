//! Per-job orchestration of the embedding, sweep, and encode stages.

pub mod driver;
