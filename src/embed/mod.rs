//! Embedding keys, the disk-backed embedding cache, and reducers.

pub mod cache;
pub mod embedding;
pub mod key;
pub mod reduce;
