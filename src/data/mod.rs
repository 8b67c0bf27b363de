//! Input datasets and the on-disk directory layout.

pub mod dataset;
pub mod layout;
