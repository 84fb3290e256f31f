//! Controller Discovery Module
//!
//! Locates the LINSTOR controller inside the cluster.

pub mod locator;

pub use locator::*;
