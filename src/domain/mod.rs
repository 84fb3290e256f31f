//! Domain layer - Core types and port definitions
//!
//! This module defines the references, endpoints and collaborator traits
//! (ports) that the kubectl adapter implements.

pub mod ports;

pub use ports::*;
