//! Command Forwarding Module
//!
//! Sends the user's command to the LINSTOR controller, or intercepts
//! `sos-report download` and fetches the report locally.

pub mod forwarder;
pub mod sos_report;

pub use forwarder::*;
pub use sos_report::*;
