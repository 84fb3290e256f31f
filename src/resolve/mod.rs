//! Reference Resolution Module
//!
//! Turns `pvc:` and `pod:` command line references into LINSTOR resource
//! names by reading PVCs and pods from the cluster.

pub mod claim;
pub mod expander;
pub mod lookup;
pub mod pod;

pub use claim::*;
pub use expander::*;
pub use lookup::*;
pub use pod::*;
