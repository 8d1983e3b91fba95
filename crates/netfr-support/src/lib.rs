//! Shared infrastructure used by every other `netfr` crate: the closed error
//! taxonomy, process-wide logging, wrap-safe serial arithmetic, and wire
//! constants.
//!
//! This plays the same role for `netfr-core`/`netfr-proto`/`netfr-fabric`
//! that `flux` plays for `neutronium` in the teacher repo: a dependency-free
//! leaf crate the rest of the workspace builds on.

pub mod constants;
pub mod error;
pub mod logging;
pub mod serial;

pub use error::{NetfrError, NetfrResult};
