//! Common utilities module
//!
//! Error types and stage timing shared across the screening pipeline.

pub mod error;
pub mod timing;

pub use error::{ErrorKind, NotReadyReason, PipelineError, Result};
pub use timing::{PipelineTimings, StageTiming, Timer};
