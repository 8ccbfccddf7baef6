//! Post-processes a Firefox profiler capture by replacing raw `0xHEX`
//! address tokens in thread string tables with symbols resolved through
//! an external addr2line-style tool, run against the profiled libraries'
//! own binaries.
//!
//! The pipeline: classify each address token by the library address
//! ranges recorded in the profile, translate it to a file-relative
//! offset, batch same-library offsets, resolve each batch with one
//! external process, and splice the results back into the string-table
//! slots they came from. Resolution failures degrade individual entries,
//! never the whole run.

pub mod classify;
pub mod error;
pub mod profile;
pub mod registry;
pub mod resolve;
pub mod symbolicate;

pub use classify::OffsetAdjustment;
pub use error::Error;
pub use profile::{load_profile, save_profile, Profile};
pub use symbolicate::{Symbolicator, DEFAULT_BATCH_SIZE};
