//! Two-port SOLT calibration
//!
//! - `terms` - the 12-term error model and its per-frequency vectors
//! - `standards` - bookkeeping of the seven standard measurements
//! - `solt` - solving terms from standards and applying them
//! - `store` - the term set owned by a session
//! - `io` - calibration text files

pub mod io;
pub mod solt;
pub mod standards;
pub mod store;
pub mod terms;

pub use io::CalibrationFile;
pub use solt::{apply, solve_one_port, OnePortTerms};
pub use standards::{CalibrationStep, StandardModels, StandardSet};
pub use store::CalibrationStore;
pub use terms::{CalibrationTermSet, ErrorTerms, TERM_NAMES};
