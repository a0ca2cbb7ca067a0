//! Payload chunking.
//!
//! - [`HoleFinder`] - Detects runs of zeros long enough to be holes
//! - [`RollingChecksumReader`] - Fills buffers and reports chunk boundaries

mod holes;
mod rolling;

pub use holes::{HoleEvent, HoleFinder};
pub use rolling::{Fill, RollingChecksumReader};
