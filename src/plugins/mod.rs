//! Orchestrators built on the gate library.
//!
//! - `pipeline`: integrity battery over one export directory.
//! - `diagnose`: the ordered three-question diagnostic.
//! - `pilot`: deterministic ten-span trace with fault injection.

pub mod diagnose;
pub mod pilot;
pub mod pilot_fixture;
pub mod pipeline;
