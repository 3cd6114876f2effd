//! Transformation module.
//!
//! - Reshape: wide column pairs to long `(setup, voltage, current)` records
//! - Pipeline: parse → reshape with progress logging

pub mod pipeline;
pub mod reshape;

pub use pipeline::*;
pub use reshape::{
    required_columns, reshape, reshape_with_report, ReshapeReport, SetupReport,
};
