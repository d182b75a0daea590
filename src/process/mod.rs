// src/process/mod.rs
//! Lakhs → crores conversion of report CSVs.

pub mod rescale;
pub mod transform;
pub mod utils;

pub use rescale::{rescale, rescale_text, Rescaled};
pub use transform::{TabularTransformer, TransformReport, TransformResult, OUTPUT_PREFIX};
