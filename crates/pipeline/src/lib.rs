//! # Humedal Pipeline
//!
//! The staged fusion pipeline that turns T annual land-cover grids and a
//! river network into the unified wetland/non-wetland product and the
//! differentiated wetland-type product.
//!
//! Every stage is a pure function from persisted inputs to persisted
//! outputs, executed strictly in dependency order against a
//! [`humedal_core::Store`]; a run can be suspended and resumed at any stage
//! boundary because each artifact is written atomically before the next
//! stage begins and reused when already present.

pub mod config;
pub mod naming;
pub mod stages;

pub use config::{NamingTags, WetlandConfig};
pub use naming::{OutputNaming, StageDir};
pub use stages::{AnnualGrid, Pipeline, PipelineProducts};
