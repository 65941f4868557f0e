//! Core library for the subtotal-tools command line application.
//!
//! Billing extracts with inconsistent column naming are normalised into a
//! canonical schema, their subtotal rows are extracted and summed, and one
//! workbook is assembled with a summary sheet plus, per source, the subtotal
//! table stacked above the untouched original. Reading and writing live under
//! [`io`], header resolution in [`schema`], extraction and aggregation in
//! [`extract`], the output layout in [`layout`], and the batch orchestration
//! in [`batch`].

pub mod batch;
pub mod coerce;
pub mod config;
pub mod error;
pub mod extract;
pub mod io;
pub mod layout;
pub mod model;
pub mod schema;

pub use config::{AliasDirectory, PipelineConfig};
pub use error::{FileError, Result, ToolError};
