//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: writes articles, comments and article texts as JSON, and reads
//!   previous runs back for resumption

pub mod json;
