//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! repositories, check and analysis results, pipelines, and their configuration.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod repository;
pub mod result;
pub mod state;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use repository::*;
pub use result::*;
pub use state::*;
