//! # rustpubcat
//!
//! Publication identity resolution and categorization for a research group
//! website.
//!
//! ## Modules
//!
//! - [`normalizer`] / [`record`] - member artifacts into canonical records
//! - [`identity`] / [`dedup`] - stable identity keys and cross-member dedup
//! - [`classify`] - override, structured mapping, keyword and statistical layers
//! - [`scorer`] - zero-shot scorer backends
//! - [`output`] - compact and verbose category tables
//! - [`pipeline`] - one full classification run
//! - [`semanticscholar`] - member snapshot fetch
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpubcat::config::{ClassifierConfig, RunPaths};
//! use rustpubcat::pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let paths = RunPaths::from_root(std::path::Path::new("."));
//!     let summary = pipeline::run(&paths, &ClassifierConfig::default(), None).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod identity;
pub mod labels;
pub mod normalizer;
pub mod output;
pub mod overrides;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod scorer;
pub mod semanticscholar;

#[cfg(test)]
mod test_support;

pub use error::{PubcatError, Result};
