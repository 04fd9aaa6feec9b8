#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-backed configuration for the fsgate helper and dispatch front end.
//!
//! Layout: `defaults.rs` (variable names and fallback values), `model.rs` (typed
//! configuration), `loader.rs` (lookup-driven loading and validation), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{DispatchConfig, HelperConfig};
