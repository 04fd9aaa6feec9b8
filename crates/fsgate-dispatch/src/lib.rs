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
#![allow(clippy::module_name_repetitions)]

//! Restricted-privilege front end for fsgate.
//!
//! Builds one descriptor per request, writes it to a private transport file, launches the
//! privileged helper and turns its report into an [`fsgate_ops::ExecutionResult`].
//!
//! Layout: `dispatcher.rs` (command surface and output interpretation), `transport.rs`
//! (transport files), `launcher.rs` (process launch seam), `error.rs`.

pub mod dispatcher;
pub mod error;
pub mod launcher;
pub mod transport;

pub use dispatcher::{Dispatcher, interpret};
pub use error::{DispatchError, DispatchResult};
pub use launcher::{HelperLauncher, HelperOutput, ProcessLauncher};
pub use transport::{TransportFile, TransportWriter};
