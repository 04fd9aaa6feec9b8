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

//! Privileged helper that performs exactly one fsgate operation per process.
//!
//! Layout: `verify.rs` (caller check), `privilege.rs` (one-way elevation), `transport.rs`
//! (descriptor input), `executor.rs` (operation semantics), `fsutil.rs` (filesystem
//! primitives), `archive.rs` and `catalog.rs` (external capabilities), `run.rs`
//! (stage orchestration), `error.rs`.

pub mod archive;
pub mod catalog;
pub mod error;
pub mod executor;
mod fsutil;
pub mod privilege;
pub mod run;
pub mod transport;
pub mod verify;

pub use archive::{ArchiveCodec, StandardArchiveCodec};
pub use catalog::{CatalogReader, Rendition, UnavailableCatalogReader};
pub use error::{HelperError, HelperResult};
pub use executor::Executor;
pub use privilege::{Elevated, IdentityControl, NixIdentityControl, PrivilegeAcquirer, ROOT_ID};
pub use run::{HelperOutcome, execute_invocation, run, run_authorized};
pub use transport::{DescriptorSource, TransportFile};
pub use verify::{
    Authorized, CallerIdentity, CallerVerifier, OsProcessInspector, ProcessInspector,
    TRUSTED_PARENT,
};
