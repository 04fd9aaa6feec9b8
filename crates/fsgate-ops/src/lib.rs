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

//! Operation descriptors and the wire protocol shared by the fsgate front end and the
//! privileged helper.
//!
//! Layout: `model.rs` (descriptor types), `codec.rs` (encode/decode with per-kind
//! validation), `result.rs` (execution outcomes), `report.rs` (exit codes and the
//! diagnostic report line), `error.rs` (codec errors).

pub mod codec;
pub mod error;
pub mod model;
pub mod report;
pub mod result;

pub use codec::{decode, encode};
pub use error::{DecodeError, EncodeError};
pub use model::{ArchiveFormat, BytePayload, OperationDescriptor, OperationKind};
pub use report::{HelperExit, REPORT_PREFIX, parse_report, render_report};
pub use result::{ExecutionResult, ItemFailures};
