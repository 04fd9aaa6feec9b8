//! Asset-catalog capability: enumerate the renditions stored in a compiled catalog.
//!
//! Catalog parsing is an external collaborator. The helper only consumes the rendition list;
//! builds without a parser wire [`UnavailableCatalogReader`].

use std::path::Path;

use crate::error::{HelperError, HelperResult};

/// One image or data item stored in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Rendition name, used as the output file name.
    pub name: String,
    /// Raw item data; `None` for renditions that carry no extractable payload.
    pub data: Option<Vec<u8>>,
}

impl Rendition {
    /// Rendition with a payload.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Some(data.into()),
        }
    }
}

/// Enumerates catalog renditions.
pub trait CatalogReader {
    /// Read every rendition of the catalog at `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot be opened or parsed.
    fn renditions(&self, catalog: &Path) -> HelperResult<Vec<Rendition>>;
}

/// Reader for builds without a catalog parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCatalogReader;

impl CatalogReader for UnavailableCatalogReader {
    fn renditions(&self, _catalog: &Path) -> HelperResult<Vec<Rendition>> {
        Err(HelperError::CapabilityUnavailable {
            capability: "asset_catalog",
        })
    }
}
