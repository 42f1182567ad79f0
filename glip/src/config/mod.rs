//! Configuration loading for glip-burn.
//!
//! Two pieces: [`ProfileCatalog`] translates symbolic experiment names into
//! on-disk profile locations, and [`ConfigDocument`] exposes a loaded profile
//! as an immutable hierarchical document the assembler reads.

mod catalog;
mod document;

pub use catalog::ProfileCatalog;
pub use document::ConfigDocument;
