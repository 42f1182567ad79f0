//! Grounded language-image pre-training models for Burn.
//!
//! The crate is organized around a small number of seams:
//!
//! - [`registry`]: a keyed store of component builders, one registry per
//!   model role (visual backbone, language backbone, RPN head, RoI box
//!   feature extractor). [`modeling::ModelRegistries::with_builtins`]
//!   populates all four with the shipped implementations.
//! - [`config`]: YAML configuration documents with dotted-path option
//!   access, and a catalog of the pre-training profiles bundled with the
//!   crate.
//! - [`modeling`]: the component implementations and
//!   [`modeling::assemble`], which reads role choices out of a document and
//!   resolves them through the registries.
//!
//! ```no_run
//! use burn::backend::NdArray;
//!
//! use glip_burn::config::ProfileCatalog;
//! use glip_burn::modeling::{assemble, ModelRegistries};
//!
//! # fn main() -> glip_burn::GlipResult<()> {
//! let catalog = ProfileCatalog::new();
//! let cfg = catalog.load("glip_Swin_T_O365")?;
//!
//! let registries = ModelRegistries::<NdArray<f32>>::with_builtins()?;
//! let device = Default::default();
//! let model = assemble(&cfg, &registries, &device)?;
//! assert!(model.has_language_backbone());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod modeling;
pub mod ops;
pub mod registry;

pub use config::{ConfigDocument, ProfileCatalog};
pub use error::{GlipError, GlipResult};
pub use modeling::{assemble, GeneralizedVlrcnn, ModelRegistries};
pub use registry::Registry;

#[cfg(test)]
mod tests;
