//! The fixed catalog of shipped experiment profiles.
//!
//! Every named profile lives under the crate's own `configs/pretrain`
//! directory, resolved at compile time from the package location. Resolution
//! never depends on the process working directory: two invocations from
//! different directories see the same catalog.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::ConfigDocument;
use crate::error::{GlipError, GlipResult};

/// Root directory of the shipped configuration profiles.
const CONFIG_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/pretrain");

/// Profile names and their file names under [`CONFIG_ROOT`].
///
/// This table is the single source of truth for locating profiles; no other
/// code constructs profile paths.
const PROFILES: [(&str, &str); 5] = [
    ("coco", "_coco.yaml"),
    ("glip_A_Swin_T_O365", "glip_A_Swin_T_O365.yaml"),
    ("glip_Swin_T_O365", "glip_Swin_T_O365.yaml"),
    ("glip_Swin_T_O365_GoldG", "glip_Swin_T_O365_GoldG.yaml"),
    ("glip_Swin_L", "glip_Swin_L.yaml"),
];

/// Resolves symbolic experiment names to concrete profile locations.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: IndexMap<&'static str, PathBuf>,
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCatalog {
    /// Builds the fixed catalog.
    pub fn new() -> Self {
        let root = Path::new(CONFIG_ROOT);
        let profiles = PROFILES
            .iter()
            .map(|(name, file)| (*name, root.join(file)))
            .collect();
        Self { profiles }
    }

    /// Returns the profile path for a catalog name.
    ///
    /// # Errors
    ///
    /// Returns [`GlipError::UnknownProfile`] listing the catalog if `name` is
    /// not a known profile.
    pub fn resolve(&self, name: &str) -> GlipResult<&Path> {
        self.profiles
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| GlipError::UnknownProfile {
                name: name.to_owned(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Loads a profile into a [`ConfigDocument`].
    ///
    /// Catalog names are resolved through the fixed table; path-like
    /// arguments (carrying a separator or an extension) are treated as
    /// filesystem paths, so ad hoc profiles outside the catalog remain
    /// loadable. A bare name that is not in the catalog fails with
    /// [`GlipError::UnknownProfile`] listing the valid names.
    pub fn load(&self, name_or_path: &str) -> GlipResult<ConfigDocument> {
        let path = match self.resolve(name_or_path) {
            Ok(path) => path.to_owned(),
            Err(err) => {
                let candidate = Path::new(name_or_path);
                let path_like =
                    candidate.components().count() > 1 || candidate.extension().is_some();
                if !path_like {
                    return Err(err);
                }
                PathBuf::from(name_or_path)
            }
        };
        tracing::info!(profile = %path.display(), "loading configuration profile");
        ConfigDocument::from_path(&path)
    }

    /// Iterates over the catalog names in their fixed order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_entry_resolves_to_an_existing_file() {
        let catalog = ProfileCatalog::new();
        for name in catalog.names() {
            let path = catalog.resolve(name).unwrap();
            assert!(path.is_file(), "missing profile for '{name}': {path:?}");
        }
    }

    #[test]
    fn unknown_profile_name_is_rejected_with_the_catalog() {
        let catalog = ProfileCatalog::new();
        match catalog.resolve("glip_Swin_XL") {
            Err(GlipError::UnknownProfile { name, known }) => {
                assert_eq!(name, "glip_Swin_XL");
                assert!(known.contains("glip_Swin_L"));
            }
            _ => panic!("Expected UnknownProfile error"),
        }
    }

    #[test]
    fn swin_l_profile_loads_into_a_non_empty_document() {
        let catalog = ProfileCatalog::new();
        let doc = catalog.load("glip_Swin_L").unwrap();
        assert!(!doc.is_empty());
        assert_eq!(
            doc.str_at("MODEL.BACKBONE.CONV_BODY"),
            Some("SWINL-FPN-RETINANET")
        );
    }

    #[test]
    fn loading_the_same_profile_twice_yields_equal_documents() {
        let catalog = ProfileCatalog::new();
        let first = catalog.load("coco").unwrap();
        let second = catalog.load("coco").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn misspelled_catalog_name_surfaces_the_catalog() {
        let catalog = ProfileCatalog::new();
        match catalog.load("glip_Swin_T_O356") {
            Err(GlipError::UnknownProfile { name, known }) => {
                assert_eq!(name, "glip_Swin_T_O356");
                assert!(known.contains("glip_Swin_T_O365"));
            }
            _ => panic!("Expected UnknownProfile error"),
        }
    }

    #[test]
    fn non_catalog_names_load_as_filesystem_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ad_hoc.yaml");
        std::fs::write(&path, "MODEL:\n  BACKBONE:\n    CONV_BODY: R-50-FPN-RETINANET\n")
            .unwrap();

        let catalog = ProfileCatalog::new();
        let doc = catalog.load(path.to_str().unwrap()).unwrap();
        assert_eq!(
            doc.str_at("MODEL.BACKBONE.CONV_BODY"),
            Some("R-50-FPN-RETINANET")
        );
    }

    #[test]
    fn load_of_a_missing_path_is_not_found() {
        let catalog = ProfileCatalog::new();
        let result = catalog.load("/nonexistent/profile.yaml");
        assert!(matches!(result, Err(GlipError::ProfileNotFound { .. })));
    }
}
