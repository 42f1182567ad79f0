use std::path::PathBuf;

use thiserror::Error;

/// The error type for `glip-burn` operations.
///
/// Every variant is a startup-time or configuration error: none of them is
/// transient, so there is no retry path anywhere in the crate. Messages name
/// the offending key or profile and, where the context allows, the valid
/// alternatives, since the dominant real-world cause is a typo in an
/// experiment configuration.
#[derive(Error, Debug)]
pub enum GlipError {
    /// A component was registered under a key that is already taken.
    ///
    /// Registration conflicts are a hard failure rather than a silent
    /// overwrite: two experiment components colliding must surface at
    /// startup, not at use time.
    #[error("duplicate key '{key}' in {registry} registry")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
        /// The role-group registry the registration targeted.
        registry: String,
    },

    /// A lookup asked for a key no component was registered under.
    #[error("unknown key '{key}' in {registry} registry (registered: {known})")]
    UnknownKey {
        /// The requested key.
        key: String,
        /// The role-group registry that was searched.
        registry: String,
        /// Comma-separated list of the keys that are registered.
        known: String,
    },

    /// A profile name that is not part of the fixed configuration catalog.
    #[error("unknown profile '{name}' (catalog: {known})")]
    UnknownProfile {
        /// The requested profile name.
        name: String,
        /// Comma-separated list of catalog entries.
        known: String,
    },

    /// The resolved profile location does not exist on disk.
    #[error("profile not found at '{}'", path.display())]
    ProfileNotFound {
        /// The location that was probed.
        path: PathBuf,
    },

    /// The profile exists but could not be read.
    #[error("failed to read profile '{}': {source}", path.display())]
    ProfileRead {
        /// The location that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The profile content is not valid structured data.
    #[error("failed to parse profile '{}': {source}", path.display())]
    ProfileParse {
        /// The location that was parsed.
        path: PathBuf,
        /// The underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A configuration option the assembler requires is absent.
    #[error("missing configuration option '{path}'")]
    MissingOption {
        /// Dotted path of the option.
        path: String,
    },

    /// A configuration option is present but has the wrong shape.
    #[error("invalid configuration option '{path}': expected {expected}")]
    InvalidOption {
        /// Dotted path of the option.
        path: String,
        /// Description of the expected value kind.
        expected: String,
    },

    /// A component factory failed while constructing its module.
    #[error("model initialization failed: {reason}")]
    ModelInitializationFailed {
        /// The reason for the failure.
        reason: String,
    },
}

/// A specialized `Result` type for `glip-burn` operations.
pub type GlipResult<T> = Result<T, GlipError>;
