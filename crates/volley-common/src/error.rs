//! Error types for Volley.

use thiserror::Error;

use crate::ids::AssetId;

/// Top-level error type for Volley operations.
#[derive(Debug, Error)]
pub enum VolleyError {
    /// Output device errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output device errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Failed to open the output device
    #[error("Failed to initialize audio device: {0}")]
    InitFailed(String),

    /// Failed to create a per-channel binding
    #[error("Failed to create output binding: {0}")]
    BindingFailed(String),

    /// Clip data is not available to the device
    #[error("Clip not loaded: {0}")]
    ClipMissing(String),

    /// Failed to decode a clip
    #[error("Failed to decode '{path}': {message}")]
    DecodeFailed {
        /// Path of the clip
        path: String,
        /// Decoder message
        message: String,
    },
}

/// Asset catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Unknown asset
    #[error("Asset not found: {0}")]
    NotFound(AssetId),

    /// Two descriptors share an ID
    #[error("Duplicate asset id: {0}")]
    Duplicate(AssetId),

    /// Manifest could not be parsed
    #[error("Invalid catalog manifest: {0}")]
    InvalidManifest(String),

    /// Preload failed
    #[error("Preload of {id} failed: {source}")]
    PreloadFailed {
        /// Asset being preloaded
        id: AssetId,
        /// Underlying device error
        source: DeviceError,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of its allowed range
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What is wrong
        message: String,
    },

    /// Failed to parse a configuration document
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type alias for Volley operations.
pub type VolleyResult<T> = Result<T, VolleyError>;
