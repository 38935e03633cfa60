//! Failure kinds for every fallible boundary of the publishing pipeline.
//!
//! Item-level errors end up inside [`crate::upsert::PublishOutcome::Failed`];
//! file-level errors are turned into report lines by the processor.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised by a raster backend.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to open raster {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("failed to read {what} from {path:?}: {message}")]
    Read {
        path: PathBuf,
        what: &'static str,
        message: String,
    },

    #[error("raster {path:?} has no coordinate reference system")]
    MissingCrs { path: PathBuf },

    #[error("cannot reproject from {from} to {to}: {message}")]
    Reproject {
        from: String,
        to: String,
        message: String,
    },
}

/// Errors raised while deriving item geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("raster {path:?} has no valid pixels")]
    EmptyMask { path: PathBuf },

    #[error("raster {path:?} has no extent attribute {key}")]
    MissingExtent { path: PathBuf, key: &'static str },

    #[error("extent attribute {key} of {path:?} is not a number: {value:?}")]
    InvalidExtent {
        path: PathBuf,
        key: &'static str,
        value: String,
    },
}

/// Errors raised while hashing a file.
#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("failed to hash {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by the catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode catalog value: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid geometry stored in catalog: {0}")]
    Geometry(String),

    #[error("invalid timestamp stored in catalog: {0:?}")]
    Timestamp(String),
}

/// Errors that abort the processing of one manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse manifest {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {path:?} is not a JSON array of scenes")]
    NotAnArray { path: PathBuf },
}

/// Reasons a single scene could not be published.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("scene {name} does not match the taxonomy of collection {collection}: {reason}")]
    NotAuthentic {
        name: String,
        collection: String,
        reason: String,
    },

    #[error("invalid scene entry #{index}: {message}")]
    InvalidEntry { index: usize, message: String },

    #[error("invalid {field} {value:?}, expected YYYY-MM-DDTHH:MM:SS")]
    InvalidDate { field: &'static str, value: String },

    #[error("tile {0} not found")]
    TileNotFound(String),

    #[error("failed to stat asset file {path:?}: {source}")]
    AssetFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scene has no raster data asset to derive geometry from")]
    NoRasterAsset,

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid path prefix pattern {pattern:?}: {source}")]
    Prefix {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while taking the per-manifest lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to lock {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
