//! Collection Publisher
//!
//! Publishes remote-sensing scene manifests (`items.json`) as catalog items:
//! assets with checksums and raster metadata, footprints and bounding boxes
//! derived from the raster validity mask, and idempotent create-or-update
//! under a per-manifest file lock.

pub mod asset;
pub mod authenticity;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod error;
pub mod geometry;
pub mod lock;
pub mod manifest;
pub mod processor;
pub mod raster;
pub mod report;
pub mod taxonomy;
pub mod upsert;
