//! Catalog data model and the store interface the pipeline writes through.

use crate::asset::Asset;
use crate::error::CatalogError;
use chrono::{NaiveDateTime, Utc};
use geo::Polygon;
use std::collections::BTreeMap;

pub mod sqlite;

pub use sqlite::SqliteCatalog;

/// Collection row. Looked up by `name-version`, never created by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub version: String,
}

impl Collection {
    pub fn identifier(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub id: i64,
    pub name: String,
}

/// Published scene. Unique by `(collection_id, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// `None` until the item is first saved
    pub id: Option<i64>,
    pub collection_id: i64,
    pub name: String,
    pub assets: BTreeMap<String, Asset>,
    pub cloud_cover: Option<f64>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub srid: Option<u32>,
    /// Raster extent in the target CRS
    pub geom: Option<Polygon<f64>>,
    /// Envelope of the valid-pixel footprint
    pub footprint: Option<Polygon<f64>>,
    pub bbox: Option<Polygon<f64>>,
    pub tile_id: Option<i64>,
    pub is_available: bool,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

impl Item {
    pub fn new(collection_id: i64, name: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: None,
            collection_id,
            name: name.to_string(),
            assets: BTreeMap::new(),
            cloud_cover: None,
            start_date: None,
            end_date: None,
            srid: None,
            geom: None,
            footprint: None,
            bbox: None,
            tile_id: None,
            is_available: false,
            created: now,
            updated: now,
        }
    }
}

/// Catalog operations used by the publisher.
///
/// Writes happen inside a nested scope opened with [`Catalog::begin_nested`]
/// and closed by exactly one of [`Catalog::release_nested`] or
/// [`Catalog::rollback_nested`].
pub trait Catalog {
    fn collection_by_identifier(&self, identifier: &str) -> Result<Option<Collection>, CatalogError>;

    fn tile_by_name(&self, name: &str) -> Result<Option<Tile>, CatalogError>;

    fn find_item(&self, collection_id: i64, name: &str) -> Result<Option<Item>, CatalogError>;

    /// Insert the item when it has no id, update it otherwise. Returns the id.
    fn save_item(&mut self, item: &mut Item) -> Result<i64, CatalogError>;

    fn begin_nested(&mut self) -> Result<(), CatalogError>;

    fn release_nested(&mut self) -> Result<(), CatalogError>;

    fn rollback_nested(&mut self) -> Result<(), CatalogError>;
}
