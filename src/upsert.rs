//! Create-or-update of one catalog item per scene.

use crate::asset::AssetBuilder;
use crate::catalog::{Catalog, Collection, Item};
use crate::config::Settings;
use crate::error::PublishError;
use crate::geometry::GeometryDeriver;
use crate::manifest::SceneDescriptor;
use crate::raster::RasterSource;
use crate::report::{OutcomeKind, RunReport};
use chrono::Utc;
use geo::BoundingRect;
use std::path::Path;
use tracing::debug;

/// Result of publishing one scene.
#[derive(Debug)]
pub enum PublishOutcome {
    Created { id: i64 },
    Updated { id: i64 },
    /// Item exists and the scene did not ask for reprocessing
    SkippedAlreadyPublished,
    Failed(PublishError),
}

impl PublishOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Created { .. } => OutcomeKind::Created,
            Self::Updated { .. } => OutcomeKind::Updated,
            Self::SkippedAlreadyPublished => OutcomeKind::SkippedAlreadyPublished,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }
}

pub struct ItemUpserter<'a, C: Catalog + ?Sized, S: RasterSource + ?Sized> {
    catalog: &'a mut C,
    assets: AssetBuilder<'a, S>,
    geometry: GeometryDeriver<'a, S>,
    fixed_grid_collections: &'a [String],
}

impl<'a, C: Catalog + ?Sized, S: RasterSource + ?Sized> ItemUpserter<'a, C, S> {
    pub fn new(catalog: &'a mut C, source: &'a S, settings: &'a Settings) -> Self {
        Self {
            catalog,
            assets: AssetBuilder::new(source, settings),
            geometry: GeometryDeriver::new(source, &settings.target_crs),
            fixed_grid_collections: &settings.fixed_grid_collections,
        }
    }

    /// Publish `scene` into `collection`. Every write happens inside one
    /// nested catalog scope that is rolled back if any step fails.
    pub fn upsert(
        &mut self,
        collection: &Collection,
        scene: &SceneDescriptor,
        report: &mut RunReport,
    ) -> PublishOutcome {
        let name = &scene.name;
        report.info(format!("Item: {name}..."));

        let existing = match self.catalog.find_item(collection.id, name) {
            Ok(existing) => existing,
            Err(e) => {
                report.error(format!("It was not possible to look up item {name} in the database: {e}"));
                return PublishOutcome::Failed(e.into());
            }
        };

        let (item, is_new) = match existing {
            None => {
                report.info(format!("Creating a new Item in database. Item: {name}."));
                (Item::new(collection.id, name), true)
            }
            Some(item) if scene.reprocess() => {
                report.info(format!("Item {name} was modified, will be updated."));
                (item, false)
            }
            Some(_) => {
                report.warn("Image metadata is already in the database.");
                return PublishOutcome::SkippedAlreadyPublished;
            }
        };

        if let Err(e) = self.catalog.begin_nested() {
            report.error(format!("Sorry, we were unable to create the item to the database: {e}"));
            return PublishOutcome::Failed(e.into());
        }

        match self.populate_and_save(collection, scene, item, report) {
            Ok(id) => {
                if let Err(e) = self.catalog.release_nested() {
                    report.error(format!("Sorry, we were unable to save the item to the database! {e}"));
                    return PublishOutcome::Failed(e.into());
                }
                if is_new {
                    report.info(format!("New Item {name} with ID:{id} was saved in database!"));
                    PublishOutcome::Created { id }
                } else {
                    report.info(format!("Item {name} with ID:{id} was updated in database!"));
                    PublishOutcome::Updated { id }
                }
            }
            Err(e) => {
                if let Err(rollback) = self.catalog.rollback_nested() {
                    report.error(format!("Failed to roll back item {name}: {rollback}"));
                }
                PublishOutcome::Failed(e)
            }
        }
    }

    fn populate_and_save(
        &mut self,
        collection: &Collection,
        scene: &SceneDescriptor,
        mut item: Item,
        report: &mut RunReport,
    ) -> Result<i64, PublishError> {
        let built = self.assets.build_all(&scene.assets, report).map_err(|e| {
            report.error(format!("Sorry, we were unable to create the Assets to the item! {e}"));
            e
        })?;

        debug!("Saving to the database...");
        let raster = built.raster.clone();
        item.assets = built.assets;
        item.cloud_cover = scene.cloud_cover;
        item.start_date = Some(scene.start()?);
        item.end_date = Some(scene.end()?);

        let raster = raster.ok_or_else(|| {
            report.error(format!("Item {} has no raster asset to derive its geometry from.", scene.name));
            PublishError::NoRasterAsset
        })?;
        item.srid = self.geometry.epsg_of(&raster)?;

        if let Some(tile_name) = &scene.tile_id {
            let tile = self
                .catalog
                .tile_by_name(tile_name)?
                .ok_or_else(|| PublishError::TileNotFound(tile_name.clone()))
                .map_err(|e| {
                    report.error(format!("Tile {tile_name} not found."));
                    e
                })?;
            item.tile_id = Some(tile.id);
        }

        self.assign_geometry(collection, &raster, &mut item).map_err(|e| {
            report.error(format!("Error in footprint generation or area of interest generation! {e}"));
            e
        })?;

        item.is_available = true;
        item.updated = Utc::now().naive_utc();

        debug!("Saving the item to the database...");
        self.catalog.save_item(&mut item).map_err(|e| {
            report.error(format!("Sorry, we were unable to save the item to the database! {e}"));
            PublishError::from(e)
        })
    }

    fn assign_geometry(&self, collection: &Collection, raster: &Path, item: &mut Item) -> Result<(), PublishError> {
        let identifier = collection.identifier();

        if self.fixed_grid_collections.iter().any(|c| *c == identifier) {
            let envelope = self.geometry.fixed_grid_extent(raster)?.to_polygon();
            item.footprint = Some(envelope.clone());
            item.bbox = Some(envelope);
            return Ok(());
        }

        debug!("Processing raster_extent...");
        item.geom = Some(self.geometry.extent(raster)?);

        debug!("Processing footprint...");
        let footprint = self.geometry.footprint(raster)?;
        item.footprint = Some(footprint.bounds.to_polygon());
        // Envelope of the first region only, even when the raster has several.
        item.bbox = footprint
            .representative
            .bounding_rect()
            .map(|rect| rect.to_polygon());

        Ok(())
    }
}
