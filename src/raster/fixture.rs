//! In-memory raster backend for tests.

use super::{Crs, GeoTransform, Mask, Raster, RasterSource};
use crate::error::RasterError;
use std::{
    collections::HashMap,
    f64::consts::PI,
    path::{Path, PathBuf},
};

const HALF_EARTH: f64 = 20_037_508.342_789_244;

#[derive(Debug, Clone)]
pub struct MemoryRaster {
    pub width: usize,
    pub height: usize,
    pub block: Option<(usize, usize)>,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub mask: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl MemoryRaster {
    /// Fully valid raster in EPSG:4326 with 1-degree pixels anchored at `(x, y)`.
    pub fn geographic(width: usize, height: usize, x: f64, y: f64) -> Self {
        Self {
            width,
            height,
            block: Some((width.min(256), 1)),
            transform: GeoTransform([x, 1.0, 0.0, y, 0.0, -1.0]),
            crs: Some(Crs::from_epsg(4326)),
            mask: vec![255; width * height],
            metadata: HashMap::new(),
        }
    }

    /// Replace the mask with rows of `#` (valid) and `.` (nodata).
    pub fn with_mask(mut self, rows: &[&str]) -> Self {
        self.height = rows.len();
        self.width = rows[0].len();
        self.mask = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
            .collect();
        self
    }
}

impl Raster for MemoryRaster {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn block_size(&self) -> Option<(usize, usize)> {
        self.block
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        Ok(self.transform)
    }

    fn crs(&self) -> Option<Crs> {
        self.crs.clone()
    }

    fn validity_mask(&self) -> Result<Mask, RasterError> {
        Ok(Mask {
            width: self.width,
            height: self.height,
            data: self.mask.clone(),
        })
    }

    fn metadata_item(&self, key: &str) -> Option<String> {
        self.metadata.get(key).cloned()
    }
}

/// Rasters keyed by path. Supports identity reprojection and Web Mercator to
/// WGS84.
#[derive(Debug, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<PathBuf, MemoryRaster>,
}

impl MemoryRasterSource {
    pub fn insert(&mut self, path: impl Into<PathBuf>, raster: MemoryRaster) {
        self.rasters.insert(path.into(), raster);
    }
}

impl RasterSource for MemoryRasterSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Raster>, RasterError> {
        self.rasters
            .get(path)
            .cloned()
            .map(|r| Box::new(r) as Box<dyn Raster>)
            .ok_or_else(|| RasterError::Open {
                path: path.to_path_buf(),
                message: "not a registered raster".into(),
            })
    }

    fn transform_coords(
        &self,
        from: &Crs,
        to: &str,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), RasterError> {
        let source = from.definition();
        match (source.as_str(), to) {
            (a, b) if a == b => Ok(()),
            ("EPSG:3857", "EPSG:4326") => {
                for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
                    *x = *x * 180.0 / HALF_EARTH;
                    let y_rad = *y * PI / HALF_EARTH;
                    *y = (2.0 * y_rad.exp().atan() - PI / 2.0) * 180.0 / PI;
                }
                Ok(())
            }
            _ => Err(RasterError::Reproject {
                from: source,
                to: to.to_string(),
                message: "unsupported by the in-memory backend".into(),
            }),
        }
    }
}
