//! GDAL raster backend.

use super::{Crs, GeoTransform, Mask, Raster, RasterSource};
use crate::error::RasterError;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, Metadata};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens datasets with GDAL and reprojects with OGR coordinate transforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalRasterSource;

pub struct GdalRaster {
    path: PathBuf,
    dataset: Dataset,
}

fn read_err(path: &Path, what: &'static str, err: gdal::errors::GdalError) -> RasterError {
    RasterError::Read {
        path: path.to_path_buf(),
        what,
        message: err.to_string(),
    }
}

impl Raster for GdalRaster {
    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn block_size(&self) -> Option<(usize, usize)> {
        let band = self.dataset.rasterband(1).ok()?;
        match band.block_size() {
            (0, _) | (_, 0) => None,
            size => Some(size),
        }
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        self.dataset
            .geo_transform()
            .map(GeoTransform)
            .map_err(|e| read_err(&self.path, "geotransform", e))
    }

    fn crs(&self) -> Option<Crs> {
        let wkt = self.dataset.projection();
        if wkt.is_empty() {
            return None;
        }

        let epsg = self
            .dataset
            .spatial_ref()
            .ok()
            .and_then(|srs| srs.auth_code().ok())
            .and_then(|code| u32::try_from(code).ok());

        Some(Crs { epsg, wkt })
    }

    /// Union of the per-band GDAL mask bands.
    fn validity_mask(&self) -> Result<Mask, RasterError> {
        let (width, height) = self.dataset.raster_size();
        let mut data = vec![0u8; width * height];

        for index in 1..=self.dataset.raster_count() {
            let band = self
                .dataset
                .rasterband(index)
                .map_err(|e| read_err(&self.path, "band", e))?;
            let mask = band
                .open_mask_band()
                .map_err(|e| read_err(&self.path, "mask band", e))?;
            let buffer = mask
                .read_as::<u8>((0, 0), (width, height), (width, height), None)
                .map_err(|e| read_err(&self.path, "mask", e))?;

            for (out, value) in data.iter_mut().zip(buffer.data()) {
                *out = (*out).max(*value);
            }
        }

        Ok(Mask { width, height, data })
    }

    fn metadata_item(&self, key: &str) -> Option<String> {
        self.dataset.metadata_item(key, "")
    }
}

impl RasterSource for GdalRasterSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Raster>, RasterError> {
        debug!("Opening raster {:?}", path);
        let dataset = Dataset::open(path).map_err(|e| RasterError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Box::new(GdalRaster {
            path: path.to_path_buf(),
            dataset,
        }))
    }

    fn transform_coords(
        &self,
        from: &Crs,
        to: &str,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), RasterError> {
        let reproject_err = |message: String| RasterError::Reproject {
            from: from.definition(),
            to: to.to_string(),
            message,
        };

        let mut source = match from.epsg {
            Some(code) => SpatialRef::from_epsg(code),
            None => SpatialRef::from_wkt(&from.wkt),
        }
        .map_err(|e| reproject_err(e.to_string()))?;
        source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let mut target = SpatialRef::from_definition(to).map_err(|e| reproject_err(e.to_string()))?;
        target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let transform =
            CoordTransform::new(&source, &target).map_err(|e| reproject_err(e.to_string()))?;

        let mut zs = vec![0.0; xs.len()];
        transform
            .transform_coords(xs, ys, &mut zs)
            .map_err(|e| reproject_err(e.to_string()))
    }
}
