//! Spatial attributes of a scene derived from one raster file.

use crate::error::{GeometryError, RasterError};
use crate::raster::{vectorize::polygonize, Crs, GeoTransform, Raster, RasterSource};
use geo::{BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use std::path::Path;
use tracing::debug;

/// Decimal digits kept in reprojected coordinates.
pub const PRECISION: i32 = 6;

const EXTENT_VARIABLE: &str = "geospatial_lat_lon_extent";

/// Result of vectorizing the validity mask of a raster.
#[derive(Debug, Clone)]
pub struct Footprint {
    /// Bounds of the union of every valid region
    pub bounds: Rect<f64>,
    pub union: MultiPolygon<f64>,
    /// First region found in a row-major scan of the mask. When the raster has
    /// several disjoint regions this covers only one of them.
    pub representative: Polygon<f64>,
}

/// Derives extents, footprints and SRIDs in a fixed target CRS.
pub struct GeometryDeriver<'a, S: RasterSource + ?Sized> {
    source: &'a S,
    target_crs: &'a str,
}

impl<'a, S: RasterSource + ?Sized> GeometryDeriver<'a, S> {
    pub fn new(source: &'a S, target_crs: &'a str) -> Self {
        Self { source, target_crs }
    }

    /// Axis-aligned bounds of the raster, reprojected to the target CRS.
    pub fn extent(&self, path: &Path) -> Result<Polygon<f64>, GeometryError> {
        let raster = self.source.open(path)?;
        let crs = native_crs(path, raster.as_ref())?;
        let transform = raster.geo_transform()?;
        let (width, height) = raster.size();

        let corners = [
            transform.apply(0.0, 0.0),
            transform.apply(width as f64, 0.0),
            transform.apply(width as f64, height as f64),
            transform.apply(0.0, height as f64),
        ];
        let (xs, ys): (Vec<f64>, Vec<f64>) = corners.iter().copied().unzip();
        let (xmin, xmax) = min_max(&xs);
        let (ymin, ymax) = min_max(&ys);

        let ring = Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax })
            .to_polygon()
            .exterior()
            .clone();

        Ok(Polygon::new(self.reproject(&crs, &ring)?, vec![]))
    }

    /// Valid-pixel coverage of the raster in the target CRS.
    pub fn footprint(&self, path: &Path) -> Result<Footprint, GeometryError> {
        let raster = self.source.open(path)?;
        let crs = native_crs(path, raster.as_ref())?;
        let transform = raster.geo_transform()?;
        let mask = raster.validity_mask()?;

        let regions = polygonize(&mask);
        debug!("Vectorized {} valid regions from {:?}", regions.len(), path);

        let polygons = regions
            .iter()
            .map(|region| self.to_target(&crs, &transform, region))
            .collect::<Result<Vec<_>, _>>()?;

        let empty = || GeometryError::EmptyMask {
            path: path.to_path_buf(),
        };
        let representative = polygons.first().cloned().ok_or_else(empty)?;

        let union = polygons
            .iter()
            .fold(MultiPolygon::new(vec![]), |acc, polygon| {
                acc.union(&MultiPolygon::new(vec![polygon.clone()]))
            });
        let bounds = union.bounding_rect().ok_or_else(empty)?;

        Ok(Footprint {
            bounds,
            union,
            representative,
        })
    }

    /// Authority code of the raster CRS, if any resolves.
    pub fn epsg_of(&self, path: &Path) -> Result<Option<u32>, GeometryError> {
        let raster = self.source.open(path)?;
        Ok(raster.crs().and_then(|crs| crs.authority_code()))
    }

    /// Extent published by fixed-grid products as attributes of the
    /// `geospatial_lat_lon_extent` variable, already in geographic coordinates.
    pub fn fixed_grid_extent(&self, path: &Path) -> Result<Rect<f64>, GeometryError> {
        let raster = self.source.open(path)?;

        let read = |key: &'static str| -> Result<f64, GeometryError> {
            let value = raster
                .metadata_item(&format!("{EXTENT_VARIABLE}#{key}"))
                .ok_or_else(|| GeometryError::MissingExtent {
                    path: path.to_path_buf(),
                    key,
                })?;
            value.trim().parse().map_err(|_| GeometryError::InvalidExtent {
                path: path.to_path_buf(),
                key,
                value,
            })
        };

        let west = read("geospatial_westbound_longitude")?;
        let south = read("geospatial_southbound_latitude")?;
        let east = read("geospatial_eastbound_longitude")?;
        let north = read("geospatial_northbound_latitude")?;

        Ok(Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north }))
    }

    /// Pixel-space polygon to the target CRS.
    fn to_target(
        &self,
        crs: &Crs,
        transform: &GeoTransform,
        polygon: &Polygon<f64>,
    ) -> Result<Polygon<f64>, RasterError> {
        let georef = |ring: &LineString<f64>| -> LineString<f64> {
            ring.coords()
                .map(|c| {
                    let (x, y) = transform.apply(c.x, c.y);
                    Coord { x, y }
                })
                .collect()
        };

        let exterior = self.reproject(crs, &georef(polygon.exterior()))?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.reproject(crs, &georef(ring)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Polygon::new(exterior, interiors))
    }

    fn reproject(&self, crs: &Crs, ring: &LineString<f64>) -> Result<LineString<f64>, RasterError> {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = ring.coords().map(|c| (c.x, c.y)).unzip();
        self.source
            .transform_coords(crs, self.target_crs, &mut xs, &mut ys)?;

        Ok(xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Coord {
                x: round(x),
                y: round(y),
            })
            .collect())
    }
}

fn native_crs(path: &Path, raster: &dyn Raster) -> Result<Crs, RasterError> {
    raster.crs().ok_or_else(|| RasterError::MissingCrs {
        path: path.to_path_buf(),
    })
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

pub fn round(value: f64) -> f64 {
    let factor = 10f64.powi(PRECISION);
    (value * factor).round() / factor
}
