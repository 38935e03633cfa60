//! Raster collaborator interface.
//!
//! The pipeline only needs a handful of dataset properties (size, block size,
//! geotransform, CRS, validity mask, metadata items) and a coordinate
//! reprojection primitive. Backends implement [`RasterSource`]; the GDAL one is
//! behind the `gdal` feature.

use crate::error::RasterError;
use regex::Regex;
use std::path::Path;

#[cfg(test)]
pub mod fixture;
#[cfg(feature = "gdal")]
pub mod gdal;
pub mod vectorize;

/// Affine transform from pixel/line to georeferenced coordinates, in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.0;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }
}

/// Coordinate reference system of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    /// Authority code as parsed by the driver, when it resolved one
    pub epsg: Option<u32>,
    /// Raw projection definition
    pub wkt: String,
}

impl Crs {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: String::new(),
        }
    }

    /// Authority code: the driver's code first, then the one found in the WKT.
    pub fn authority_code(&self) -> Option<u32> {
        self.epsg.or_else(|| wkt_authority_code(&self.wkt))
    }

    /// Definition string usable by a reprojection backend.
    pub fn definition(&self) -> String {
        match self.authority_code() {
            Some(code) => format!("EPSG:{code}"),
            None => self.wkt.clone(),
        }
    }
}

/// Root authority code of a WKT definition.
///
/// The root node's `AUTHORITY` (WKT1) or `ID` (WKT2) is the last one in the
/// string; nested datum/unit authorities come before it.
pub fn wkt_authority_code(wkt: &str) -> Option<u32> {
    let patterns = [
        r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#,
        r#"ID\[\s*"EPSG"\s*,\s*(\d+)\s*\]"#,
    ];

    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .filter_map(|re| {
            re.captures_iter(wkt)
                .last()
                .and_then(|caps| caps.get(1).map(|m| (m.start(), m.as_str().to_string())))
        })
        .max_by_key(|(pos, _)| *pos)
        .and_then(|(_, code)| code.parse().ok())
}

/// Validity mask: non-zero where the pixel holds data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    /// Row-major, `width * height` values
    pub data: Vec<u8>,
}

impl Mask {
    pub fn is_valid(&self, col: usize, row: usize) -> bool {
        self.data[row * self.width + col] != 0
    }
}

/// An opened dataset.
pub trait Raster {
    /// Pixel dimensions `(width, height)`.
    fn size(&self) -> (usize, usize);

    /// Internal block size `(x, y)` when the driver reports one.
    fn block_size(&self) -> Option<(usize, usize)>;

    fn geo_transform(&self) -> Result<GeoTransform, RasterError>;

    fn crs(&self) -> Option<Crs>;

    fn validity_mask(&self) -> Result<Mask, RasterError>;

    /// Dataset metadata item, e.g. `variable#attribute` for NetCDF.
    fn metadata_item(&self, key: &str) -> Option<String>;
}

/// Opens datasets and reprojects coordinates.
pub trait RasterSource {
    fn open(&self, path: &Path) -> Result<Box<dyn Raster>, RasterError>;

    /// Reproject coordinates in place from `from` to the `to` definition
    /// (e.g. `EPSG:4326`), using traditional GIS axis order (x = lon).
    fn transform_coords(
        &self,
        from: &Crs,
        to: &str,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), RasterError>;
}
