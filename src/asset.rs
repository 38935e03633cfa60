//! Asset classification and asset records.

use crate::checksum::multihash_sha256;
use crate::config::Settings;
use crate::error::PublishError;
use crate::manifest::DATE_FORMAT;
use crate::raster::RasterSource;
use crate::report::RunReport;
use crate::taxonomy::{FILE_KEYS, IMAGE_KEYS, THUMBNAIL_KEYS};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const THUMBNAIL_KEY: &str = "thumbnail";
pub const THUMBNAIL_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Data,
    Thumbnail,
    File,
}

/// What a manifest key is published as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    Thumbnail,
    /// Raster layer; geometry and raster metadata are read from it
    Data,
    File,
    Unrecognized,
}

impl AssetCategory {
    /// Total classification of a manifest key. Checked in order: thumbnail
    /// keys, image keys (or any key containing `BAND`), auxiliary file keys.
    pub fn classify(key: &str) -> Self {
        if THUMBNAIL_KEYS.contains(&key) {
            Self::Thumbnail
        } else if IMAGE_KEYS.contains(&key) || key.contains("BAND") {
            Self::Data
        } else if FILE_KEYS.contains(&key) {
            Self::File
        } else {
            Self::Unrecognized
        }
    }

    pub fn role(self) -> Option<AssetRole> {
        match self {
            Self::Thumbnail => Some(AssetRole::Thumbnail),
            Self::Data => Some(AssetRole::Data),
            Self::File => Some(AssetRole::File),
            Self::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: usize,
    pub y: usize,
}

/// Asset record stored in the item's asset mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(rename = "bdc:size")]
    pub size: u64,
    #[serde(rename = "checksum:multihash")]
    pub checksum: String,
    pub roles: Vec<AssetRole>,
    pub created: String,
    pub updated: String,
    #[serde(rename = "bdc:raster_size", default, skip_serializing_if = "Option::is_none")]
    pub raster_size: Option<Dimensions>,
    #[serde(rename = "bdc:chunk_size", default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<Dimensions>,
}

/// MIME type from the file extension.
pub fn guess_mime_type(path: &str) -> Option<&'static str> {
    let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "tif" | "tiff" => "image/tiff",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "nc" => "application/x-netcdf",
        "hdf" | "h5" => "application/x-hdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        _ => return None,
    };
    Some(mime)
}

/// Assets of one scene plus the raster its geometry is derived from.
#[derive(Debug, Default)]
pub struct SceneAssets {
    pub assets: BTreeMap<String, Asset>,
    /// Last data asset in manifest order
    pub raster: Option<PathBuf>,
}

pub struct AssetBuilder<'a, S: RasterSource + ?Sized> {
    source: &'a S,
    settings: &'a Settings,
}

impl<'a, S: RasterSource + ?Sized> AssetBuilder<'a, S> {
    pub fn new(source: &'a S, settings: &'a Settings) -> Self {
        Self { source, settings }
    }

    /// Build one asset record. `created` defaults to now.
    pub fn build(
        &self,
        href: &str,
        mime_type: Option<&str>,
        role: AssetRole,
        path: &Path,
        created: Option<NaiveDateTime>,
        is_raster: bool,
    ) -> Result<Asset, PublishError> {
        let now = Utc::now().naive_utc().format(DATE_FORMAT).to_string();

        let size = fs::metadata(path)
            .map_err(|source| PublishError::AssetFile {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        debug!("Processing the checksum:multihash");
        let checksum = multihash_sha256(path)?;

        let mut asset = Asset {
            href: href.to_string(),
            type_: mime_type.map(str::to_string),
            size,
            checksum,
            roles: vec![role],
            created: created
                .map(|c| c.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| now.clone()),
            updated: now,
            raster_size: None,
            chunk_size: None,
        };

        if is_raster {
            debug!("Processing the chunk_x, chunk_y");
            let raster = self.source.open(path)?;
            let (x, y) = raster.size();
            asset.raster_size = Some(Dimensions { x, y });
            asset.chunk_size = raster.block_size().map(|(x, y)| Dimensions { x, y });
        }

        Ok(asset)
    }

    /// Build every asset of a scene. Unrecognized keys are reported and
    /// skipped; any other failure fails the whole scene.
    pub fn build_all(
        &self,
        entries: &[(String, String)],
        report: &mut RunReport,
    ) -> Result<SceneAssets, PublishError> {
        let mut built = SceneAssets::default();

        for (key, file) in entries {
            let category = AssetCategory::classify(key);
            let Some(role) = category.role() else {
                report.error(format!("Sorry, invalid key! {key}"));
                continue;
            };

            let href = self.settings.href_for(file);
            let path = Path::new(file);

            let (name, asset) = match category {
                AssetCategory::Thumbnail => (
                    THUMBNAIL_KEY,
                    self.build(&href, Some(THUMBNAIL_MIME), role, path, None, false)?,
                ),
                AssetCategory::Data => {
                    let asset = self.build(&href, guess_mime_type(file), role, path, None, true)?;
                    built.raster = Some(path.to_path_buf());
                    (key.as_str(), asset)
                }
                _ => (
                    key.as_str(),
                    self.build(&href, guess_mime_type(file), role, path, None, false)?,
                ),
            };

            built.assets.insert(name.to_string(), asset);
        }

        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::fixture::{MemoryRaster, MemoryRasterSource};
    use regex::Regex;

    #[test]
    fn test_classification_is_ordered_and_total() {
        assert_eq!(AssetCategory::classify("thumbnail"), AssetCategory::Thumbnail);
        assert_eq!(AssetCategory::classify("PVI"), AssetCategory::Thumbnail);
        assert_eq!(AssetCategory::classify("BAND13"), AssetCategory::Data);
        assert_eq!(AssetCategory::classify("NDVI"), AssetCategory::Data);
        assert_eq!(AssetCategory::classify("MIR_reflectance"), AssetCategory::Data);
        assert_eq!(AssetCategory::classify("VI_Quality"), AssetCategory::Data);
        assert_eq!(AssetCategory::classify("mtl.json"), AssetCategory::File);
        assert_eq!(AssetCategory::classify("band1"), AssetCategory::Unrecognized);
        assert_eq!(AssetCategory::Unrecognized.role(), None);
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(guess_mime_type("/data/b1.TIF"), Some("image/tiff"));
        assert_eq!(guess_mime_type("/data/mtl.json"), Some("application/json"));
        assert_eq!(guess_mime_type("/data/noext"), None);
    }

    #[test]
    fn test_raster_asset_records_size_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b1.tif");
        fs::write(&path, b"pixels").unwrap();

        let mut source = MemoryRasterSource::default();
        source.insert(&path, MemoryRaster::geographic(300, 200, 0.0, 0.0));
        let settings = Settings::default();
        let builder = AssetBuilder::new(&source, &settings);

        let created = NaiveDateTime::parse_from_str("2020-01-01T10:00:00", DATE_FORMAT).unwrap();
        let asset = builder
            .build("b1.tif", Some("image/tiff"), AssetRole::Data, &path, Some(created), true)
            .unwrap();

        assert_eq!(asset.size, 6);
        assert_eq!(asset.created, "2020-01-01T10:00:00");
        assert_eq!(asset.raster_size, Some(Dimensions { x: 300, y: 200 }));
        assert_eq!(asset.chunk_size, Some(Dimensions { x: 256, y: 1 }));

        let again = builder
            .build("b1.tif", Some("image/tiff"), AssetRole::Data, &path, None, true)
            .unwrap();
        assert_eq!(again.checksum, asset.checksum);
        assert_eq!(again.size, asset.size);
    }

    #[test]
    fn test_missing_block_size_omits_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b1.tif");
        fs::write(&path, b"pixels").unwrap();

        let mut raster = MemoryRaster::geographic(10, 10, 0.0, 0.0);
        raster.block = None;
        let mut source = MemoryRasterSource::default();
        source.insert(&path, raster);
        let settings = Settings::default();

        let asset = AssetBuilder::new(&source, &settings)
            .build("b1.tif", None, AssetRole::Data, &path, None, true)
            .unwrap();
        assert!(asset.raster_size.is_some());
        assert!(asset.chunk_size.is_none());

        let json = serde_json::to_value(&asset).unwrap();
        assert!(json.get("bdc:chunk_size").is_none());
        assert_eq!(json["roles"], serde_json::json!(["data"]));
    }

    #[test]
    fn test_build_all_skips_unknown_keys_and_tracks_last_raster() {
        let dir = tempfile::tempdir().unwrap();
        let file = |name: &str| {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            path.to_string_lossy().into_owned()
        };
        let (pvi, b1, b2, mtl, odd) = (file("pvi.png"), file("b1.tif"), file("b2.tif"), file("mtl.json"), file("x.bin"));

        let mut source = MemoryRasterSource::default();
        source.insert(&b1, MemoryRaster::geographic(4, 4, 0.0, 0.0));
        source.insert(&b2, MemoryRaster::geographic(8, 8, 0.0, 0.0));

        let settings = Settings {
            path_prefix: Some(Regex::new(&regex::escape(&dir.path().to_string_lossy())).unwrap()),
            href_prefix: "/data".to_string(),
            ..Settings::default()
        };
        let builder = AssetBuilder::new(&source, &settings);

        let entries = vec![
            ("PVI".to_string(), pvi),
            ("BAND1".to_string(), b1),
            ("unknown".to_string(), odd),
            ("BAND2".to_string(), b2.clone()),
            ("mtl.json".to_string(), mtl),
        ];
        let mut report = RunReport::default();
        let built = builder.build_all(&entries, &mut report).unwrap();

        let keys: Vec<&str> = built.assets.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["BAND1", "BAND2", "mtl.json", "thumbnail"]);
        assert_eq!(built.raster, Some(PathBuf::from(b2)));
        assert_eq!(built.assets["thumbnail"].type_.as_deref(), Some("image/png"));
        assert_eq!(built.assets["BAND1"].href, "/data/b1.tif");
        assert_eq!(built.assets["mtl.json"].roles, vec![AssetRole::File]);
        assert!(built.assets["mtl.json"].raster_size.is_none());
        assert_eq!(report.lines(), ["Sorry, invalid key! unknown"]);
    }

    #[test]
    fn test_unopenable_raster_fails_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b1.tif");
        fs::write(&path, b"not a raster").unwrap();

        let source = MemoryRasterSource::default();
        let settings = Settings::default();
        let entries = vec![("BAND1".to_string(), path.to_string_lossy().into_owned())];

        let err = AssetBuilder::new(&source, &settings)
            .build_all(&entries, &mut RunReport::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::Raster(_)));
    }
}
