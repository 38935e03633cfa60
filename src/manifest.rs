//! Manifest files: ordered JSON arrays of scene descriptors.

use crate::error::{ManifestError, PublishError};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Timestamp format used by manifests, assets and logs.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One scene to publish.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescriptor {
    /// Unique scene identifier, `SATELLITE_MISSION_SENSOR_...`
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    /// Logical key to file path, in manifest order
    #[serde(deserialize_with = "deserialize_assets")]
    pub assets: Vec<(String, String)>,
    #[serde(default)]
    pub reprocess: Option<bool>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    #[serde(default)]
    pub tile_id: Option<String>,
}

impl SceneDescriptor {
    pub fn reprocess(&self) -> bool {
        self.reprocess.unwrap_or(false)
    }

    pub fn start(&self) -> Result<NaiveDateTime, PublishError> {
        parse_timestamp("start_date", &self.start_date)
    }

    pub fn end(&self) -> Result<NaiveDateTime, PublishError> {
        parse_timestamp("end_date", &self.end_date)
    }
}

pub fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, PublishError> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).map_err(|_| PublishError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Deserializes the `assets` object into key/path pairs, keeping file order.
fn deserialize_assets<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct AssetsVisitor;

    impl<'de> de::Visitor<'de> for AssetsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an object mapping asset keys to file paths")
        }

        fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut assets = Vec::new();
            while let Some((key, path)) = map.next_entry::<String, String>()? {
                assets.push((key, path));
            }
            Ok(assets)
        }
    }

    deserializer.deserialize_map(AssetsVisitor)
}

/// A loaded manifest. Entries are kept raw so that one malformed scene does
/// not prevent the others from being published.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<Value>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, ManifestError> {
        let root: Value = serde_json::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        match root {
            Value::Array(entries) => Ok(Self {
                path: path.to_path_buf(),
                entries,
            }),
            _ => Err(ManifestError::NotAnArray {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scenes in file order. A malformed entry yields its display name and
    /// the parse error.
    pub fn scenes(&self) -> impl Iterator<Item = Result<SceneDescriptor, (String, PublishError)>> + '_ {
        self.entries.iter().enumerate().map(|(index, entry)| {
            SceneDescriptor::deserialize(entry).map_err(|e| {
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", index + 1));
                (
                    name,
                    PublishError::InvalidEntry {
                        index: index + 1,
                        message: e.to_string(),
                    },
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[
        {
            "name": "CBERS_4_AWFI_20200101",
            "start_date": "2020-01-01T00:00:00",
            "end_date": "2020-01-01T00:00:10",
            "assets": {"thumbnail": "/data/pvi.png", "BAND16": "/data/b16.tif", "BAND13": "/data/b13.tif"},
            "cloud_cover": 12.5,
            "tile_id": "007004",
            "reprocess": true
        },
        {
            "start_date": "2020-01-02T00:00:00",
            "assets": {}
        },
        {
            "name": "CBERS_4_AWFI_20200103",
            "start_date": "2020-01-03T00:00:00",
            "end_date": "2020-01-03T00:00:10",
            "assets": {"BAND1": "/data/b1.tif"},
            "reprocess": null
        }
    ]"#;

    #[test]
    fn test_scenes_keep_order_and_optional_fields() {
        let manifest = Manifest::parse(Path::new("items.json"), MANIFEST).unwrap();
        assert_eq!(manifest.len(), 3);

        let scenes: Vec<_> = manifest.scenes().collect();
        let first = scenes[0].as_ref().unwrap();
        assert_eq!(first.name, "CBERS_4_AWFI_20200101");
        let keys: Vec<&str> = first.assets.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["thumbnail", "BAND16", "BAND13"]);
        assert_eq!(first.cloud_cover, Some(12.5));
        assert_eq!(first.tile_id.as_deref(), Some("007004"));
        assert!(first.reprocess());

        let (name, err) = scenes[1].as_ref().unwrap_err();
        assert_eq!(name, "#2");
        assert!(matches!(err, PublishError::InvalidEntry { index: 2, .. }));

        let third = scenes[2].as_ref().unwrap();
        assert!(!third.reprocess());
        assert_eq!(third.cloud_cover, None);
    }

    #[test]
    fn test_dates_use_fixed_format() {
        let manifest = Manifest::parse(Path::new("items.json"), MANIFEST).unwrap();
        let scene = manifest.scenes().next().unwrap().unwrap();

        assert_eq!(scene.start().unwrap().format(DATE_FORMAT).to_string(), "2020-01-01T00:00:00");
        assert!(parse_timestamp("start_date", "2020-01-01").is_err());
    }

    #[test]
    fn test_non_array_manifest() {
        let err = Manifest::parse(Path::new("items.json"), r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::NotAnArray { .. }));

        let err = Manifest::parse(Path::new("items.json"), "[").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }
}
