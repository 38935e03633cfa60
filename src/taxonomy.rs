//! Static satellite / collection taxonomy and the asset key vocabularies.

/// Collection `name-version` prefix to the canonical `SATELLITE_MISSION_SENSOR`
/// prefix that scene names of that collection start with.
const CANONICAL_SENSOR_CODES: &[(&str, &str)] = &[
    ("AMZ1-WFI", "AMAZONIA_1_WFI"),
    ("CB4A-WFI", "CBERS_4A_WFI"),
    ("CB4-WFI", "CBERS_4_AWFI"),
    ("CB4-MUX", "CBERS_4_MUX"),
    // CBERS-4 and CBERS-4A combined
    ("CBERS-WFI", "CBERS_WFI_8D"),
    ("CBERS4-MUX", "CBERS_4_MUX_2M"),
    ("CBERS4-WFI", "CBERS_4_WFI_16D"),
    ("GOES16-L2", "GOES_16_L2_CMI"),
    ("GOES13-L3", "GOES_13_L3_IMAGER"),
    ("landsat", "LE07_L2SP"),
    ("mod13q1", "MODIS_13_XXX"),
    ("mod13q1_bundle", "MODIS_13_BUNDLE_XXX"),
];

/// Manifest keys published as raster `data` assets.
pub const IMAGE_KEYS: &[&str] = &[
    "CMASK", "EVI", "NDVI", "CLEAROB", "TOTALOB", "PROVENANCE",
    "coastal", "blue", "green", "red", "nir", "nir08",
    "swir16", "swir22", "lwir", "lwir11",
    "qa_aerosol", "qa_pixel", "qa_radsat",
    "st_qa", "st_trad", "st_urad", "st_drad", "st_atran",
    "st_emis", "st_emsd", "st_cdist", "sr_atmost_opacity", "sr_cloud_qa",
    "red_reflectance", "NIR_reflectance", "blue_reflectance", "MIR_reflectance",
    "VI_Quality", "pixel_reliability", "composite_day_of_the_year",
    "view_zenith_angle", "sun_zenith_angle", "relative_azimuth_angle",
    "visual", "B01", "B02", "B02_1km", "B03", "B04", "B05", "B06", "B07", "B08",
    "B09", "B10", "B11", "B12", "B13", "B14", "B15", "B16",
];

/// Manifest keys published as auxiliary `file` assets.
pub const FILE_KEYS: &[&str] = &[
    "ang",
    "mtl.json", "mtl.xml", "mtl.txt",
    "sr_stac.json", "st_stac.json",
    "thumb_large", "thumb_small",
    "bundle",
];

/// Manifest keys published as the item thumbnail.
pub const THUMBNAIL_KEYS: &[&str] = &["thumbnail", "PVI"];

pub const DEFAULT_SENSORS: &[&str] = &["AWFI", "MUX", "WFI", "PAN5M", "PAN10M", "WPM"];

/// Collections on a global fixed grid whose extent is read from the data file.
pub const DEFAULT_FIXED_GRID_COLLECTIONS: &[&str] = &["GOES16-L2-CMI-1", "GOES13-L3-IMAGER-1"];

/// Satellite families recognised in the first field of a scene name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatelliteFamily {
    Cbers,
    Amazonia,
    Goes,
    Modis,
    Mosaic,
    Landsat7,
}

impl SatelliteFamily {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "CBERS" => Some(Self::Cbers),
            "AMAZONIA" => Some(Self::Amazonia),
            "GOES" => Some(Self::Goes),
            "MODIS" => Some(Self::Modis),
            "MOSAIC" => Some(Self::Mosaic),
            "LE07" => Some(Self::Landsat7),
            _ => None,
        }
    }

    /// Whether field 2 of the scene name must be an allow-listed sensor.
    pub fn requires_sensor_check(self) -> bool {
        matches!(self, Self::Cbers | Self::Amazonia)
    }
}

/// Canonical sensor code for a collection identifier (`name-version`).
///
/// Only the first two hyphen-delimited segments are used for the lookup.
pub fn canonical_sensor_code(collection_identifier: &str) -> Option<&'static str> {
    let prefix = collection_identifier
        .split('-')
        .take(2)
        .collect::<Vec<_>>()
        .join("-");

    CANONICAL_SENSOR_CODES
        .iter()
        .find(|(key, _)| *key == prefix)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_code_uses_name_and_version_prefix() {
        assert_eq!(canonical_sensor_code("CB4-WFI-1"), Some("CBERS_4_AWFI"));
        assert_eq!(canonical_sensor_code("GOES16-L2-CMI-1"), Some("GOES_16_L2_CMI"));
        // Single-segment keys cannot match a two-segment prefix.
        assert_eq!(canonical_sensor_code("mod13q1_bundle-1"), None);
        assert_eq!(canonical_sensor_code("landsat-1"), None);
        assert_eq!(canonical_sensor_code("S2-L2A-1"), None);
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!(SatelliteFamily::parse("CBERS"), Some(SatelliteFamily::Cbers));
        assert_eq!(SatelliteFamily::parse("LE07"), Some(SatelliteFamily::Landsat7));
        assert_eq!(SatelliteFamily::parse("LANDSAT"), None);
        assert!(SatelliteFamily::Amazonia.requires_sensor_check());
        assert!(!SatelliteFamily::Goes.requires_sensor_check());
    }
}
