//! SQLite-backed catalog store.

use super::{Catalog, Collection, Item, Tile};
use crate::error::CatalogError;
use crate::manifest::DATE_FORMAT;
use chrono::NaiveDateTime;
use geo::Polygon;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

const SAVEPOINT: &str = "publish_item";

const ITEM_COLUMNS: &str = "id, collection_id, name, assets, cloud_cover, start_date, end_date, \
     srid, geom, footprint, bbox, tile_id, is_available, created, updated";

pub struct SqliteCatalog {
    conn: Connection,
}

/// Item columns as stored, before decoding JSON and timestamps.
struct ItemRow {
    id: i64,
    collection_id: i64,
    name: String,
    assets: String,
    cloud_cover: Option<f64>,
    start_date: Option<String>,
    end_date: Option<String>,
    srid: Option<i64>,
    geom: Option<String>,
    footprint: Option<String>,
    bbox: Option<String>,
    tile_id: Option<i64>,
    is_available: bool,
    created: String,
    updated: String,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            collection_id: row.get(1)?,
            name: row.get(2)?,
            assets: row.get(3)?,
            cloud_cover: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            srid: row.get(7)?,
            geom: row.get(8)?,
            footprint: row.get(9)?,
            bbox: row.get(10)?,
            tile_id: row.get(11)?,
            is_available: row.get(12)?,
            created: row.get(13)?,
            updated: row.get(14)?,
        })
    }

    fn decode(self) -> Result<Item, CatalogError> {
        Ok(Item {
            id: Some(self.id),
            collection_id: self.collection_id,
            name: self.name,
            assets: serde_json::from_str(&self.assets)?,
            cloud_cover: self.cloud_cover,
            start_date: self.start_date.as_deref().map(decode_timestamp).transpose()?,
            end_date: self.end_date.as_deref().map(decode_timestamp).transpose()?,
            srid: self
                .srid
                .map(|s| u32::try_from(s).map_err(|_| CatalogError::Geometry(format!("invalid srid {s}"))))
                .transpose()?,
            geom: self.geom.as_deref().map(decode_polygon).transpose()?,
            footprint: self.footprint.as_deref().map(decode_polygon).transpose()?,
            bbox: self.bbox.as_deref().map(decode_polygon).transpose()?,
            tile_id: self.tile_id,
            is_available: self.is_available,
            created: decode_timestamp(&self.created)?,
            updated: decode_timestamp(&self.updated)?,
        })
    }
}

fn encode_timestamp(value: &NaiveDateTime) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn decode_timestamp(value: &str) -> Result<NaiveDateTime, CatalogError> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| CatalogError::Timestamp(value.to_string()))
}

/// Polygons are stored as GeoJSON geometry objects.
fn encode_polygon(polygon: &Polygon<f64>) -> Result<String, CatalogError> {
    let geometry = geojson::Geometry::new(geojson::Value::from(polygon));
    Ok(serde_json::to_string(&geometry)?)
}

fn decode_polygon(value: &str) -> Result<Polygon<f64>, CatalogError> {
    let geometry: geojson::Geometry = serde_json::from_str(value)?;
    Polygon::try_from(geometry.value).map_err(|e| CatalogError::Geometry(e.to_string()))
}

/// Unique and foreign key violations become [`CatalogError::Constraint`].
fn map_constraint(err: rusqlite::Error) -> CatalogError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            CatalogError::Constraint(message.clone().unwrap_or_else(|| failure.to_string()))
        }
        other => CatalogError::Database(other),
    }
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        info!("Opening catalog database {:?}", path);
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                UNIQUE(name, version)
            );
            CREATE TABLE IF NOT EXISTS tiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_id INTEGER NOT NULL REFERENCES collections(id),
                name TEXT NOT NULL,
                assets TEXT NOT NULL,
                cloud_cover REAL,
                start_date TEXT,
                end_date TEXT,
                srid INTEGER,
                geom TEXT,
                footprint TEXT,
                bbox TEXT,
                tile_id INTEGER REFERENCES tiles(id),
                is_available INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                UNIQUE(collection_id, name)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn register_collection(&self, name: &str, version: &str) -> Result<Collection, CatalogError> {
        self.conn
            .execute(
                "INSERT INTO collections(name, version) VALUES (?1, ?2)",
                params![name, version],
            )
            .map_err(map_constraint)?;

        Ok(Collection {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    pub fn register_tile(&self, name: &str) -> Result<Tile, CatalogError> {
        self.conn
            .execute("INSERT INTO tiles(name) VALUES (?1)", params![name])
            .map_err(map_constraint)?;

        Ok(Tile {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// All items of a collection ordered by id.
    pub fn items(&self, collection_id: i64) -> Result<Vec<Item>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE collection_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![collection_id], ItemRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(ItemRow::decode).collect()
    }
}

impl Catalog for SqliteCatalog {
    fn collection_by_identifier(&self, identifier: &str) -> Result<Option<Collection>, CatalogError> {
        let collection = self
            .conn
            .query_row(
                "SELECT id, name, version FROM collections WHERE name || '-' || version = ?1",
                params![identifier],
                |row| {
                    Ok(Collection {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        version: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(collection)
    }

    fn tile_by_name(&self, name: &str) -> Result<Option<Tile>, CatalogError> {
        let tile = self
            .conn
            .query_row(
                "SELECT id, name FROM tiles WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Tile {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(tile)
    }

    fn find_item(&self, collection_id: i64, name: &str) -> Result<Option<Item>, CatalogError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE collection_id = ?1 AND name = ?2"),
                params![collection_id, name],
                ItemRow::from_row,
            )
            .optional()?;

        row.map(ItemRow::decode).transpose()
    }

    fn save_item(&mut self, item: &mut Item) -> Result<i64, CatalogError> {
        let assets = serde_json::to_string(&item.assets)?;
        let geom = item.geom.as_ref().map(encode_polygon).transpose()?;
        let footprint = item.footprint.as_ref().map(encode_polygon).transpose()?;
        let bbox = item.bbox.as_ref().map(encode_polygon).transpose()?;
        let start_date = item.start_date.as_ref().map(encode_timestamp);
        let end_date = item.end_date.as_ref().map(encode_timestamp);
        let srid = item.srid.map(i64::from);

        match item.id {
            None => {
                self.conn
                    .execute(
                        "INSERT INTO items(collection_id, name, assets, cloud_cover, start_date, \
                         end_date, srid, geom, footprint, bbox, tile_id, is_available, created, updated) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        params![
                            item.collection_id,
                            item.name,
                            assets,
                            item.cloud_cover,
                            start_date,
                            end_date,
                            srid,
                            geom,
                            footprint,
                            bbox,
                            item.tile_id,
                            item.is_available,
                            encode_timestamp(&item.created),
                            encode_timestamp(&item.updated),
                        ],
                    )
                    .map_err(map_constraint)?;

                let id = self.conn.last_insert_rowid();
                debug!("Inserted item {} with id {}", item.name, id);
                item.id = Some(id);
                Ok(id)
            }
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE items SET collection_id = ?1, name = ?2, assets = ?3, cloud_cover = ?4, \
                         start_date = ?5, end_date = ?6, srid = ?7, geom = ?8, footprint = ?9, bbox = ?10, \
                         tile_id = ?11, is_available = ?12, created = ?13, updated = ?14 WHERE id = ?15",
                        params![
                            item.collection_id,
                            item.name,
                            assets,
                            item.cloud_cover,
                            start_date,
                            end_date,
                            srid,
                            geom,
                            footprint,
                            bbox,
                            item.tile_id,
                            item.is_available,
                            encode_timestamp(&item.created),
                            encode_timestamp(&item.updated),
                            id,
                        ],
                    )
                    .map_err(map_constraint)?;

                debug!("Updated item {} with id {}", item.name, id);
                Ok(id)
            }
        }
    }

    fn begin_nested(&mut self) -> Result<(), CatalogError> {
        self.conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
        Ok(())
    }

    fn release_nested(&mut self) -> Result<(), CatalogError> {
        self.conn.execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT}"))?;
        Ok(())
    }

    fn rollback_nested(&mut self) -> Result<(), CatalogError> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {SAVEPOINT}; RELEASE SAVEPOINT {SAVEPOINT}"
        ))?;
        Ok(())
    }
}
