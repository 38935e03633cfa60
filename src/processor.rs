//! Run driver: resolves manifests, locks them, publishes their scenes and
//! archives them.

use crate::authenticity::AuthenticityChecker;
use crate::catalog::{Catalog, Collection};
use crate::config::Settings;
use crate::error::PublishError;
use crate::lock::ManifestLock;
use crate::manifest::Manifest;
use crate::raster::RasterSource;
use crate::report::{OutcomeKind, RunReport};
use crate::upsert::ItemUpserter;
use chrono::Local;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// File name looked for when scanning a directory.
pub const MANIFEST_FILE_NAME: &str = "items.json";

/// What to publish: one manifest, or every `items.json` below a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestInput {
    File(PathBuf),
    Directory(PathBuf),
}

pub struct ManifestProcessor<'a, C: Catalog + ?Sized, S: RasterSource + ?Sized> {
    catalog: &'a mut C,
    source: &'a S,
    settings: &'a Settings,
}

impl<'a, C: Catalog + ?Sized, S: RasterSource + ?Sized> ManifestProcessor<'a, C, S> {
    pub fn new(catalog: &'a mut C, source: &'a S, settings: &'a Settings) -> Self {
        Self {
            catalog,
            source,
            settings,
        }
    }

    /// Publish every manifest of `input` into the collection `collection`
    /// (`name-version`). Failures never escape: they end up in the report,
    /// which is also appended to a fresh file under the log directory.
    pub fn run(&mut self, collection: &str, input: &ManifestInput, authenticate: bool) -> RunReport {
        let mut report = RunReport::default();

        for file in manifest_files(input, &mut report) {
            if file.is_file() {
                self.process_file(collection, &file, authenticate, &mut report);
            } else {
                report.warn(format!("The file {} does not exist.", file.display()));
            }
        }

        match report.flush(&self.settings.log_dir) {
            Ok(path) => info!("Run log written to {:?}", path),
            Err(e) => error!(
                "Error when trying to write the log in {:?}: {}",
                self.settings.log_dir, e
            ),
        }

        report
    }

    fn process_file(&mut self, identifier: &str, file: &Path, authenticate: bool, report: &mut RunReport) {
        report.info("Starting to publish the metadata in the database...");

        let collection = match self.catalog.collection_by_identifier(identifier) {
            Ok(Some(collection)) => collection,
            Ok(None) => {
                report.error(format!(
                    "Error checking this collection. Collection {identifier} is not valid or does not exist."
                ));
                report.info("End of the process!");
                return;
            }
            Err(e) => {
                report.error(format!("Error checking collection {identifier}: {e}"));
                report.info("End of the process!");
                return;
            }
        };
        report.info(format!(
            "Collection {} (id={}) found.",
            collection.identifier(),
            collection.id
        ));

        info!(
            "Creating lock file in {:?}",
            ManifestLock::path_for(&self.settings.lock_dir, file)
        );
        let lock = match ManifestLock::acquire(&self.settings.lock_dir, file) {
            Ok(lock) => lock,
            Err(e) => {
                report.error(format!("Could not lock {}: {e}", file.display()));
                report.info("End of the process!");
                return;
            }
        };

        let failed = match Manifest::load(file) {
            Ok(manifest) => self.publish_scenes(identifier, &collection, &manifest, authenticate, report),
            Err(e) => {
                report.error(format!("Error reading the file! {e}"));
                Vec::new()
            }
        };

        // Archived while still locked.
        self.archive(file, report);
        if let Err(e) = lock.release() {
            report.error(format!("Error when trying to delete the .lock file! {e}"));
        }

        if failed.is_empty() {
            report.info("Success: All items have been published!");
        } else {
            for name in &failed {
                report.info(format!("Item {name} has not been published!"));
            }
        }
        report.info("End of the process!");
    }

    /// Publish the scenes of one manifest in file order. Returns the names of
    /// the scenes that were not published.
    fn publish_scenes(
        &mut self,
        identifier: &str,
        collection: &Collection,
        manifest: &Manifest,
        authenticate: bool,
        report: &mut RunReport,
    ) -> Vec<String> {
        let total = manifest.len();
        let checker = AuthenticityChecker::new(self.settings.sensors.clone());
        let mut failed = Vec::new();

        report.info(format!(
            "File {} loaded, {total} items to check.",
            manifest.path().display()
        ));

        for (index, scene) in manifest.scenes().enumerate() {
            let position = index + 1;

            let scene = match scene {
                Ok(scene) => scene,
                Err((name, e)) => {
                    report.error(format!("Error preparing to create item {name} [{position}/{total}]: {e}"));
                    report.record(manifest.path(), &name, OutcomeKind::Failed);
                    failed.push(name);
                    continue;
                }
            };

            if authenticate {
                if let Err(reason) = checker.check(&scene.name, identifier) {
                    let err = PublishError::NotAuthentic {
                        name: scene.name.clone(),
                        collection: identifier.to_string(),
                        reason: reason.to_string(),
                    };
                    report.error(format!(
                        "The collection parameter does not match what is indicated in the file. {err}"
                    ));
                    report.error(format!(
                        "Error preparing to create item {} [{position}/{total}]",
                        scene.name
                    ));
                    report.record(manifest.path(), &scene.name, OutcomeKind::Failed);
                    failed.push(scene.name);
                    continue;
                }
            }

            report.info(format!("Preparing to create item {} [{position}/{total}]", scene.name));

            let outcome = ItemUpserter::new(&mut *self.catalog, self.source, self.settings)
                .upsert(collection, &scene, report);
            debug!("Item {} finished as {:?}", scene.name, outcome);

            report.record(manifest.path(), &scene.name, outcome.kind());
            if !outcome.is_published() {
                failed.push(scene.name);
            }
        }

        failed
    }

    /// Move the manifest to the processed directory under a timestamped name.
    fn archive(&self, file: &Path, report: &mut RunReport) {
        let dir = &self.settings.processed_dir;
        if let Err(e) = fs::create_dir_all(dir) {
            report.error(format!(
                "Error when trying to create the {} directory! {e}",
                dir.display()
            ));
            return;
        }

        let stamp = Local::now().format("%Y%m%dT%H%M%S").to_string();
        let target = processed_path(dir, file, &stamp);

        match move_file(file, &target) {
            Ok(()) => info!("Moved {:?} to {:?}", file, target),
            Err(e) => report.error(format!("Error moving JSON file. {e}")),
        }
    }
}

/// Manifest files of a run, in a stable order.
fn manifest_files(input: &ManifestInput, report: &mut RunReport) -> Vec<PathBuf> {
    match input {
        ManifestInput::File(path) => vec![path.clone()],
        ManifestInput::Directory(root) => {
            let mut files = Vec::new();
            for entry in WalkDir::new(root).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => report.warn(format!("Error scanning {}: {e}", root.display())),
                }
            }
            if files.is_empty() {
                report.warn(format!("No {MANIFEST_FILE_NAME} found under {}.", root.display()));
            }
            files
        }
    }
}

/// `<dir>/<stem>_<stamp>_processed.json`, with `_<n>` appended when taken.
fn processed_path(dir: &Path, file: &Path, stamp: &str) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{stem}_{stamp}_processed");

    let candidate = dir.join(format!("{base}.json"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{base}_{n}.json")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
