//! Run report: the human-readable log of one run plus per-scene outcomes.

use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

/// Kind of result recorded for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Created,
    Updated,
    SkippedAlreadyPublished,
    Failed,
}

/// Final outcome of one scene within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneOutcome {
    pub manifest: PathBuf,
    pub name: String,
    pub kind: OutcomeKind,
}

/// Accumulated messages and outcomes of one [`crate::processor::ManifestProcessor::run`].
#[derive(Debug, Default)]
pub struct RunReport {
    lines: Vec<String>,
    outcomes: Vec<SceneOutcome>,
    log_file: Option<PathBuf>,
}

impl RunReport {
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.lines.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.lines.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.lines.push(message);
    }

    pub fn record(&mut self, manifest: &Path, name: &str, kind: OutcomeKind) {
        self.outcomes.push(SceneOutcome {
            manifest: manifest.to_path_buf(),
            name: name.to_string(),
            kind,
        });
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn outcomes(&self) -> &[SceneOutcome] {
        &self.outcomes
    }

    /// Names of scenes that were not published, in processing order.
    pub fn unpublished(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.kind, OutcomeKind::Failed | OutcomeKind::SkippedAlreadyPublished))
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    /// Log file written by [`RunReport::flush`], if any.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Append every line to `<dir>/log_<timestamp>.log`, creating `dir` if needed.
    pub fn flush(&mut self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let stamp = Local::now().format("%Y%m%dT%H%M%S");
        let path = dir.join(format!("log_{stamp}.log"));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(self.lines.join("\n").as_bytes())?;
        file.write_all(b"\n")?;

        self.log_file = Some(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_includes_skipped_and_failed() {
        let mut report = RunReport::default();
        let manifest = Path::new("items.json");
        report.record(manifest, "A", OutcomeKind::Created);
        report.record(manifest, "B", OutcomeKind::SkippedAlreadyPublished);
        report.record(manifest, "C", OutcomeKind::Failed);
        report.record(manifest, "D", OutcomeKind::Updated);

        assert_eq!(report.unpublished(), vec!["B", "C"]);
        assert_eq!(report.count(OutcomeKind::Created), 1);
    }

    #[test]
    fn test_flush_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = RunReport::default();
        report.info("first");
        report.error("second");

        let path = report.flush(&dir.path().join("log")).unwrap();
        let written = fs::read_to_string(&path).unwrap();

        assert_eq!(written, "first\nsecond\n");
        assert_eq!(report.log_file(), Some(path.as_path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("log_"));
    }
}
