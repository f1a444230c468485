//! Session log writer.
//!
//! Every session gets one CSV file, `<sessions_dir>/<session_id>.csv`. The file is
//! opened in append mode for each record, the header is written only when the file
//! is still empty, and the row is flushed before the call returns.
use crate::error::{AppResult, DaqError};
use crate::measurement::SampleRecord;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Appends sample records to per-session CSV files.
#[derive(Debug, Clone)]
pub struct SampleLogger {
    sessions_dir: PathBuf,
}

impl SampleLogger {
    /// Logger writing into `sessions_dir`, created on first use.
    pub fn new<P: Into<PathBuf>>(sessions_dir: P) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    /// Directory holding the session files.
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Log file path for `session_id`.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.csv"))
    }

    /// Append `record` to the log of `session_id`.
    ///
    /// Failures are logged and reported as `false`; they never propagate into the
    /// poll cycle.
    pub fn append(&self, session_id: &str, record: &SampleRecord) -> bool {
        match self.try_append(session_id, record) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session_id, error = %e, "failed to append sample record");
                false
            }
        }
    }

    /// Fallible version of [`append`](Self::append).
    pub fn try_append(&self, session_id: &str, record: &SampleRecord) -> AppResult<()> {
        fs::create_dir_all(&self.sessions_dir)
            .map_err(|e| DaqError::Persistence(format!("cannot create sessions dir: {e}")))?;

        let path = self.session_path(session_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DaqError::Persistence(format!("cannot open {}: {e}", path.display())))?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer.write_record(record.csv_header())?;
        }
        writer.write_record(record.csv_row())?;
        writer.flush()?;

        tracing::debug!(session_id, path = %path.display(), "sample record appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::PressureSample;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(rpm: u32) -> SampleRecord {
        SampleRecord {
            session_id: Some("s".to_string()),
            rpm: vec![rpm],
            temperatures: vec![Some(21.0), Some(23.5)],
            pressures: vec![PressureSample::unavailable()],
            time: Utc::now(),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let logger = SampleLogger::new(dir.path().join("sessions"));

        assert!(logger.append("2024-01-01_00.00.00", &record(1000)));
        assert!(logger.append("2024-01-01_00.00.00", &record(1010)));

        let contents =
            std::fs::read_to_string(logger.session_path("2024-01-01_00.00.00")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("rpm_1,temperature_1,temperature_2,"));
        assert!(lines[1].starts_with("1000,21,23.5,"));
        assert!(lines[2].starts_with("1010,"));
        assert_eq!(contents.matches("rpm_1").count(), 1);
    }

    #[test]
    fn test_sessions_get_separate_files() {
        let dir = tempdir().unwrap();
        let logger = SampleLogger::new(dir.path());

        assert!(logger.append("a", &record(1)));
        assert!(logger.append("b", &record(2)));

        assert!(logger.session_path("a").exists());
        assert!(logger.session_path("b").exists());
    }

    #[test]
    fn test_unwritable_dir_reports_false() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let logger = SampleLogger::new(&blocker);
        assert!(!logger.append("s", &record(1)));
        assert!(matches!(
            logger.try_append("s", &record(1)),
            Err(DaqError::Persistence(_))
        ));
    }
}
