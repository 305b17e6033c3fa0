use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::db;
use crate::error::{GrowthError, Result};
use crate::record::{SubmissionRecord, ROW_HEADER};

#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &SubmissionRecord) -> std::result::Result<(), csv::Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let is_new = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&file);
        if is_new {
            writer.write_record(ROW_HEADER)?;
        }
        writer.write_record(record.to_row())?;
        writer.flush()?;
        drop(writer);

        let synced = file.sync_all();
        let _ = file.unlock();
        synced?;
        Ok(())
    }
}

pub enum Sink {
    Csv(CsvSink),
    Postgres(PgPool),
}

impl Sink {
    pub fn describe(&self) -> String {
        match self {
            Sink::Csv(sink) => format!("CSV file {}", sink.path().display()),
            Sink::Postgres(_) => "Postgres".to_string(),
        }
    }

    /// Hands the record over unchanged. No retry happens here.
    pub async fn submit(&self, record: &SubmissionRecord) -> Result<()> {
        let outcome = match self {
            Sink::Csv(sink) => sink.append(record).map_err(GrowthError::submission),
            Sink::Postgres(pool) => db::append_record(pool, record)
                .await
                .map_err(GrowthError::submission),
        };

        match &outcome {
            Ok(()) => info!(
                farm = %record.farm,
                house = %record.house,
                date = %record.date,
                sink = %self.describe(),
                "record submitted"
            ),
            Err(err) => warn!(sink = %self.describe(), "{err}"),
        }
        outcome
    }
}

/// Submits the record; on failure it is kept under `pending_dir` (unless it
/// already lives at `parked_at`) and the failure names where.
pub async fn submit_or_park(
    sink: &Sink,
    record: &SubmissionRecord,
    pending_dir: &Path,
    parked_at: Option<&Path>,
) -> Result<()> {
    match sink.submit(record).await {
        Ok(()) => Ok(()),
        Err(err) => Err(keep_for_retry(err, record, pending_dir, parked_at)),
    }
}

pub fn keep_for_retry(
    err: GrowthError,
    record: &SubmissionRecord,
    pending_dir: &Path,
    parked_at: Option<&Path>,
) -> GrowthError {
    let location = match parked_at {
        Some(path) => path.to_path_buf(),
        None => match park(pending_dir, record) {
            Ok(path) => path,
            Err(park_err) => {
                error!(
                    record = %serde_json::to_string(record).unwrap_or_default(),
                    "{park_err}"
                );
                return err;
            }
        },
    };
    warn!(path = %location.display(), "submission failed; record kept for retry");
    err.with_pending(location)
}

/// Saves a record that could not be submitted so it can be retried as is.
pub fn park(dir: &Path, record: &SubmissionRecord) -> Result<PathBuf> {
    let file_name = format!(
        "{}_{}_{}_{}.json",
        record.date,
        file_safe(&record.farm),
        file_safe(&record.house),
        uuid::Uuid::new_v4().simple()
    );
    let path = dir.join(file_name);
    let pending_error = |source: std::io::Error| GrowthError::Pending {
        path: path.clone(),
        source,
    };

    let content = serde_json::to_vec_pretty(record)
        .map_err(|e| pending_error(std::io::Error::other(e)))?;
    fs::create_dir_all(dir).map_err(pending_error)?;
    fs::write(&path, content).map_err(pending_error)?;
    info!(path = %path.display(), "record parked for resubmission");
    Ok(path)
}

fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn load_parked(path: &Path) -> anyhow::Result<SubmissionRecord> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
