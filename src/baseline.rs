use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{GrowthError, Result};

const KEY_SEPARATOR: char = '-';

pub type BaselineMap = BTreeMap<String, f64>;

pub fn baseline_key(farm: &str, house: &str) -> Result<String> {
    for (field, value) in [("farm", farm), ("house", house)] {
        if value.trim().is_empty() || value.contains(KEY_SEPARATOR) {
            return Err(GrowthError::InvalidKeyComponent {
                field,
                value: value.to_string(),
            });
        }
    }
    Ok(format!("{farm}{KEY_SEPARATOR}{house}"))
}

pub fn validate_weight(weight: f64) -> Result<f64> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(weight)
    } else {
        Err(GrowthError::InvalidBaselineWeight(weight))
    }
}

#[derive(Debug)]
pub struct BaselineWeightStore {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl BaselineWeightStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn storage_error(&self, source: std::io::Error) -> GrowthError {
        GrowthError::Storage {
            path: self.path.clone(),
            source,
        }
    }

    /// Reads the whole map. A missing file is an empty store.
    pub fn load(&self) -> Result<BaselineMap> {
        if !self.path.exists() {
            return Ok(BaselineMap::new());
        }

        let unavailable = |message: String| GrowthError::BaselineUnavailable {
            path: self.path.clone(),
            message,
        };

        let content = fs::read(&self.path).map_err(|e| unavailable(e.to_string()))?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(BaselineMap::new());
        }
        serde_json::from_slice(&content).map_err(|e| unavailable(e.to_string()))
    }

    /// Like [`load`](Self::load), but an unreadable store counts as empty.
    pub fn load_or_empty(&self) -> BaselineMap {
        match self.load() {
            Ok(map) => map,
            Err(err) => {
                warn!("{err}; treating as no baselines recorded");
                BaselineMap::new()
            }
        }
    }

    /// Stored weight for the house, or 0 when none has been recorded.
    pub fn get(&self, farm: &str, house: &str) -> Result<f64> {
        let key = baseline_key(farm, house)?;
        let weight = self.load_or_empty().get(&key).copied().unwrap_or(0.0);
        debug!(%key, weight, "baseline lookup");
        Ok(weight)
    }

    /// Records the weight and returns once it is on disk. An unreadable
    /// store is left untouched and reported instead of being overwritten.
    pub fn set(&self, farm: &str, house: &str, weight: f64) -> Result<()> {
        let key = baseline_key(farm, house)?;
        let weight = validate_weight(weight)?;

        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|e| self.storage_error(e))?;

        let lock_file = fs::File::create(self.lock_path()).map_err(|e| self.storage_error(e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| self.storage_error(e))?;

        let result = self.load().and_then(|mut map| {
            let previous = map.insert(key.clone(), weight);
            self.write_atomically(&dir, &map).map(|()| previous)
        });

        let _ = lock_file.unlock();
        let previous = result?;

        info!(%key, weight, ?previous, "baseline saved");
        Ok(())
    }

    fn write_atomically(&self, dir: &Path, map: &BaselineMap) -> Result<()> {
        let content = serde_json::to_vec(map)
            .map_err(|e| self.storage_error(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.storage_error(e))?;
        tmp.write_all(&content).map_err(|e| self.storage_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.storage_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.storage_error(e.error))?;
        Ok(())
    }
}
