use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::weather::{DailyForecast, ForecastError, HourlySample, TemperatureRange};

/// Errors that can occur while saving or loading forecast blobs.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Corrupt forecast: {0}")]
    Corrupt(#[from] ForecastError),
    #[error("Invalid storage key '{0}': use letters, digits, '-' or '_'")]
    InvalidKey(String),
}

/// Key-value byte storage for the persisted forecast.
pub trait ForecastStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing has been stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }
}

impl ForecastStore for FileStore {
    /// Writes to a temporary file first, then atomically renames it over the
    /// target, so a partial write never clobbers the previous forecast.
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir)?;

        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.bin.tmp", key));

        if let Err(e) = fs::write(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io(e));
        }

        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io(e));
        }

        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Process-local store, used when nothing should touch the disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForecastStore for MemoryStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }
}

/// Encode a forecast as its ordered list of flat hourly records.
pub fn encode_forecast(forecast: &DailyForecast) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(forecast.samples()).map_err(|e| StoreError::Serialize(e.to_string()))
}

/// Decode a blob and re-check the 24-hour invariant.
pub fn decode_forecast(bytes: &[u8]) -> Result<DailyForecast, StoreError> {
    let samples: Vec<HourlySample> =
        bincode::deserialize(bytes).map_err(|e| StoreError::Deserialize(e.to_string()))?;
    Ok(DailyForecast::new(samples)?)
}

pub fn save_forecast<S: ForecastStore + ?Sized>(
    store: &mut S,
    key: &str,
    forecast: &DailyForecast,
) -> Result<(), StoreError> {
    let bytes = encode_forecast(forecast)?;
    store.save(key, &bytes)
}

/// Load the stored forecast, treating anything unreadable as absent.
///
/// A forecast written under a different envelope, or damaged so that a
/// temperature falls outside `range`, is unusable too.
pub fn load_forecast<S: ForecastStore + ?Sized>(
    store: &S,
    key: &str,
    range: TemperatureRange,
) -> Option<DailyForecast> {
    let bytes = match store.load(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Cannot read stored forecast");
            return None;
        }
    };

    let checked = decode_forecast(&bytes).and_then(|forecast| {
        forecast.check_envelope(range)?;
        Ok(forecast)
    });
    match checked {
        Ok(forecast) => Some(forecast),
        Err(e) => {
            warn!(key, error = %e, "Stored forecast is unusable, ignoring it");
            None
        }
    }
}
