#![forbid(unsafe_code)]

use crate::StoreError;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const COUNTER_EXTENSION: &str = "counter";
const MAX_NAME_LEN: usize = 128;

/// Durable named counters, one text file per name.
///
/// Every call on one instance is serialized by a single lock, including calls
/// for different names.
#[derive(Debug)]
pub struct Counter {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl Counter {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch-and-increment. The first call for a name returns 1.
    ///
    /// The incremented value is on disk before this returns; a failed write
    /// leaves the stored value untouched.
    pub fn get_increased(&self, name: &str) -> Result<i64, StoreError> {
        validate_counter_name(name)?;
        let _guard = self.lock.lock();

        let path = self.path_for(name);
        let current = read_value(&path, name)?.unwrap_or(1);
        let next = current
            .checked_add(1)
            .ok_or(StoreError::InvalidInput("counter overflow"))?;
        write_value(&path, next)?;

        tracing::debug!(counter = name, value = current, "counter increased");
        Ok(current)
    }

    /// Value the next `get_increased` call would return, if the counter exists.
    pub fn peek(&self, name: &str) -> Result<Option<i64>, StoreError> {
        validate_counter_name(name)?;
        let _guard = self.lock.lock();
        read_value(&self.path_for(name), name)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{COUNTER_EXTENSION}"))
    }
}

fn read_value(path: &Path, name: &str) -> Result<Option<i64>, StoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::CorruptCounter {
                name: name.to_string(),
            }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_value(path: &Path, value: i64) -> Result<(), StoreError> {
    let tmp = path.with_extension(format!("{COUNTER_EXTENSION}.tmp"));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.to_string().as_bytes())?;
        file.sync_all()?;
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn validate_counter_name(name: &str) -> Result<(), StoreError> {
    let invalid = StoreError::InvalidInput("counter name must be 1-128 chars of [A-Za-z0-9._-] and not start with '.'");
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.starts_with('.') {
        return Err(invalid);
    }
    if name
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')))
    {
        return Err(invalid);
    }
    Ok(())
}
