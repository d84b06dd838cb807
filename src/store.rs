//! Persistence of calibration profiles over a key/value store.
//!
//! A profile occupies three entries plus one shared id list:
//!
//! | key                    | value                                   |
//! |------------------------|-----------------------------------------|
//! | `calibrationIds`       | `["id", ...]`                           |
//! | `calibratedPoints_<id>`| anchor set, `{"leftEyeCenter": {x, y}, ...}` |
//! | `boxArea_<id>`         | number or `null`                        |
//! | `relativeVectors_<id>` | `[[{x, y}, {x, y}, {x, y}], ...]`       |
//!
//! Missing keys read as `None`. Saves are all-or-nothing: if any write
//! fails, the entries already written are put back the way they were.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::calibration::CalibrationProfile;
use crate::error::{Error, Result};
use crate::relative::RelativeVectorSet;
use crate::types::{AnchorSet, Point};

pub const IDS_KEY: &str = "calibrationIds";

pub fn points_key(id: &str) -> String {
    format!("calibratedPoints_{}", id)
}

pub fn box_area_key(id: &str) -> String {
    format!("boxArea_{}", id)
}

pub fn vectors_key(id: &str) -> String {
    format!("relativeVectors_{}", id)
}

/// String-keyed storage of JSON values.
pub trait KeyValueStore {
    /// Returns `Ok(None)` for a key that was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store, mainly for tests and short-lived sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Keys are arbitrary strings. Any byte outside `[A-Za-z0-9_-]` is written
/// as `%XX` in the file name, so ids with spaces or slashes stay inside
/// the directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Storage("empty storage key".to_string()));
        }
        Ok(self.dir.join(format!("{}.json", encode_key(key))))
    }
}

fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            name.push(char::from(b));
        } else {
            name.push_str(&format!("%{:02X}", b));
        }
    }
    name
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so readers never see a half-written file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads and writes [`CalibrationProfile`]s using the key layout above.
#[derive(Debug)]
pub struct ProfileStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProfileStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn list_ids(&self) -> Result<Vec<String>> {
        match self.store.get(IDS_KEY)? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(v) => Ok(serde_json::from_value(v)?),
        }
    }

    pub fn load(&self, id: &str) -> Result<Option<CalibrationProfile>> {
        let anchors: AnchorSet = match self.store.get(&points_key(id))? {
            Some(Value::Null) | None => return Ok(None),
            Some(v) => serde_json::from_value(v)?,
        };

        let box_area = match self.store.get(&box_area_key(id))? {
            Some(Value::Null) | None => None,
            Some(v) => Some(serde_json::from_value::<f32>(v)?),
        };

        let relative_vectors = match self.store.get(&vectors_key(id))? {
            Some(Value::Null) | None => Vec::new(),
            Some(v) => serde_json::from_value::<Vec<[Point; 3]>>(v)?
                .into_iter()
                .map(|[l, r, n]| RelativeVectorSet {
                    from_left_eye: l,
                    from_right_eye: r,
                    from_nose_lower: n,
                })
                .collect(),
        };

        Ok(Some(CalibrationProfile {
            id: id.to_string(),
            anchors,
            box_area,
            relative_vectors,
        }))
    }

    /// Write all entries of a profile, or none of them.
    pub fn save(&mut self, profile: &CalibrationProfile) -> Result<()> {
        let id = profile.id.as_str();

        let mut ids = self.list_ids()?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }

        let vectors: Vec<[Point; 3]> = profile
            .relative_vectors
            .iter()
            .map(|v| [v.from_left_eye, v.from_right_eye, v.from_nose_lower])
            .collect();

        let writes = vec![
            (points_key(id), serde_json::to_value(profile.anchors)?),
            (box_area_key(id), serde_json::to_value(profile.box_area)?),
            (vectors_key(id), serde_json::to_value(vectors)?),
            (IDS_KEY.to_string(), serde_json::to_value(&ids)?),
        ];

        self.write_all(writes).map_err(|e| {
            let cause = match e {
                Error::Storage(msg) => msg,
                other => other.to_string(),
            };
            Error::Storage(format!("failed to save calibration profile {:?}: {}", id, cause))
        })?;

        tracing::info!(
            profile = id,
            markers = profile.marker_count(),
            "saved calibration profile"
        );
        Ok(())
    }

    /// Delete a profile's entries and drop it from the id list.
    ///
    /// Returns `false` if no profile with that id was stored.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let mut ids = self.list_ids()?;
        let listed = ids.iter().any(|existing| existing == id);
        let stored = self.store.get(&points_key(id))?.is_some();
        if !listed && !stored {
            return Ok(false);
        }

        ids.retain(|existing| existing != id);
        self.store.set(IDS_KEY, serde_json::to_value(&ids)?)?;
        self.store.remove(&points_key(id))?;
        self.store.remove(&box_area_key(id))?;
        self.store.remove(&vectors_key(id))?;

        tracing::info!(profile = id, "deleted calibration profile");
        Ok(true)
    }

    fn write_all(&mut self, writes: Vec<(String, Value)>) -> Result<()> {
        let mut previous = Vec::with_capacity(writes.len());
        for (key, _) in &writes {
            previous.push((key.clone(), self.store.get(key)?));
        }

        for (done, (key, value)) in writes.into_iter().enumerate() {
            if let Err(e) = self.store.set(&key, value) {
                tracing::warn!(key = %key, error = %e, "storage write failed, rolling back");
                self.rollback(&previous[..done]);
                return Err(e);
            }
        }
        Ok(())
    }

    fn rollback(&mut self, previous: &[(String, Option<Value>)]) {
        for (key, old) in previous.iter().rev() {
            let restored = match old {
                Some(v) => self.store.set(key, v.clone()),
                None => self.store.remove(key),
            };
            if let Err(e) = restored {
                tracing::warn!(key = %key, error = %e, "could not restore entry during rollback");
            }
        }
    }
}

/// Fails every write to one key.
#[cfg(test)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_key: String,
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if key == self.fail_key {
            return Err(Error::Storage("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}
