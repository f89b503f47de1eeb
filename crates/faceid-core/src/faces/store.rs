use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;
use crate::faces::extractor::ExtractorProfile;

pub const ENROLLMENT_STORE_ENV: &str = "FACEID_STORE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentRecord {
    pub embedding: Embedding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl EnrollmentRecord {
    pub fn new(embedding: Embedding, profile: &ExtractorProfile) -> Self {
        Self {
            embedding,
            created_at: Some(Utc::now()),
            extractor: Some(profile.model.clone()),
        }
    }
}

/// Single-slot template storage. `put` overwrites; readers never observe a
/// partially written record.
pub trait EnrollmentStore: Send + Sync {
    fn get(&self) -> AppResult<Option<EnrollmentRecord>>;
    fn put(&self, record: &EnrollmentRecord) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

impl<S: EnrollmentStore + ?Sized> EnrollmentStore for Arc<S> {
    fn get(&self) -> AppResult<Option<EnrollmentRecord>> {
        (**self).get()
    }

    fn put(&self, record: &EnrollmentRecord) -> AppResult<()> {
        (**self).put(record)
    }

    fn clear(&self) -> AppResult<()> {
        (**self).clear()
    }
}

pub fn validate_record(record: &EnrollmentRecord, profile: &ExtractorProfile) -> AppResult<()> {
    let incompatible = |message: String| AppError::IncompatibleTemplate {
        model: profile.model.clone(),
        message,
    };

    if let Some(extractor) = record.extractor.as_deref() {
        if extractor != profile.model {
            return Err(incompatible(format!("template was enrolled with {extractor}")));
        }
    }
    if record.embedding.len() != profile.dimension {
        return Err(incompatible(format!(
            "expected {} values, found {}",
            profile.dimension,
            record.embedding.len()
        )));
    }
    if !record.embedding.is_finite() {
        return Err(incompatible("template contains non-finite values".into()));
    }
    Ok(())
}

// The widget this store replaces persisted a bare array; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Bare(Vec<f64>),
    Record(EnrollmentRecord),
}

pub fn read_record_file(path: &Path) -> AppResult<Option<EnrollmentRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AppError::StoreRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let payload: StoredPayload =
        serde_json::from_slice(&data).map_err(|err| AppError::StoreCorrupt {
            path: path.to_path_buf(),
            message: format!("invalid enrollment record: {err}"),
        })?;

    Ok(Some(match payload {
        StoredPayload::Bare(values) => EnrollmentRecord {
            embedding: Embedding::new(values),
            created_at: None,
            extractor: None,
        },
        StoredPayload::Record(record) => record,
    }))
}

pub fn write_record_atomic(path: &Path, record: &EnrollmentRecord) -> AppResult<()> {
    let write_err = |source: io::Error| AppError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.write_all(b"\n").map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        file.sync_all().map_err(write_err)?;
    }

    let file = tmp.persist(path).map_err(|err| write_err(err.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata().map_err(write_err)?.permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms).map_err(write_err)?;
    }
    #[cfg(not(unix))]
    drop(file);

    Ok(())
}

#[derive(Debug)]
pub struct FilesystemEnrollmentStore {
    path: PathBuf,
    profile: ExtractorProfile,
    write_lock: Mutex<()>,
}

impl FilesystemEnrollmentStore {
    pub fn new(store_dir: &Path, key: &str, profile: ExtractorProfile) -> AppResult<Self> {
        validate_key(key)?;
        Ok(Self {
            path: store_dir.join(format!("{key}.json")),
            profile,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &ExtractorProfile {
        &self.profile
    }
}

impl EnrollmentStore for FilesystemEnrollmentStore {
    fn get(&self) -> AppResult<Option<EnrollmentRecord>> {
        let Some(record) = read_record_file(&self.path)? else {
            return Ok(None);
        };
        validate_record(&record, &self.profile)?;
        Ok(Some(record))
    }

    fn put(&self, record: &EnrollmentRecord) -> AppResult<()> {
        validate_record(record, &self.profile)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_record_atomic(&self.path, record)?;
        debug!(path = %self.path.display(), "enrollment record written");
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "enrollment record removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AppError::StoreWrite {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[derive(Debug)]
pub struct MemoryEnrollmentStore {
    profile: ExtractorProfile,
    slot: Mutex<Option<EnrollmentRecord>>,
}

impl MemoryEnrollmentStore {
    pub fn new(profile: ExtractorProfile) -> Self {
        Self {
            profile,
            slot: Mutex::new(None),
        }
    }

    /// Seeds the slot without validation, to model data left behind by an
    /// older extractor.
    pub fn with_record(profile: ExtractorProfile, record: EnrollmentRecord) -> Self {
        Self {
            profile,
            slot: Mutex::new(Some(record)),
        }
    }
}

impl EnrollmentStore for MemoryEnrollmentStore {
    fn get(&self) -> AppResult<Option<EnrollmentRecord>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(record) => {
                validate_record(record, &self.profile)?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn put(&self, record: &EnrollmentRecord) -> AppResult<()> {
        validate_record(record, &self.profile)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

pub trait StoreDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf;
}

/// Flag, then `$FACEID_STORE_DIR`, then the configured directory.
#[derive(Debug, Clone)]
pub struct EnvStoreDirResolver {
    configured: PathBuf,
}

impl EnvStoreDirResolver {
    pub fn new(configured: impl Into<PathBuf>) -> Self {
        Self {
            configured: configured.into(),
        }
    }
}

impl StoreDirResolver for EnvStoreDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            dir.to_path_buf()
        } else if let Ok(env_value) = env::var(ENROLLMENT_STORE_ENV) {
            PathBuf::from(env_value)
        } else {
            self.configured.clone()
        }
    }
}

fn validate_key(key: &str) -> AppResult<()> {
    if key.is_empty() {
        return Err(AppError::InvalidKey {
            key: key.to_string(),
            message: "enrollment key cannot be empty".into(),
        });
    }

    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(AppError::InvalidKey {
            key: key.to_string(),
            message: "use ASCII letters, numbers, '-' or '_' only".into(),
        });
    }

    Ok(())
}
