use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/faceid/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/faceid/config.toml";

/// Maximum accepted Euclidean distance for the 128-d recognition network.
/// Any change of extractor model needs a re-tuned value.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;
pub const DEFAULT_LOGIN_PACING_MILLIS: u64 = 1500;
pub const DEFAULT_REGISTER_PACING_MILLIS: u64 = 500;
pub const DEFAULT_STORE_DIR: &str = "/var/lib/faceid";
pub const DEFAULT_MODEL_DIR: &str = "/usr/share/faceid/models";
pub const DEFAULT_ENROLLMENT_KEY: &str = "face_descriptor_demo";
pub const DEFAULT_EXTRACTOR_MODEL: &str = "face-recognition-128";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 128;
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 200;
pub const DEFAULT_FACING_MODE: &str = "user";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub match_threshold: Option<f64>,
    pub login_pacing_millis: Option<u64>,
    pub register_pacing_millis: Option<u64>,
    pub store_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub enrollment_key: Option<String>,
    pub extractor_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub event_log_capacity: Option<usize>,
    pub facing_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub match_threshold: f64,
    pub login_pacing: Duration,
    pub register_pacing: Duration,
    pub store_dir: PathBuf,
    pub model_dir: PathBuf,
    pub enrollment_key: String,
    pub extractor_model: String,
    pub embedding_dimension: usize,
    pub event_log_capacity: usize,
    pub facing_mode: String,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            match_threshold: raw
                .match_threshold
                .filter(|value| value.is_finite() && *value > 0.0)
                .unwrap_or(DEFAULT_MATCH_THRESHOLD),
            login_pacing: Duration::from_millis(
                raw.login_pacing_millis
                    .unwrap_or(DEFAULT_LOGIN_PACING_MILLIS),
            ),
            register_pacing: Duration::from_millis(
                raw.register_pacing_millis
                    .unwrap_or(DEFAULT_REGISTER_PACING_MILLIS),
            ),
            store_dir: raw
                .store_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            model_dir: raw
                .model_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            enrollment_key: raw
                .enrollment_key
                .unwrap_or_else(|| DEFAULT_ENROLLMENT_KEY.to_string()),
            extractor_model: raw
                .extractor_model
                .unwrap_or_else(|| DEFAULT_EXTRACTOR_MODEL.to_string()),
            embedding_dimension: raw
                .embedding_dimension
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION)
                .max(1),
            event_log_capacity: raw
                .event_log_capacity
                .unwrap_or(DEFAULT_EVENT_LOG_CAPACITY)
                .max(1),
            facing_mode: raw
                .facing_mode
                .unwrap_or_else(|| DEFAULT_FACING_MODE.to_string()),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

pub fn default_sources() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_sources())
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

/// Loads one explicitly named file; unlike the layered lookup a missing
/// file is an error.
pub fn load_resolved_from_file(path: &Path) -> Result<ResolvedConfigWithSource, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(ResolvedConfigWithSource {
        resolved: ResolvedConfig::from_raw(parsed),
        source: Some(path.to_path_buf()),
    })
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn primary_path_wins() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "match_threshold = 0.4").unwrap();
        fs::write(&primary, "match_threshold = 0.5").unwrap();

        let loaded = load_from_paths(&[primary.clone(), secondary.clone()])
            .unwrap()
            .expect("config expected");
        assert_eq!(loaded.source(), primary.as_path());
        assert_eq!(loaded.contents.match_threshold, Some(0.5));
    }

    #[test]
    fn secondary_used_when_primary_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "enrollment_key = \"kiosk\"").unwrap();

        let loaded = load_from_paths(&[missing, secondary.clone()])
            .unwrap()
            .expect("config expected");
        assert_eq!(loaded.source, secondary);
        assert_eq!(loaded.contents.enrollment_key.as_deref(), Some("kiosk"));
    }

    #[test]
    fn parse_errors_are_reported() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "store_dir = { invalid = true }").unwrap();

        let err = load_from_paths(&[broken.clone()]).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, broken),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typo.toml");
        fs::write(&path, "match_treshold = 0.4").unwrap();

        let err = load_from_paths(&[path.clone()]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn io_errors_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dir.toml");
        fs::create_dir_all(&path).unwrap();

        let err = load_from_paths(&[path.clone()]).unwrap_err();
        match err {
            ConfigError::Read { path: err_path, .. } => assert_eq!(err_path, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_paths_return_none() {
        let loaded = load_from_paths(&[]).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn resolved_defaults_apply_when_missing() {
        let resolved = load_resolved_from_paths(&[]).unwrap();
        assert!(resolved.source.is_none());
        let config = resolved.resolved;
        assert_eq!(config.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(
            config.login_pacing,
            Duration::from_millis(DEFAULT_LOGIN_PACING_MILLIS)
        );
        assert_eq!(
            config.register_pacing,
            Duration::from_millis(DEFAULT_REGISTER_PACING_MILLIS)
        );
        assert_eq!(config.enrollment_key, DEFAULT_ENROLLMENT_KEY);
        assert_eq!(config.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(config.store_dir, PathBuf::from(DEFAULT_STORE_DIR));
        assert_eq!(config.model_dir, PathBuf::from(DEFAULT_MODEL_DIR));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        let err = load_resolved_from_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let present = dir.path().join("faceid.toml");
        fs::write(&present, "model_dir = \"/opt/models\"").unwrap();
        let resolved = load_resolved_from_file(&present).unwrap();
        assert_eq!(resolved.resolved.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(resolved.source, Some(present));
    }

    #[test]
    fn nonsensical_values_fall_back_to_defaults() {
        let raw = ConfigFile {
            match_threshold: Some(-1.0),
            embedding_dimension: Some(0),
            event_log_capacity: Some(0),
            ..ConfigFile::default()
        };
        let resolved = ResolvedConfig::from_raw(raw);
        assert_eq!(resolved.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(resolved.embedding_dimension, 1);
        assert_eq!(resolved.event_log_capacity, 1);
    }

    #[test]
    fn resolved_config_reports_source() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        fs::write(&primary, "login_pacing_millis = 0\nembedding_dimension = 512").unwrap();

        let resolved = load_resolved_from_paths(&[primary.clone()]).unwrap();
        assert_eq!(resolved.source, Some(primary));
        assert_eq!(resolved.resolved.login_pacing, Duration::ZERO);
        assert_eq!(resolved.resolved.embedding_dimension, 512);
    }
}
