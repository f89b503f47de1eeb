use std::path::PathBuf;

use chrono::{DateTime, Utc};
use faceid_core::errors::{AppError, AppResult};
use faceid_core::faces::{read_record_file, EnrollmentStore};
use serde::Serialize;
use tracing::info;

use crate::cli::RuntimeArgs;
use crate::runtime::RuntimeContext;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub store_path: PathBuf,
    /// Configuration file in effect; `None` means built-in defaults.
    pub config_source: Option<PathBuf>,
    pub enrolled: bool,
    pub compatible: bool,
    pub extractor: Option<String>,
    pub dimension: Option<usize>,
    pub created_at: Option<DateTime<Utc>>,
    /// Why an enrolled template cannot be used, if it cannot.
    pub problem: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearReport {
    pub store_path: PathBuf,
    pub removed: bool,
}

pub fn run_status(args: &RuntimeArgs) -> AppResult<StatusReport> {
    let context = RuntimeContext::load(args)?;
    let store = context.open_store()?;
    let store_path = store.path().to_path_buf();

    match store.get() {
        Ok(Some(record)) => Ok(StatusReport {
            store_path,
            config_source: context.config_source.clone(),
            enrolled: true,
            compatible: true,
            extractor: record.extractor,
            dimension: Some(record.embedding.len()),
            created_at: record.created_at,
            problem: None,
        }),
        Ok(None) => Ok(StatusReport {
            store_path,
            config_source: context.config_source.clone(),
            enrolled: false,
            compatible: false,
            extractor: None,
            dimension: None,
            created_at: None,
            problem: None,
        }),
        Err(AppError::IncompatibleTemplate { message, .. }) => {
            let stale = read_record_file(&store_path)?;
            Ok(StatusReport {
                enrolled: true,
                compatible: false,
                extractor: stale.as_ref().and_then(|record| record.extractor.clone()),
                dimension: stale.as_ref().map(|record| record.embedding.len()),
                created_at: stale.as_ref().and_then(|record| record.created_at),
                problem: Some(message),
                store_path,
                config_source: context.config_source.clone(),
            })
        }
        Err(err) => Err(err),
    }
}

pub fn run_clear(args: &RuntimeArgs) -> AppResult<ClearReport> {
    let context = RuntimeContext::load(args)?;
    let store = context.open_store()?;
    let removed = store.path().exists();
    store.clear()?;
    info!(store = %store.path().display(), removed, "enrollment cleared");

    Ok(ClearReport {
        store_path: store.path().to_path_buf(),
        removed,
    })
}
