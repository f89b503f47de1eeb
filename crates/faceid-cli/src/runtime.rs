use std::future::Future;
use std::path::{Path, PathBuf};

use faceid_config::{load_resolved_config, load_resolved_from_file, ResolvedConfig};
use faceid_core::capture::StillImageCamera;
use faceid_core::errors::AppResult;
use faceid_core::faces::{
    EnvStoreDirResolver, ExtractorProfile, FilesystemEnrollmentStore, PrecomputedExtractor,
    StoreDirResolver,
};
use faceid_core::session::{SessionController, SessionSettings};
use tracing::{debug, info};

use crate::cli::RuntimeArgs;

pub type CliController =
    SessionController<PrecomputedExtractor, StillImageCamera, FilesystemEnrollmentStore>;

/// Configuration and paths resolved for one CLI invocation.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub config: ResolvedConfig,
    pub config_source: Option<PathBuf>,
    pub store_dir: PathBuf,
    pub model_dir: PathBuf,
}

impl RuntimeContext {
    pub fn load(args: &RuntimeArgs) -> AppResult<Self> {
        let loaded = match args.config.as_deref() {
            Some(path) => load_resolved_from_file(path)?,
            None => load_resolved_config()?,
        };
        match loaded.source.as_deref() {
            Some(source) => debug!(path = %source.display(), "loaded configuration"),
            None => info!("no configuration file found; using defaults"),
        }
        Ok(Self::from_config(loaded.resolved, loaded.source, args))
    }

    pub fn from_config(
        config: ResolvedConfig,
        config_source: Option<PathBuf>,
        args: &RuntimeArgs,
    ) -> Self {
        let store_dir = EnvStoreDirResolver::new(config.store_dir.clone())
            .resolve(args.store_dir.as_deref());
        let model_dir = args
            .model_dir
            .clone()
            .unwrap_or_else(|| config.model_dir.clone());
        Self {
            config,
            config_source,
            store_dir,
            model_dir,
        }
    }

    pub fn profile(&self) -> ExtractorProfile {
        ExtractorProfile::new(
            self.config.extractor_model.clone(),
            self.config.embedding_dimension,
        )
    }

    pub fn open_store(&self) -> AppResult<FilesystemEnrollmentStore> {
        FilesystemEnrollmentStore::new(
            &self.store_dir,
            &self.config.enrollment_key,
            self.profile(),
        )
    }

    /// Builds a session whose camera serves `frame` as its live feed.
    pub fn session(&self, frame: &Path) -> AppResult<CliController> {
        let store = self.open_store()?;
        debug!(store = %store.path().display(), frame = %frame.display(), "building session");
        Ok(SessionController::new(
            PrecomputedExtractor::new(&self.model_dir, self.profile()),
            StillImageCamera::new(frame),
            store,
            SessionSettings::from_config(&self.config),
        ))
    }
}

/// Runs `future` to completion on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> AppResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Loads the models and opens the camera, turning a failed step into an error.
pub async fn prepare_session(controller: &CliController) -> AppResult<()> {
    controller.initialize().await?;
    ensure_not_failed(controller)?;
    controller.start_camera().await?;
    ensure_not_failed(controller)
}

fn ensure_not_failed(controller: &CliController) -> AppResult<()> {
    let snapshot = controller.snapshot();
    match snapshot.error {
        Some(error) if snapshot.state.is_failure() => Err(error.into()),
        _ => Ok(()),
    }
}
