use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::Frame;
use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;

pub const MODEL_MANIFEST_FILE: &str = "model.json";
const SIDECAR_EXTENSION: &str = "faces.json";

/// Identity of the network that produced an embedding. Embeddings from
/// different profiles are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorProfile {
    pub model: String,
    pub dimension: usize,
}

impl ExtractorProfile {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn area(&self) -> i64 {
        (self.right - self.left).max(0) * (self.bottom - self.top).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceDetection {
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
}

#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    fn profile(&self) -> &ExtractorProfile;

    /// Warms the detection and recognition networks. Must succeed before
    /// `detect` is used.
    async fn load(&self) -> AppResult<()>;

    /// Returns the most prominent face in `frame`, or `None` when no face
    /// was found.
    async fn detect(&self, frame: &Frame) -> AppResult<Option<FaceDetection>>;
}

pub fn ensure_valid_embedding(embedding: &Embedding, profile: &ExtractorProfile) -> AppResult<()> {
    if embedding.len() != profile.dimension {
        return Err(AppError::DimensionMismatch {
            expected: profile.dimension,
            found: embedding.len(),
        });
    }
    if !embedding.is_finite() {
        return Err(AppError::Extraction(format!(
            "{} produced non-finite embedding values",
            profile.model
        )));
    }
    Ok(())
}

pub fn select_primary_face(faces: Vec<FaceDetection>) -> Option<FaceDetection> {
    faces
        .into_iter()
        .max_by_key(|face| face.bounding_box.area())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelManifest {
    pub model: String,
    pub dimension: usize,
}

/// Output of an offline extractor run stored next to a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarSummary {
    #[serde(default)]
    pub model: Option<String>,
    pub faces: Vec<FaceDetection>,
}

/// Extractor backed by embeddings computed ahead of time.
///
/// `load` reads `model.json` from the model directory and checks it against
/// the expected profile; `detect` reads `<frame>.faces.json` next to the
/// frame's source file.
#[derive(Debug)]
pub struct PrecomputedExtractor {
    model_dir: PathBuf,
    profile: ExtractorProfile,
    manifest: OnceLock<ModelManifest>,
}

impl PrecomputedExtractor {
    pub fn new(model_dir: impl Into<PathBuf>, profile: ExtractorProfile) -> Self {
        Self {
            model_dir: model_dir.into(),
            profile,
            manifest: OnceLock::new(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_MANIFEST_FILE)
    }

    pub fn sidecar_path(frame_source: &Path) -> PathBuf {
        frame_source.with_extension(SIDECAR_EXTENSION)
    }

    fn load_error(&self, message: impl Into<String>) -> AppError {
        AppError::ModelLoad {
            model: self.profile.model.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl EmbeddingExtractor for PrecomputedExtractor {
    fn profile(&self) -> &ExtractorProfile {
        &self.profile
    }

    async fn load(&self) -> AppResult<()> {
        if self.manifest.get().is_some() {
            return Ok(());
        }

        let path = self.manifest_path();
        debug!(path = %path.display(), "loading model manifest");
        let data = tokio::fs::read(&path)
            .await
            .map_err(|err| self.load_error(format!("{}: {err}", path.display())))?;
        let manifest: ModelManifest = serde_json::from_slice(&data)
            .map_err(|err| self.load_error(format!("invalid manifest {}: {err}", path.display())))?;

        if manifest.model != self.profile.model || manifest.dimension != self.profile.dimension {
            return Err(self.load_error(format!(
                "manifest declares {} ({}-d), expected {} ({}-d)",
                manifest.model, manifest.dimension, self.profile.model, self.profile.dimension
            )));
        }

        let _ = self.manifest.set(manifest);
        Ok(())
    }

    async fn detect(&self, frame: &Frame) -> AppResult<Option<FaceDetection>> {
        if self.manifest.get().is_none() {
            return Err(AppError::Extraction("models are not loaded".into()));
        }
        if !frame.has_pixels() {
            debug!(sequence = frame.sequence, "frame has no pixels; skipping detection");
            return Ok(None);
        }

        let source = frame.source.as_deref().ok_or_else(|| {
            AppError::Extraction("frame has no backing file for precomputed embeddings".into())
        })?;
        let sidecar = Self::sidecar_path(source);
        let data = match tokio::fs::read(&sidecar).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %sidecar.display(), "no precomputed faces for frame");
                return Ok(None);
            }
            Err(err) => {
                return Err(AppError::Extraction(format!(
                    "failed to read {}: {err}",
                    sidecar.display()
                )))
            }
        };
        let summary: SidecarSummary = serde_json::from_slice(&data).map_err(|err| {
            AppError::Extraction(format!("invalid face summary {}: {err}", sidecar.display()))
        })?;

        if let Some(model) = summary.model.as_deref() {
            if model != self.profile.model {
                return Err(AppError::Extraction(format!(
                    "{} was produced by {model}, expected {}",
                    sidecar.display(),
                    self.profile.model
                )));
            }
        }

        debug!(faces = summary.faces.len(), path = %sidecar.display(), "loaded precomputed faces");
        Ok(select_primary_face(summary.faces))
    }
}
