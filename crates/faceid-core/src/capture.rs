use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FromStr for FacingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "back" => Ok(FacingMode::Environment),
            other => Err(format!("unknown facing mode '{other}'")),
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::User => f.write_str("user"),
            FacingMode::Environment => f.write_str("environment"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing_mode: FacingMode,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Read-only description of a live stream, safe to hand to the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    /// Backing file for frames replayed from disk.
    pub source: Option<PathBuf>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_pixels(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }
}

#[async_trait]
pub trait FrameSource: Send {
    fn info(&self) -> &StreamInfo;

    async fn next_frame(&mut self) -> AppResult<Frame>;

    /// Stops the stream. Later `next_frame` calls fail.
    fn release(&mut self);
}

#[async_trait]
pub trait Camera: Send + Sync {
    type Stream: FrameSource + 'static;

    async fn acquire(&self, constraints: &CameraConstraints) -> AppResult<Self::Stream>;
}

/// Camera that serves one still image as its live feed.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Camera for StillImageCamera {
    type Stream = StillImageStream;

    async fn acquire(&self, constraints: &CameraConstraints) -> AppResult<Self::Stream> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| AppError::CameraAccess {
                device: self.path.display().to_string(),
                message: err.to_string(),
            })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| AppError::FrameDecode {
                path: self.path.clone(),
                source,
            })?
            .to_rgb8();
        debug!(path = %self.path.display(), width = image.width(), height = image.height(), "opened still image stream");

        let info = StreamInfo {
            label: self.path.display().to_string(),
            width: image.width(),
            height: image.height(),
            facing_mode: constraints.facing_mode,
        };
        Ok(StillImageStream {
            image,
            info,
            source: self.path.clone(),
            sequence: 0,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct StillImageStream {
    image: RgbImage,
    info: StreamInfo,
    source: PathBuf,
    sequence: u64,
    released: bool,
}

#[async_trait]
impl FrameSource for StillImageStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    async fn next_frame(&mut self) -> AppResult<Frame> {
        if self.released {
            return Err(AppError::FrameUnavailable {
                device: self.info.label.clone(),
                message: "stream was released".into(),
            });
        }
        self.sequence += 1;
        Ok(Frame {
            image: self.image.clone(),
            sequence: self.sequence,
            captured_at: Utc::now(),
            source: Some(self.source.clone()),
        })
    }

    fn release(&mut self) {
        if !self.released {
            debug!(label = %self.info.label, "released still image stream");
        }
        self.released = true;
    }
}
